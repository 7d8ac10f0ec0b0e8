//! Gamma API adapter — market discovery.
//!
//! Uses the venue's Gamma API (no auth required). Prices and token ids
//! arrive as JSON-encoded strings inside JSON ("[\"0.65\",\"0.35\"]"),
//! sometimes as bare numbers; all of that drift is normalised here so
//! the core only sees well-formed `Market` values.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::platforms::MarketGateway;
use crate::types::{GatewayError, Market, MarketGroup};

const DEFAULT_BASE_URL: &str = "https://gamma-api.polymarket.com";
const HTTP_TIMEOUT: Duration = Duration::from_secs(20);

// ---------------------------------------------------------------------------
// Gamma response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
pub struct GammaMarket {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub closed: Option<bool>,
    #[serde(default)]
    pub resolved: Option<bool>,
    /// Outcome prices as a JSON string: "[\"0.65\",\"0.35\"]"
    #[serde(default, rename = "outcomePrices")]
    pub outcome_prices: Option<String>,
    /// CLOB token ids as a JSON string: "[\"123...\",\"456...\"]"
    #[serde(default, rename = "clobTokenIds")]
    pub clob_token_ids: Option<String>,
    #[serde(default, rename = "volume24hr")]
    pub volume_24hr: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default, rename = "endDate")]
    pub end_date: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GammaEvent {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub markets: Vec<GammaMarket>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct GammaClient {
    http: Client,
    base_url: String,
}

impl GammaClient {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build Gamma HTTP client: {e}"))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, GatewayError> {
        let url = format!("{}{path}", self.base_url);
        let resp = self.http.get(&url).query(query).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        resp.json::<T>()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))
    }

    /// Convert a Gamma market into the internal Market type.
    /// Returns None when the payload is missing an id, a question, or a
    /// YES token — such rows cannot participate in any hedge.
    pub fn convert_market(gm: &GammaMarket) -> Option<Market> {
        let id = json_id_to_string(gm.id.as_ref())?;
        if gm.question.is_empty() {
            return None;
        }

        let (yes_price, no_price) =
            parse_outcome_prices(gm.outcome_prices.as_deref().unwrap_or(""))?;
        if !(yes_price > 0.0 && yes_price < 1.0) {
            return None;
        }

        let tokens = parse_token_ids(gm.clob_token_ids.as_deref().unwrap_or(""));
        let yes_token_id = tokens.first().cloned().unwrap_or_default();
        if yes_token_id.is_empty() {
            return None;
        }
        let no_token_id = tokens.get(1).cloned();

        let end_date = gm.end_date.as_deref().and_then(|d| {
            chrono::DateTime::parse_from_rfc3339(d)
                .ok()
                .map(|dt| dt.with_timezone(&chrono::Utc))
        });

        Some(Market {
            id,
            question: gm.question.clone(),
            yes_price,
            no_price,
            yes_token_id,
            no_token_id,
            volume_24h: gm.volume_24hr.or(gm.volume).unwrap_or(0.0),
            active: gm.active.unwrap_or(true),
            closed: gm.closed.unwrap_or(false),
            resolved: gm.resolved.unwrap_or(false),
            end_date,
        })
    }
}

#[async_trait]
impl MarketGateway for GammaClient {
    async fn get_events(&self, limit: u32) -> Result<Vec<MarketGroup>, GatewayError> {
        debug!(limit, "Fetching event groups from Gamma");
        let events: Vec<GammaEvent> = self
            .get_json(
                "/events",
                &[
                    ("closed", "false".to_string()),
                    ("limit", limit.to_string()),
                    ("order", "volume24hr".to_string()),
                    ("ascending", "false".to_string()),
                ],
            )
            .await?;

        let groups: Vec<MarketGroup> = events
            .iter()
            .filter_map(|ev| {
                let id = json_id_to_string(ev.id.as_ref())?;
                let markets: Vec<Market> =
                    ev.markets.iter().filter_map(GammaClient::convert_market).collect();
                Some(MarketGroup {
                    id,
                    title: ev.title.clone(),
                    description: ev.description.clone(),
                    markets,
                })
            })
            .collect();

        info!(count = groups.len(), "Fetched event groups");
        Ok(groups)
    }

    async fn get_trending_markets(&self, limit: u32) -> Result<Vec<Market>, GatewayError> {
        let raw: Vec<GammaMarket> = self
            .get_json(
                "/markets",
                &[
                    ("closed", "false".to_string()),
                    ("limit", limit.to_string()),
                    ("order", "volume24hr".to_string()),
                    ("ascending", "false".to_string()),
                ],
            )
            .await?;

        let markets: Vec<Market> = raw.iter().filter_map(GammaClient::convert_market).collect();
        debug!(raw = raw.len(), parsed = markets.len(), "Fetched trending markets");
        Ok(markets)
    }

    async fn search_markets(&self, query: &str, limit: u32) -> Result<Vec<Market>, GatewayError> {
        // Gamma has no dedicated search endpoint worth trusting; filter a
        // volume-ordered page on the question text instead.
        let raw: Vec<GammaMarket> = self
            .get_json(
                "/markets",
                &[
                    ("closed", "false".to_string()),
                    ("limit", "200".to_string()),
                    ("order", "volume24hr".to_string()),
                    ("ascending", "false".to_string()),
                ],
            )
            .await?;

        let q = query.to_lowercase();
        let mut markets: Vec<Market> = raw
            .iter()
            .filter_map(GammaClient::convert_market)
            .filter(|m| m.question.to_lowercase().contains(&q))
            .collect();
        markets.truncate(limit as usize);

        if markets.is_empty() {
            warn!(query, "Search returned no markets");
        }
        Ok(markets)
    }
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Gamma encodes ids inconsistently (number or string).
fn json_id_to_string(v: Option<&serde_json::Value>) -> Option<String> {
    match v? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse outcome prices from Gamma's string-encoded array.
/// Handles "[\"0.65\",\"0.35\"]", "0.65, 0.35", and escaped variants.
pub fn parse_outcome_prices(s: &str) -> Option<(f64, f64)> {
    let cleaned = s.replace(['[', ']', '"', '\\'], "");
    let parts: Vec<&str> = cleaned.split(',').map(|p| p.trim()).collect();
    if parts.len() >= 2 {
        let yes = parts[0].parse::<f64>().ok()?;
        let no = parts[1].parse::<f64>().ok()?;
        Some((yes, no))
    } else {
        None
    }
}

/// Parse the clobTokenIds string-encoded array into token id strings.
pub fn parse_token_ids(s: &str) -> Vec<String> {
    if s.is_empty() {
        return Vec::new();
    }
    // Prefer proper JSON decoding; fall back to the same strip-and-split
    // used for prices when the field arrives double-escaped.
    if let Ok(ids) = serde_json::from_str::<Vec<String>>(s) {
        return ids;
    }
    s.replace(['[', ']', '"', '\\'], "")
        .split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        body.to_string()
    } else {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &body[..end])
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
