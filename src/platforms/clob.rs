//! CLOB API adapter — order books and signed order placement.
//!
//! Authenticated requests carry the venue's L2 header set: an HMAC-SHA256
//! signature over `timestamp + METHOD + path + body` keyed by the
//! base64-decoded API secret, alongside the wallet address, API key and
//! passphrase. The credential material is injected from configuration and
//! opaque to the rest of the engine.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ClobCredentials;
use crate::platforms::{BookLevel, OrderAck, OrderBook, OrderGateway};
use crate::types::GatewayError;

const DEFAULT_BASE_URL: &str = "https://clob.polymarket.com";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
/// Book levels requested per side.
const BOOK_DEPTH: u32 = 100;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawLevel {
    #[serde(default)]
    price: String,
    #[serde(default)]
    size: String,
}

#[derive(Debug, Deserialize)]
struct RawBook {
    #[serde(default)]
    asks: Vec<RawLevel>,
    #[serde(default)]
    bids: Vec<RawLevel>,
}

#[derive(Debug, Deserialize)]
struct RawOrderResponse {
    #[serde(default, rename = "orderID")]
    order_id: Option<String>,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default, rename = "errorMsg")]
    error_msg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawBalance {
    #[serde(default)]
    balance: Option<String>,
}

// ---------------------------------------------------------------------------
// Signing
// ---------------------------------------------------------------------------

/// Produce the L2 signature header: HMAC-SHA256 of
/// `timestamp + METHOD + path + body` under the base64-decoded secret.
fn l2_signature(
    secret: &str,
    timestamp: i64,
    method: &str,
    path: &str,
    body: &str,
) -> Result<String, GatewayError> {
    let message = format!("{}{}{}{}", timestamp, method.to_uppercase(), path, body);
    let secret_bytes = BASE64
        .decode(secret)
        .map_err(|e| GatewayError::Parse(format!("API secret is not valid base64: {e}")))?;
    let mut mac = Hmac::<Sha256>::new_from_slice(&secret_bytes)
        .map_err(|e| GatewayError::Parse(format!("HMAC key error: {e}")))?;
    mac.update(message.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct ClobClient {
    http: Client,
    base_url: String,
    creds: ClobCredentials,
}

impl ClobClient {
    pub fn new(creds: ClobCredentials) -> anyhow::Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL, creds)
    }

    pub fn with_base_url(base_url: &str, creds: ClobCredentials) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build CLOB HTTP client: {e}"))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            creds,
        })
    }

    fn auth_headers(
        &self,
        method: &str,
        path: &str,
        body: &str,
    ) -> Result<Vec<(&'static str, String)>, GatewayError> {
        let timestamp = chrono::Utc::now().timestamp();
        let signature = l2_signature(&self.creds.api_secret, timestamp, method, path, body)?;
        Ok(vec![
            ("POLY_ADDRESS", self.creds.address.clone()),
            ("POLY_SIGNATURE", signature),
            ("POLY_TIMESTAMP", timestamp.to_string()),
            ("POLY_API_KEY", self.creds.api_key.clone()),
            ("POLY_PASSPHRASE", self.creds.passphrase.clone()),
        ])
    }

    fn parse_levels(raw: &[RawLevel]) -> Vec<BookLevel> {
        raw.iter()
            .filter_map(|l| {
                let price = l.price.parse::<f64>().ok()?;
                let size = l.size.parse::<f64>().ok()?;
                if size > 0.0 {
                    Some(BookLevel { price, size })
                } else {
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl OrderGateway for ClobClient {
    async fn get_order_book(&self, token_id: &str) -> Result<OrderBook, GatewayError> {
        let url = format!("{}/book", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("token_id", token_id.to_string()),
                ("depth", BOOK_DEPTH.to_string()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let raw: RawBook = resp
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))?;

        Ok(OrderBook {
            asks: Self::parse_levels(&raw.asks),
            bids: Self::parse_levels(&raw.bids),
        })
    }

    async fn place_limit_buy_gtc(
        &self,
        token_id: &str,
        price: f64,
        size: f64,
    ) -> Result<OrderAck, GatewayError> {
        let path = "/order";
        let body = serde_json::json!({
            "order": {
                "tokenID": token_id,
                "side": "BUY",
                "price": format!("{price:.2}"),
                "size": format!("{size:.2}"),
            },
            "owner": self.creds.api_key,
            "orderType": "GTC",
        })
        .to_string();

        let headers = self.auth_headers("POST", path, &body)?;
        let mut req = self
            .http
            .post(format!("{}{path}", self.base_url))
            .header("Content-Type", "application/json");
        for (k, v) in headers {
            req = req.header(k, v);
        }

        debug!(token_id, price, size, "Submitting GTC limit buy");
        let resp = req.body(body).send().await?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            // 4xx with a JSON errorMsg is a venue-side rejection, which the
            // executor records against the leg instead of the gateway.
            if let Ok(parsed) = serde_json::from_str::<RawOrderResponse>(&text) {
                if let Some(msg) = parsed.error_msg {
                    warn!(token_id, error = %msg, "Order rejected by venue");
                    return Ok(OrderAck {
                        order_id: String::new(),
                        error: Some(msg),
                    });
                }
            }
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: RawOrderResponse =
            serde_json::from_str(&text).map_err(|e| GatewayError::Parse(e.to_string()))?;

        if parsed.success == Some(false) || parsed.error_msg.is_some() {
            return Ok(OrderAck {
                order_id: parsed.order_id.unwrap_or_default(),
                error: Some(parsed.error_msg.unwrap_or_else(|| "rejected".to_string())),
            });
        }

        Ok(OrderAck {
            order_id: parsed.order_id.unwrap_or_default(),
            error: None,
        })
    }

    async fn get_balance(&self) -> Result<f64, GatewayError> {
        let path = "/balances";
        let headers = self.auth_headers("GET", path, "")?;
        let mut req = self.http.get(format!("{}{path}", self.base_url));
        for (k, v) in headers {
            req = req.header(k, v);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let raw: RawBalance = resp
            .json()
            .await
            .map_err(|e| GatewayError::Parse(e.to_string()))?;
        raw.balance
            .as_deref()
            .and_then(|b| b.parse::<f64>().ok())
            .ok_or_else(|| GatewayError::Parse("balance field missing".to_string()))
    }

    fn is_executable(&self) -> bool {
        self.creds.is_configured()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
