//! Threshold-pair scanner.
//!
//! Markets of the form "X above $a" and "X above $b" with a < b form an
//! implication: the higher threshold being true forces the lower one.
//! Buying NO on the high threshold plus YES on the low threshold pays at
//! least $1 in every outcome — $2 when the price settles between the two
//! levels — so any combined cost under $1 is a guaranteed hedge.
//!
//! Threshold extraction takes the first number in the question (optional
//! $, thousands commas, trailing k/m multipliers) and requires the
//! question to name the asset. Questions quoting several numbers yield
//! only the first; that limitation is inherited deliberately.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::{EconomicsConfig, ThresholdAsset};
use crate::platforms::MarketGateway;
use crate::risk::RiskManager;
use crate::scanners::{clears_profit_floor, net_profit_per_dollar, HedgeScanner, ScanOutcome};
use crate::types::{
    Confidence, HedgeLeg, HedgeOpportunity, HedgeType, Market, ScannerTag, Side,
};

/// Results fetched per search term.
const SEARCH_LIMIT: u32 = 50;
/// Trending page size for the fallback sweep.
const TRENDING_LIMIT: u32 = 200;
/// Relative tolerance when snapping parsed thresholds to canonical levels.
const LEVEL_TOLERANCE: f64 = 0.05;

pub struct ThresholdScanner {
    gateway: Arc<dyn MarketGateway>,
    risk: Arc<Mutex<RiskManager>>,
    economics: EconomicsConfig,
    assets: Vec<ThresholdAsset>,
}

impl ThresholdScanner {
    pub fn new(
        gateway: Arc<dyn MarketGateway>,
        risk: Arc<Mutex<RiskManager>>,
        economics: EconomicsConfig,
        assets: Vec<ThresholdAsset>,
    ) -> Self {
        Self {
            gateway,
            risk,
            economics,
            assets,
        }
    }

    /// Collect `threshold → market` for one asset, preferring the
    /// higher-volume market when two questions parse to the same level.
    async fn fetch_asset_markets(&self, asset: &ThresholdAsset) -> Vec<(f64, Market)> {
        let mut found: HashMap<u64, (f64, Market)> = HashMap::new();

        let absorb = |markets: Vec<Market>, found: &mut HashMap<u64, (f64, Market)>| {
            for m in markets {
                if m.closed || m.resolved {
                    continue;
                }
                let Some(threshold) = parse_threshold(&m.question, &asset.name) else {
                    continue;
                };
                let key = threshold.to_bits();
                match found.get(&key) {
                    Some((_, existing)) if existing.volume_24h >= m.volume_24h => {}
                    _ => {
                        found.insert(key, (threshold, m));
                    }
                }
            }
        };

        for term in &asset.search_terms {
            match self.gateway.search_markets(term, SEARCH_LIMIT).await {
                Ok(markets) => absorb(markets, &mut found),
                Err(e) => {
                    warn!(asset = %asset.name, term = %term, error = %e, "Search failed");
                    self.risk.lock().expect("risk poisoned").record_api_error();
                }
            }
        }

        // Direct search came up thin — sweep the trending page too.
        if found.len() < 2 {
            match self.gateway.get_trending_markets(TRENDING_LIMIT).await {
                Ok(markets) => absorb(markets, &mut found),
                Err(e) => {
                    warn!(asset = %asset.name, error = %e, "Trending sweep failed");
                    self.risk.lock().expect("risk poisoned").record_api_error();
                }
            }
        }

        // Snap to the configured canonical levels; when nothing survives
        // the filter, fall back to the unfiltered set.
        let entries: Vec<(f64, Market)> = found.into_values().collect();
        let filtered: Vec<(f64, Market)> = if asset.levels.is_empty() {
            entries.clone()
        } else {
            entries
                .iter()
                .filter(|(th, _)| {
                    asset
                        .levels
                        .iter()
                        .any(|lvl| ((th - lvl).abs() / lvl.max(1.0)) < LEVEL_TOLERANCE)
                })
                .cloned()
                .collect()
        };
        let mut result = if filtered.is_empty() { entries } else { filtered };

        result.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        result
    }

    /// Evaluate one (low, high) pair for the NO(high) + YES(low) hedge.
    fn build_pair(
        &self,
        asset: &ThresholdAsset,
        low_threshold: f64,
        low: &Market,
        high_threshold: f64,
        high: &Market,
    ) -> Option<HedgeOpportunity> {
        let no_high = high.no_price;
        let yes_low = low.yes_price;
        let cost = no_high + yes_low;
        if cost <= 0.0 || cost >= 1.0 {
            return None;
        }

        // Above high ⇒ YES(low) wins alone; between ⇒ both win ($2);
        // below low ⇒ NO(high) wins alone. The floor is always $1.
        let min_payout = 1.0;
        let max_payout = 2.0;
        let net = net_profit_per_dollar(cost, min_payout, self.economics.fee_rate);
        if !clears_profit_floor(net, self.economics.min_profit_per_dollar) {
            return None;
        }

        Some(HedgeOpportunity {
            name: format!("📊 {} ${low_threshold} vs ${high_threshold}", asset.name),
            scanner: ScannerTag::Threshold,
            hedge_type: HedgeType::Threshold,
            legs: vec![
                HedgeLeg {
                    market_id: high.id.clone(),
                    question: high.question.clone(),
                    side: Side::No,
                    price: no_high,
                    token_id: high.no_token_id.clone().unwrap_or_default(),
                    volume_24h: high.volume_24h,
                },
                HedgeLeg {
                    market_id: low.id.clone(),
                    question: low.question.clone(),
                    side: Side::Yes,
                    price: yes_low,
                    token_id: low.yes_token_id.clone(),
                    volume_24h: low.volume_24h,
                },
            ],
            total_cost: cost,
            min_payout,
            max_payout,
            guaranteed_profit: min_payout - cost,
            best_case_profit: max_payout - cost,
            net_profit_per_dollar: net,
            confidence: Confidence::Guaranteed,
            discovered_at: Utc::now(),
        })
    }
}

#[async_trait]
impl HedgeScanner for ThresholdScanner {
    fn tag(&self) -> ScannerTag {
        ScannerTag::Threshold
    }

    async fn scan(&self) -> anyhow::Result<ScanOutcome> {
        let mut outcome = ScanOutcome::default();

        for asset in &self.assets {
            let pairs = self.fetch_asset_markets(asset).await;
            outcome.markets_checked += pairs.len();
            if pairs.len() < 2 {
                continue;
            }

            for i in 0..pairs.len() {
                for j in (i + 1)..pairs.len() {
                    let (low_th, low) = &pairs[i];
                    let (high_th, high) = &pairs[j];
                    if let Some(opp) = self.build_pair(asset, *low_th, low, *high_th, high) {
                        outcome.opportunities.push(opp);
                    }
                }
            }
            debug!(asset = %asset.name, thresholds = pairs.len(), "Asset pass done");
        }

        info!(
            assets = self.assets.len(),
            markets = outcome.markets_checked,
            opportunities = outcome.opportunities.len(),
            "Threshold scan complete"
        );
        Ok(outcome)
    }
}

// ---------------------------------------------------------------------------
// Threshold parsing
// ---------------------------------------------------------------------------

/// Extract the numeric threshold from a market question.
///
/// Takes the first number above 1 (digit run with optional $, thousands
/// commas, decimal point, trailing k/m multiplier). Returns None when the
/// question does not mention the asset or no qualifying number exists.
pub fn parse_threshold(question: &str, asset: &str) -> Option<f64> {
    let text = question.to_lowercase();
    if !text.contains(&asset.to_lowercase()) {
        return None;
    }

    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if !bytes[i].is_ascii_digit() {
            i += 1;
            continue;
        }

        // Consume a digit run with embedded commas and at most one dot.
        let start = i;
        let mut seen_dot = false;
        while i < bytes.len() {
            let c = bytes[i];
            if c.is_ascii_digit() {
                i += 1;
            } else if c == b',' && i + 1 < bytes.len() && bytes[i + 1].is_ascii_digit() {
                i += 1;
            } else if c == b'.' && !seen_dot && i + 1 < bytes.len() && bytes[i + 1].is_ascii_digit()
            {
                seen_dot = true;
                i += 1;
            } else {
                break;
            }
        }

        let raw: String = text[start..i].chars().filter(|c| *c != ',').collect();
        let Ok(mut value) = raw.parse::<f64>() else {
            continue;
        };

        // Optional multiplier suffix, allowing a space before it.
        let mut j = i;
        while j < bytes.len() && bytes[j] == b' ' {
            j += 1;
        }
        if j < bytes.len() {
            match bytes[j] {
                b'k' => {
                    value *= 1_000.0;
                    i = j + 1;
                }
                b'm' => {
                    value *= 1_000_000.0;
                    i = j + 1;
                }
                _ => {}
            }
        }

        if value > 1.0 {
            return Some(value);
        }
    }

    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
