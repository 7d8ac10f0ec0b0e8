//! Known-pattern scanner.
//!
//! A curated library of named market relations, each naming two search
//! terms and the structural relation between the matching markets:
//!
//! - `complementary` — A ∨ B must hold, buy YES on both
//! - `exclusive` — A ∧ B cannot both hold, buy NO on both
//! - `superset` — A strictly implies B, buy YES(B) + NO(A)
//!
//! The static library ships with the binary; operator-discovered
//! relations are loaded from a JSON file at startup and can be appended
//! at runtime.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::EconomicsConfig;
use crate::platforms::MarketGateway;
use crate::risk::RiskManager;
use crate::scanners::{clears_profit_floor, net_profit_per_dollar, HedgeScanner, ScanOutcome};
use crate::types::{
    Confidence, HedgeLeg, HedgeOpportunity, HedgeType, Market, ScannerTag, Side,
};

/// Search hits examined per term; the top hit is used.
const SEARCH_LIMIT: u32 = 5;

/// One entry in the pattern library.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternDef {
    pub name: String,
    pub search_a: String,
    pub search_b: String,
    pub hedge_type: HedgeType,
    #[serde(default)]
    pub description: String,
}

/// The built-in relation library.
pub fn builtin_patterns() -> Vec<PatternDef> {
    let def = |name: &str, a: &str, b: &str, hedge_type: HedgeType, desc: &str| PatternDef {
        name: name.to_string(),
        search_a: a.to_string(),
        search_b: b.to_string(),
        hedge_type,
        description: desc.to_string(),
    };
    vec![
        def(
            "Fed Rates: Decrease vs Increase",
            "Fed decrease interest rates",
            "Fed increase interest rates",
            HedgeType::Complementary,
            "Fed can decrease OR increase. Buy YES decrease + NO increase.",
        ),
        def(
            "Fed Rates: No Change vs Increase",
            "no change in Fed interest rates",
            "Fed increase interest rates",
            HedgeType::Complementary,
            "If the Fed doesn't change, they won't increase.",
        ),
        def(
            "Trump Nom: Shelton vs No One",
            "Trump nominate Judy Shelton",
            "Trump nominate no one",
            HedgeType::Exclusive,
            "Can't nominate Shelton AND no one at the same time.",
        ),
        def(
            "Trump Nom: Miran vs No One",
            "Trump nominate Stephen Miran",
            "Trump nominate no one",
            HedgeType::Exclusive,
            "Can't nominate Miran AND no one at the same time.",
        ),
        def(
            "Iran Strike Timeframe",
            "strikes Iran by February",
            "strikes Iran by March",
            HedgeType::Superset,
            "Strike by Feb → strike by March too. Hedge: YES(March) + NO(Feb).",
        ),
    ]
}

pub struct PatternScanner {
    gateway: Arc<dyn MarketGateway>,
    risk: Arc<Mutex<RiskManager>>,
    economics: EconomicsConfig,
    patterns: Vec<PatternDef>,
    patterns_file: String,
}

impl PatternScanner {
    /// Build with the static library plus any relations discovered in
    /// `patterns_file` (missing or malformed files are tolerated).
    pub fn new(
        gateway: Arc<dyn MarketGateway>,
        risk: Arc<Mutex<RiskManager>>,
        economics: EconomicsConfig,
        patterns_file: &str,
    ) -> Self {
        let mut patterns = builtin_patterns();
        match load_discovered(patterns_file) {
            Ok(discovered) if !discovered.is_empty() => {
                info!(count = discovered.len(), "Loaded discovered patterns");
                patterns.extend(discovered);
            }
            Ok(_) => {}
            Err(e) => warn!(path = patterns_file, error = %e, "Ignoring discovered patterns"),
        }
        Self {
            gateway,
            risk,
            economics,
            patterns,
            patterns_file: patterns_file.to_string(),
        }
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Append a newly discovered relation to the patterns file.
    pub fn save_pattern(&self, pattern: &PatternDef) -> anyhow::Result<()> {
        let mut saved = load_discovered(&self.patterns_file).unwrap_or_default();
        saved.push(pattern.clone());
        if let Some(parent) = Path::new(&self.patterns_file).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.patterns_file, serde_json::to_string_pretty(&saved)?)?;
        Ok(())
    }

    async fn find_market(&self, search: &str) -> Option<Market> {
        match self.gateway.search_markets(search, SEARCH_LIMIT).await {
            Ok(markets) => markets.into_iter().next(),
            Err(e) => {
                warn!(search, error = %e, "Pattern search failed");
                self.risk.lock().expect("risk poisoned").record_api_error();
                None
            }
        }
    }

    /// Leg construction per relation type. Returns None when the prices
    /// do not clear the profit floor.
    fn build_opportunity(
        &self,
        pat: &PatternDef,
        market_a: &Market,
        market_b: &Market,
    ) -> Option<HedgeOpportunity> {
        let leg = |m: &Market, side: Side| {
            let (price, token_id) = match side {
                Side::Yes => (m.yes_price, m.yes_token_id.clone()),
                Side::No => (m.no_price, m.no_token_id.clone().unwrap_or_default()),
            };
            HedgeLeg {
                market_id: m.id.clone(),
                question: m.question.clone(),
                side,
                price,
                token_id,
                volume_24h: m.volume_24h,
            }
        };

        let (emoji, legs, max_payout) = match pat.hedge_type {
            HedgeType::Complementary => {
                ("🔗", vec![leg(market_a, Side::Yes), leg(market_b, Side::Yes)], 1.0)
            }
            HedgeType::Exclusive => {
                ("❌", vec![leg(market_a, Side::No), leg(market_b, Side::No)], 2.0)
            }
            HedgeType::Superset => {
                // A is the stronger claim: YES on the weaker B, NO on A.
                ("⏰", vec![leg(market_b, Side::Yes), leg(market_a, Side::No)], 2.0)
            }
            // The library only holds two-leg relations.
            HedgeType::GroupArb | HedgeType::Threshold => return None,
        };

        let cost: f64 = legs.iter().map(|l| l.price).sum();
        if cost <= 0.0 || cost >= 1.0 {
            return None;
        }
        let net = net_profit_per_dollar(cost, 1.0, self.economics.fee_rate);
        if !clears_profit_floor(net, self.economics.min_profit_per_dollar) {
            return None;
        }

        Some(HedgeOpportunity {
            name: format!("{emoji} {}", pat.name),
            scanner: ScannerTag::Pattern,
            hedge_type: pat.hedge_type,
            legs,
            total_cost: cost,
            min_payout: 1.0,
            max_payout,
            guaranteed_profit: 1.0 - cost,
            best_case_profit: max_payout - cost,
            net_profit_per_dollar: net,
            confidence: Confidence::Guaranteed,
            discovered_at: Utc::now(),
        })
    }
}

#[async_trait]
impl HedgeScanner for PatternScanner {
    fn tag(&self) -> ScannerTag {
        ScannerTag::Pattern
    }

    async fn scan(&self) -> anyhow::Result<ScanOutcome> {
        let mut outcome = ScanOutcome {
            opportunities: Vec::new(),
            markets_checked: self.patterns.len(),
        };

        for pat in &self.patterns {
            let Some(market_a) = self.find_market(&pat.search_a).await else {
                continue;
            };
            let Some(market_b) = self.find_market(&pat.search_b).await else {
                continue;
            };
            if market_a.closed || market_b.closed {
                debug!(pattern = %pat.name, "Pattern market closed, skipping");
                continue;
            }

            if let Some(opp) = self.build_opportunity(pat, &market_a, &market_b) {
                outcome.opportunities.push(opp);
            }
        }

        info!(
            patterns = self.patterns.len(),
            opportunities = outcome.opportunities.len(),
            "Pattern scan complete"
        );
        Ok(outcome)
    }
}

fn load_discovered(path: &str) -> anyhow::Result<Vec<PatternDef>> {
    if !Path::new(path).exists() {
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
