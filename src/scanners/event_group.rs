//! Event-group arbitrage scanner.
//!
//! An exclusive event resolves exactly one of its outcomes YES. When the
//! summed YES prices across the group fall below $1, buying YES on every
//! outcome locks in the difference; summed NO prices below $1 work the
//! same way from the other side. Exclusivity is inferred from a keyword
//! heuristic plus an overround sanity band — groups that match keywords
//! but price far from a coherent book are recorded as mis-exclusivity
//! incidents instead of scanned.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::EconomicsConfig;
use crate::platforms::MarketGateway;
use crate::risk::RiskManager;
use crate::scanners::{clears_profit_floor, net_profit_per_dollar, HedgeScanner, ScanOutcome};
use crate::storage::EventLog;
use crate::types::{
    Confidence, HedgeLeg, HedgeOpportunity, HedgeType, IncidentKind, Market, MarketGroup,
    ScannerTag, Side,
};

/// Event groups fetched per scan.
const EVENT_LIMIT: u32 = 50;
/// Overround sanity band for the exclusivity heuristic.
const OVERROUND_MIN: f64 = 0.8;
const OVERROUND_MAX: f64 = 1.2;
/// Minimum outcomes for a group arb to be meaningful.
const MIN_GROUP_SIZE: usize = 3;

pub struct EventGroupScanner {
    gateway: Arc<dyn MarketGateway>,
    log: Arc<EventLog>,
    risk: Arc<Mutex<RiskManager>>,
    economics: EconomicsConfig,
    keywords: Vec<String>,
}

impl EventGroupScanner {
    pub fn new(
        gateway: Arc<dyn MarketGateway>,
        log: Arc<EventLog>,
        risk: Arc<Mutex<RiskManager>>,
        economics: EconomicsConfig,
        keywords: Vec<String>,
    ) -> Self {
        Self {
            gateway,
            log,
            risk,
            economics,
            keywords,
        }
    }

    /// Keyword half of the exclusivity heuristic.
    fn matches_keywords(&self, group: &MarketGroup) -> bool {
        let title = group.title.to_lowercase();
        let desc = group.description.to_lowercase();
        self.keywords
            .iter()
            .any(|k| title.contains(k.as_str()) || desc.contains(k.as_str()))
    }

    /// Price half: Σ YES inside the overround band.
    fn within_overround_band(markets: &[Market]) -> bool {
        let total_yes: f64 = markets.iter().map(|m| m.yes_price).sum();
        (OVERROUND_MIN..=OVERROUND_MAX).contains(&total_yes)
    }

    /// Build the all-YES or all-NO opportunity for one group, if the
    /// summed cost clears the profit floor.
    fn build_side(
        &self,
        group: &MarketGroup,
        markets: &[Market],
        side: Side,
    ) -> Option<HedgeOpportunity> {
        let legs: Vec<HedgeLeg> = markets
            .iter()
            .map(|m| {
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
            })
            .collect();

        let cost: f64 = legs.iter().map(|l| l.price).sum();
        let fee = self.economics.fee_rate;
        if !(cost > 0.0 && cost < 1.0 - self.economics.min_profit_per_dollar - 2.0 * fee) {
            return None;
        }

        let net = net_profit_per_dollar(cost, 1.0, fee);
        if !clears_profit_floor(net, self.economics.min_profit_per_dollar) {
            return None;
        }

        let title: String = group.title.chars().take(40).collect();
        let name = match side {
            Side::Yes => format!("📦 {title}"),
            Side::No => format!("📦🔄 {title}"),
        };

        Some(HedgeOpportunity {
            name,
            scanner: ScannerTag::EventGroup,
            hedge_type: HedgeType::GroupArb,
            legs,
            total_cost: cost,
            min_payout: 1.0,
            max_payout: 1.0,
            guaranteed_profit: 1.0 - cost,
            best_case_profit: 1.0 - cost,
            net_profit_per_dollar: net,
            confidence: Confidence::Guaranteed,
            discovered_at: Utc::now(),
        })
    }

    fn scan_group(&self, group: &MarketGroup) -> (Vec<HedgeOpportunity>, usize) {
        let active: Vec<Market> = group
            .markets
            .iter()
            .filter(|m| m.is_tradeable())
            .cloned()
            .collect();
        let checked = active.len();

        if active.len() < MIN_GROUP_SIZE {
            return (Vec::new(), checked);
        }

        let total_volume: f64 = active.iter().map(|m| m.volume_24h).sum();
        if total_volume < self.economics.min_event_volume_24h {
            return (Vec::new(), checked);
        }

        if !self.matches_keywords(group) {
            return (Vec::new(), checked);
        }
        if !Self::within_overround_band(&active) {
            // The keywords say exclusive, the prices disagree — worth an
            // incident row so misclassified categories surface in review.
            let total_yes: f64 = active.iter().map(|m| m.yes_price).sum();
            if let Err(e) = self.log.log_incident(
                IncidentKind::MisExclusivity,
                &format!("{} — Σ YES {total_yes:.3} outside [0.8, 1.2]", group.title),
                None,
            ) {
                warn!(error = %e, "Failed to record mis-exclusivity incident");
            }
            return (Vec::new(), checked);
        }

        let mut opportunities = Vec::new();
        if let Some(opp) = self.build_side(group, &active, Side::Yes) {
            opportunities.push(opp);
        }
        if let Some(opp) = self.build_side(group, &active, Side::No) {
            opportunities.push(opp);
        }
        (opportunities, checked)
    }
}

#[async_trait]
impl HedgeScanner for EventGroupScanner {
    fn tag(&self) -> ScannerTag {
        ScannerTag::EventGroup
    }

    async fn scan(&self) -> anyhow::Result<ScanOutcome> {
        let events = match self.gateway.get_events(EVENT_LIMIT).await {
            Ok(events) => events,
            Err(e) => {
                self.risk.lock().expect("risk poisoned").record_api_error();
                return Err(e.into());
            }
        };

        let mut outcome = ScanOutcome::default();
        for group in &events {
            let (opps, checked) = self.scan_group(group);
            outcome.markets_checked += checked;
            outcome.opportunities.extend(opps);
        }

        info!(
            events = events.len(),
            markets = outcome.markets_checked,
            opportunities = outcome.opportunities.len(),
            "Event group scan complete"
        );
        debug!(tag = %self.tag(), "scan pass done");
        Ok(outcome)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
