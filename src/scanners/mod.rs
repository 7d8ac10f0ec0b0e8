//! Hedge scanners.
//!
//! Three independent detectors turn raw market snapshots into typed
//! [`HedgeOpportunity`](crate::types::HedgeOpportunity) values:
//! - `event_group` — mutually-exclusive outcome sets priced below unity
//! - `threshold` — implication pairs across numeric-threshold markets
//! - `patterns` — a curated library of named structural relations
//!
//! Scanners share one emission rule: an opportunity is emitted only when
//! its net profit per dollar (after the flat fee estimate) clears the
//! configured floor.

pub mod event_group;
pub mod patterns;
pub mod threshold;

use async_trait::async_trait;

use crate::types::{HedgeOpportunity, ScannerTag};

/// What one scanner pass produced.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub opportunities: Vec<HedgeOpportunity>,
    /// Markets (or patterns) examined, for the scan log.
    pub markets_checked: usize,
}

/// A detector run once per tick by the orchestrator. Implementations
/// tolerate per-market gateway failures internally; a `scan` error means
/// the whole pass failed and is recorded against the scan row.
#[async_trait]
pub trait HedgeScanner: Send + Sync {
    fn tag(&self) -> ScannerTag;

    async fn scan(&self) -> anyhow::Result<ScanOutcome>;
}

/// Net profit per dollar for a hedge costing `cost` with a `min_payout`
/// floor, after the flat two-sided fee estimate.
pub fn net_profit_per_dollar(cost: f64, min_payout: f64, fee_rate: f64) -> f64 {
    (min_payout - cost) / cost - 2.0 * fee_rate
}

/// Emission rule shared by all scanners.
pub fn clears_profit_floor(net: f64, min_profit_per_dollar: f64) -> bool {
    net >= min_profit_per_dollar
}
