//! Shared types for the hedge engine.
//!
//! These types form the data model used across all modules.
//! Markets are rebuilt fresh each scan from the gateway; opportunities
//! are value types produced by the scanners and consumed by the
//! executor and reporter without shared mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Market
// ---------------------------------------------------------------------------

/// A single binary-outcome market, normalised from the venue's JSON by
/// the market gateway. Immutable within a scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub id: String,
    pub question: String,
    /// Current YES price (0.0–1.0)
    pub yes_price: f64,
    /// Current NO price (0.0–1.0)
    pub no_price: f64,
    /// CLOB token id for the YES side
    pub yes_token_id: String,
    /// CLOB token id for the NO side, absent on some markets
    pub no_token_id: Option<String>,
    /// 24-hour volume in USD
    pub volume_24h: f64,
    pub active: bool,
    pub closed: bool,
    pub resolved: bool,
    pub end_date: Option<DateTime<Utc>>,
}

impl Market {
    /// Whether the market can still be traded this scan.
    pub fn is_tradeable(&self) -> bool {
        self.active && !self.closed && !self.resolved
    }

    /// Helper to build a test market with sensible defaults.
    #[cfg(test)]
    pub fn sample(id: &str, question: &str, yes: f64, no: f64) -> Self {
        Market {
            id: id.to_string(),
            question: question.to_string(),
            yes_price: yes,
            no_price: no,
            yes_token_id: format!("{id}-yes"),
            no_token_id: Some(format!("{id}-no")),
            volume_24h: 10_000.0,
            active: true,
            closed: false,
            resolved: false,
            end_date: None,
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (YES: {:.0}¢ | NO: {:.0}¢ | vol: ${:.0})",
            self.question,
            self.yes_price * 100.0,
            self.no_price * 100.0,
            self.volume_24h,
        )
    }
}

/// An ordered collection of markets sharing one event title/description.
/// If the event is semantically exclusive, exactly one market resolves YES.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketGroup {
    pub id: String,
    pub title: String,
    pub description: String,
    pub markets: Vec<Market>,
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Position direction on a binary market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Yes,
    No,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Yes => write!(f, "YES"),
            Side::No => write!(f, "NO"),
        }
    }
}

/// Which scanner produced an opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScannerTag {
    EventGroup,
    Threshold,
    Pattern,
}

impl ScannerTag {
    /// Stable identifier used in the event log and scan rows.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScannerTag::EventGroup => "event_group",
            ScannerTag::Threshold => "threshold",
            ScannerTag::Pattern => "pattern",
        }
    }
}

impl fmt::Display for ScannerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structural relation a hedge exploits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HedgeType {
    /// Sum of same-side prices across an exclusive group below unity.
    GroupArb,
    /// NO(high) + YES(low) across two numeric-threshold markets.
    Threshold,
    /// A ∨ B certain: both-YES costs under $1.
    Complementary,
    /// A ∧ B impossible: both-NO pays $1 minimum.
    Exclusive,
    /// A ⇒ B: YES(B) + NO(A) pays $1 minimum.
    Superset,
}

impl HedgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HedgeType::GroupArb => "group_arb",
            HedgeType::Threshold => "threshold",
            HedgeType::Complementary => "complementary",
            HedgeType::Exclusive => "exclusive",
            HedgeType::Superset => "superset",
        }
    }
}

impl fmt::Display for HedgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How certain the payout floor is. Always `Guaranteed` by construction
/// for the current scanners; weaker grades are reserved for relations
/// whose structure is inferred rather than proven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    Guaranteed,
    High,
    Medium,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Guaranteed => "GUARANTEED",
            Confidence::High => "HIGH",
            Confidence::Medium => "MEDIUM",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Hedge opportunity
// ---------------------------------------------------------------------------

/// One leg of a hedge: a position to buy on a specific market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HedgeLeg {
    pub market_id: String,
    pub question: String,
    pub side: Side,
    pub price: f64,
    /// CLOB token id for the side being bought. Empty when the venue did
    /// not expose one; such legs are rejected at execution time.
    pub token_id: String,
    pub volume_24h: f64,
}

/// A discovered hedge: an ordered set of legs whose combined cost is
/// strictly below their combined minimum payout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HedgeOpportunity {
    pub name: String,
    pub scanner: ScannerTag,
    pub hedge_type: HedgeType,
    pub legs: Vec<HedgeLeg>,
    /// Σ leg prices
    pub total_cost: f64,
    /// Minimum guaranteed payout per unit
    pub min_payout: f64,
    /// Maximum possible payout per unit
    pub max_payout: f64,
    /// min_payout − total_cost
    pub guaranteed_profit: f64,
    /// max_payout − total_cost
    pub best_case_profit: f64,
    /// guaranteed_profit / total_cost − 2·fee_rate
    pub net_profit_per_dollar: f64,
    pub confidence: Confidence,
    pub discovered_at: DateTime<Utc>,
}

impl HedgeOpportunity {
    /// Stable fingerprint over the involved market ids, independent of
    /// leg order. Used to suppress duplicate alerts across scans.
    pub fn alert_key(&self) -> String {
        let mut ids: Vec<&str> = self.legs.iter().map(|l| l.market_id.as_str()).collect();
        ids.sort_unstable();
        ids.join("|")
    }

    /// Ordered market ids as stored in the opportunities table.
    pub fn market_ids(&self) -> Vec<String> {
        self.legs.iter().map(|l| l.market_id.clone()).collect()
    }
}

impl fmt::Display for HedgeOpportunity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}/{}] cost=${:.4} floor=${:.2} net={:+.4}/$",
            self.name,
            self.scanner,
            self.hedge_type,
            self.total_cost,
            self.min_payout,
            self.net_profit_per_dollar,
        )
    }
}

// ---------------------------------------------------------------------------
// Audit records
// ---------------------------------------------------------------------------

/// Terminal status of an order submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Accepted by the venue, resting or matched.
    Submitted,
    /// Confirmed filled (recorded from fills, not set by the executor).
    Filled,
    /// Venue-side rejection with a message.
    Error,
    /// Transport or signing failure before the venue answered.
    Exception,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Submitted => "submitted",
            OrderStatus::Filled => "filled",
            OrderStatus::Error => "error",
            OrderStatus::Exception => "exception",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Category of an incident row in the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncidentKind {
    KillSwitch,
    PartialFill,
    ScanError,
    OrderError,
    /// Keyword heuristic matched but the overround band did not.
    MisExclusivity,
}

impl IncidentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentKind::KillSwitch => "kill_switch",
            IncidentKind::PartialFill => "partial_fill",
            IncidentKind::ScanError => "scan_error",
            IncidentKind::OrderError => "order_error",
            IncidentKind::MisExclusivity => "mis_exclusivity",
        }
    }
}

impl fmt::Display for IncidentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a single order-book depth probe, one row per attempted leg.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthCheck {
    pub token_id: String,
    /// Best ask − best bid.
    pub top_spread: f64,
    /// Σ price·size over all parsed ask levels, in USD.
    pub ask_depth_usd: f64,
    /// Cost of sweeping the target quantity up the ask ladder.
    pub vwap_cost: f64,
    pub depth_ok: bool,
    pub spread_ok: bool,
}

// ---------------------------------------------------------------------------
// Gateway errors
// ---------------------------------------------------------------------------

/// Typed discriminant for gateway failures. The risk manager counts every
/// variant as an API error; the scanners continue with the next market.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        GatewayError::Transport(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
