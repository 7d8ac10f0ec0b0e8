//! Order-book depth probe.
//!
//! Before a leg is bought, its token's ask ladder is swept (VWAP) to
//! verify the book can absorb the target dollar size, and the top-of-book
//! spread is checked against the configured ceiling. Every probed book
//! produces one depth-check row; probe latency and thin-book verdicts
//! feed the risk manager's kill windows.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::{debug, warn};

use crate::config::ExecutionConfig;
use crate::platforms::{BookLevel, OrderGateway};
use crate::risk::RiskManager;
use crate::storage::EventLog;
use crate::types::DepthCheck;

/// Spread reported when one side of the book is empty.
const NO_SPREAD: f64 = 999.0;

/// Sweep the ask ladder in ascending price order for `qty` shares.
/// Returns the total cost of the consumed levels and whether the ladder
/// held enough size. Never consumes more than `qty`.
pub fn vwap_cost(levels: &[BookLevel], qty: f64) -> (f64, bool) {
    if qty <= 0.0 {
        return (0.0, false);
    }

    let mut remaining = qty;
    let mut cost = 0.0;
    for level in levels {
        if level.size <= 0.0 {
            continue;
        }
        let take = remaining.min(level.size);
        cost += take * level.price;
        remaining -= take;
        if remaining <= 0.0 {
            return (cost, true);
        }
    }

    (cost, false)
}

/// Best ask − best bid, or a sentinel when either side is missing.
pub fn best_spread(bids: &[BookLevel], asks: &[BookLevel]) -> f64 {
    let best_bid = bids
        .iter()
        .map(|l| l.price)
        .fold(f64::NEG_INFINITY, f64::max);
    let best_ask = asks.iter().map(|l| l.price).fold(f64::INFINITY, f64::min);
    if best_bid.is_finite() && best_ask.is_finite() {
        best_ask - best_bid
    } else {
        NO_SPREAD
    }
}

/// Verdict for one probed leg.
#[derive(Debug, Clone)]
pub struct DepthVerdict {
    pub pass: bool,
    pub reason: String,
}

impl DepthVerdict {
    fn pass() -> Self {
        Self {
            pass: true,
            reason: "ok".to_string(),
        }
    }

    fn fail(reason: impl Into<String>) -> Self {
        Self {
            pass: false,
            reason: reason.into(),
        }
    }
}

pub struct DepthProbe {
    gateway: Arc<dyn OrderGateway>,
    log: Arc<EventLog>,
    risk: Arc<Mutex<RiskManager>>,
    max_spread: f64,
    min_depth_usd: f64,
}

impl DepthProbe {
    pub fn new(
        gateway: Arc<dyn OrderGateway>,
        log: Arc<EventLog>,
        risk: Arc<Mutex<RiskManager>>,
        execution: &ExecutionConfig,
    ) -> Self {
        Self {
            gateway,
            log,
            risk,
            max_spread: execution.max_spread,
            min_depth_usd: execution.min_depth_usd,
        }
    }

    /// Probe `token_id` for a `buy_size_usd` dollar buy.
    pub async fn check(&self, token_id: &str, buy_size_usd: f64) -> DepthVerdict {
        let t0 = Instant::now();
        let book = match self.gateway.get_order_book(token_id).await {
            Ok(book) => book,
            Err(e) => {
                // Gateway failure counts as both an API error and a thin book.
                let mut risk = self.risk.lock().expect("risk poisoned");
                risk.record_api_error();
                risk.record_thin_book(true);
                warn!(token_id, error = %e, "Depth check failed at the gateway");
                return DepthVerdict::fail(format!("depth_check_error: {e}"));
            }
        };
        let latency_ms = t0.elapsed().as_secs_f64() * 1000.0;
        self.risk
            .lock()
            .expect("risk poisoned")
            .record_latency(latency_ms);

        if book.asks.is_empty() {
            self.risk
                .lock()
                .expect("risk poisoned")
                .record_thin_book(true);
            self.record(token_id, NO_SPREAD, 0.0, 0.0, false, false);
            return DepthVerdict::fail("no_asks");
        }

        let spread = best_spread(&book.bids, &book.asks);
        let spread_ok = spread <= self.max_spread;

        // Size is quoted in shares: at best ask p, $X buys X/p tokens.
        let best_ask = book
            .asks
            .iter()
            .map(|l| l.price)
            .filter(|p| *p > 0.0)
            .fold(f64::INFINITY, f64::min);
        let token_qty = if best_ask.is_finite() && best_ask > 0.0 {
            buy_size_usd / best_ask
        } else {
            0.0
        };

        let (cost, enough) = vwap_cost(&book.asks, token_qty);
        let ask_depth_usd: f64 = book.asks.iter().map(|l| l.price * l.size).sum();
        let depth_ok = enough && ask_depth_usd >= self.min_depth_usd;

        self.risk
            .lock()
            .expect("risk poisoned")
            .record_thin_book(!depth_ok);
        self.record(token_id, spread, ask_depth_usd, cost, depth_ok, spread_ok);

        debug!(
            token_id,
            spread,
            ask_depth_usd,
            vwap = cost,
            depth_ok,
            spread_ok,
            "Depth check"
        );

        if !spread_ok {
            return DepthVerdict::fail(format!("spread_too_wide ({spread:.4})"));
        }
        if !depth_ok {
            return DepthVerdict::fail(format!(
                "insufficient_depth (${ask_depth_usd:.2} < ${:.0})",
                self.min_depth_usd
            ));
        }
        DepthVerdict::pass()
    }

    fn record(
        &self,
        token_id: &str,
        spread: f64,
        ask_depth_usd: f64,
        vwap: f64,
        depth_ok: bool,
        spread_ok: bool,
    ) {
        let check = DepthCheck {
            token_id: token_id.to_string(),
            top_spread: spread,
            ask_depth_usd,
            vwap_cost: vwap,
            depth_ok,
            spread_ok,
        };
        if let Err(e) = self.log.log_depth_check(&check) {
            warn!(error = %e, "Failed to record depth check");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
