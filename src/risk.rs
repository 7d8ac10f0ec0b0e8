//! Risk manager.
//!
//! Seven kill switches protect the engine from runaway losses: partial
//! fill streak, daily partial fills, API error rate, thin-book streak,
//! order latency, trade rate, and the exposure cap. The first six latch
//! the manager into a killed state via [`RiskManager::should_kill`]; the
//! exposure cap is enforced per trade by [`RiskManager::can_take_trade`].
//! Once latched, scanning continues but execution stays blocked until the
//! process restarts.

use std::time::{Duration, Instant};

use tracing::warn;

use crate::config::KillConfig;

/// Rolling window for API error timestamps.
const API_ERROR_WINDOW: Duration = Duration::from_secs(600);
/// Rolling window for trade timestamps.
const TRADE_WINDOW: Duration = Duration::from_secs(3600);

pub struct RiskManager {
    limits: KillConfig,
    partial_fill_streak: u32,
    partial_fill_day: u32,
    api_errors: Vec<Instant>,
    latency_window: Vec<(Instant, f64)>,
    thin_book_streak: u32,
    trades: Vec<Instant>,
    current_open_exposure: f64,
    killed: bool,
    kill_reason: String,
}

impl RiskManager {
    pub fn new(limits: KillConfig) -> Self {
        Self {
            limits,
            partial_fill_streak: 0,
            partial_fill_day: 0,
            api_errors: Vec::new(),
            latency_window: Vec::new(),
            thin_book_streak: 0,
            trades: Vec::new(),
            current_open_exposure: 0.0,
            killed: false,
            kill_reason: String::new(),
        }
    }

    // -- Record hooks ----------------------------------------------------

    pub fn record_partial_fill(&mut self) {
        self.partial_fill_streak += 1;
        self.partial_fill_day += 1;
    }

    /// A fully hedged execution resets the consecutive-partial streak.
    pub fn record_hedged_complete(&mut self) {
        self.partial_fill_streak = 0;
    }

    pub fn record_api_error(&mut self) {
        self.record_api_error_at(Instant::now());
    }

    fn record_api_error_at(&mut self, now: Instant) {
        self.api_errors.push(now);
        self.api_errors
            .retain(|t| now.duration_since(*t) <= API_ERROR_WINDOW);
    }

    pub fn record_latency(&mut self, ms: f64) {
        self.record_latency_at(Instant::now(), ms);
    }

    fn record_latency_at(&mut self, now: Instant, ms: f64) {
        let window = Duration::from_secs(self.limits.latency_window_sec);
        self.latency_window.push((now, ms));
        self.latency_window
            .retain(|(t, _)| now.duration_since(*t) <= window);
    }

    pub fn record_thin_book(&mut self, thin: bool) {
        if thin {
            self.thin_book_streak += 1;
        } else {
            self.thin_book_streak = 0;
        }
    }

    pub fn record_trade(&mut self) {
        self.record_trade_at(Instant::now());
    }

    fn record_trade_at(&mut self, now: Instant) {
        self.trades.push(now);
        self.trades
            .retain(|t| now.duration_since(*t) <= TRADE_WINDOW);
    }

    // -- Exposure --------------------------------------------------------

    pub fn add_exposure(&mut self, usd: f64) {
        self.current_open_exposure += usd;
    }

    /// Never drives exposure below zero.
    pub fn reduce_exposure(&mut self, usd: f64) {
        self.current_open_exposure = (self.current_open_exposure - usd).max(0.0);
    }

    pub fn current_open_exposure(&self) -> f64 {
        self.current_open_exposure
    }

    /// Dollar exposure cap for the given bankroll.
    pub fn exposure_cap(&self, bankroll: f64) -> f64 {
        bankroll * self.limits.max_exposure_pct
    }

    /// Whether adding `exposure_add` of open exposure stays within the
    /// bankroll cap. A non-positive bankroll denies everything.
    pub fn can_take_trade(&self, bankroll: f64, exposure_add: f64) -> bool {
        if bankroll <= 0.0 {
            return false;
        }
        let projected = self.current_open_exposure + exposure_add;
        projected <= bankroll * self.limits.max_exposure_pct
    }

    // -- Kill evaluation -------------------------------------------------

    /// Evaluate the latched kill conditions in order. The first tripped
    /// condition latches the manager; subsequent calls short-circuit to
    /// `true` without re-evaluating.
    pub fn should_kill(&mut self) -> bool {
        if self.killed {
            return true;
        }

        if self.partial_fill_streak >= self.limits.partial_fill_streak {
            return self.trip(format!("partial_fill_streak ({})", self.partial_fill_streak));
        }
        if self.partial_fill_day >= self.limits.partial_fill_day {
            return self.trip(format!("partial_fill_day ({})", self.partial_fill_day));
        }
        if self.api_errors.len() >= self.limits.api_errors_10m {
            return self.trip(format!("api_errors ({} in 10m)", self.api_errors.len()));
        }
        if self.thin_book_streak >= self.limits.thin_book_scans {
            return self.trip(format!("thin_book_streak ({})", self.thin_book_streak));
        }
        if !self.latency_window.is_empty() {
            let avg = self.latency_window.iter().map(|(_, v)| v).sum::<f64>()
                / self.latency_window.len() as f64;
            if avg >= self.limits.latency_ms {
                return self.trip(format!("latency ({avg:.0}ms avg)"));
            }
        }
        if self.trades.len() >= self.limits.max_trades_per_hour {
            return self.trip(format!("max_trades_per_hour ({})", self.trades.len()));
        }

        false
    }

    fn trip(&mut self, reason: String) -> bool {
        warn!(reason = %reason, "Kill switch tripped — trading suspended until restart");
        self.kill_reason = reason;
        self.killed = true;
        true
    }

    pub fn is_killed(&self) -> bool {
        self.killed
    }

    pub fn kill_reason(&self) -> &str {
        &self.kill_reason
    }

    /// Human-readable state block for the interval summary.
    pub fn status_text(&self) -> String {
        let mut lines = vec![
            format!(
                "  Partial fills (streak/day): {}/{}",
                self.partial_fill_streak, self.partial_fill_day
            ),
            format!("  API errors (10m): {}", self.api_errors.len()),
            format!("  Thin book streak: {}", self.thin_book_streak),
            format!("  Trades (1h): {}", self.trades.len()),
            format!("  Open exposure: ${:.2}", self.current_open_exposure),
        ];
        if !self.latency_window.is_empty() {
            let avg = self.latency_window.iter().map(|(_, v)| v).sum::<f64>()
                / self.latency_window.len() as f64;
            lines.push(format!("  Avg latency: {avg:.0}ms"));
        }
        if self.killed {
            lines.push(format!("  ⛔ KILLED: {}", self.kill_reason));
        }
        lines.join("\n")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
