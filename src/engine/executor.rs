//! Hedge executor.
//!
//! Sizes, depth-checks, and submits the legs of a hedge opportunity in
//! the order the opportunity declares them, recording every order row and
//! risk signal along the way. Partial fills are classified and counted
//! but not rolled back or flattened; the venue's own order list is the
//! source of truth after a restart.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::{info, warn};

use crate::config::ExecutionConfig;
use crate::engine::depth::DepthProbe;
use crate::notify::NotifySink;
use crate::platforms::OrderGateway;
use crate::risk::RiskManager;
use crate::storage::EventLog;
use crate::types::{HedgeOpportunity, IncidentKind, OrderStatus};

/// A leg that reached the venue and was accepted.
#[derive(Debug, Clone)]
pub struct ExecutedLeg {
    pub market_id: String,
    pub side: crate::types::Side,
    pub price: f64,
    pub size_shares: f64,
    pub amount_usd: f64,
    pub order_id: String,
}

/// Outcome of one execution attempt.
#[derive(Debug, Clone, Default)]
pub struct ExecReport {
    /// Every leg was accepted.
    pub executed: bool,
    /// Some but not all legs were accepted, or a leg failed after
    /// sizing — the book position is unbalanced.
    pub partial: bool,
    pub legs: Vec<ExecutedLeg>,
    pub total_spent: f64,
    pub errors: Vec<String>,
}

pub struct Executor {
    orders: Arc<dyn OrderGateway>,
    depth: DepthProbe,
    log: Arc<EventLog>,
    risk: Arc<Mutex<RiskManager>>,
    sink: Arc<dyn NotifySink>,
    execution: ExecutionConfig,
    /// The kill-switch notification fires once per trip, not per blocked
    /// trade; incidents are still recorded every time.
    kill_alert_sent: AtomicBool,
}

impl Executor {
    pub fn new(
        orders: Arc<dyn OrderGateway>,
        depth: DepthProbe,
        log: Arc<EventLog>,
        risk: Arc<Mutex<RiskManager>>,
        sink: Arc<dyn NotifySink>,
        execution: ExecutionConfig,
    ) -> Self {
        Self {
            orders,
            depth,
            log,
            risk,
            sink,
            execution,
            kill_alert_sent: AtomicBool::new(false),
        }
    }

    /// Execute a hedge. Preconditions short-circuit with the reason in
    /// `errors`; legs are then attempted in declaration order.
    pub async fn execute(&self, opp: &HedgeOpportunity) -> ExecReport {
        let mut report = ExecReport::default();

        if !self.execution.auto_trade || !self.orders.is_executable() {
            report.errors.push("auto_trade_off_or_no_clob".to_string());
            return report;
        }

        // Kill switch gate.
        let killed = self.risk.lock().expect("risk poisoned").should_kill();
        if killed {
            let reason = self
                .risk
                .lock()
                .expect("risk poisoned")
                .kill_reason()
                .to_string();
            if let Err(e) = self.log.log_incident(
                IncidentKind::KillSwitch,
                &format!("Blocked trade: {}", opp.name),
                Some(&reason),
            ) {
                warn!(error = %e, "Failed to record kill-switch incident");
            }
            report.errors.push(format!("kill_switch: {reason}"));

            if !self.kill_alert_sent.swap(true, Ordering::SeqCst) {
                self.sink
                    .send(&format!(
                        "⛔ <b>KILL SWITCH TRIGGERED</b>\nReason: {reason}\nBlocked: {}\nTrading suspended until restart.",
                        opp.name
                    ))
                    .await;
            }
            return report;
        }

        // Exposure gate.
        let trade_size = self.execution.trade_budget;
        {
            let risk = self.risk.lock().expect("risk poisoned");
            if !risk.can_take_trade(self.execution.bankroll, trade_size) {
                report.errors.push(format!(
                    "exposure_limit (current ${:.2}, max ${:.2})",
                    risk.current_open_exposure(),
                    risk.exposure_cap(self.execution.bankroll),
                ));
                return report;
            }
        }

        if opp.total_cost <= 0.0 {
            report.errors.push("invalid_cost".to_string());
            return report;
        }

        let scale = trade_size / opp.total_cost;
        let total_legs = opp.legs.len();
        let mut legs_ok = 0usize;

        for leg in &opp.legs {
            if leg.token_id.is_empty() {
                let q: String = leg.question.chars().take(30).collect();
                report.errors.push(format!("no_token_id for {q}"));
                continue;
            }

            let leg_amount_usd = leg.price * scale;
            let leg_size = if leg.price > 0.0 {
                leg_amount_usd / leg.price
            } else {
                0.0
            };

            // Verify the book can absorb the leg before committing.
            let verdict = self.depth.check(&leg.token_id, leg_amount_usd).await;
            if !verdict.pass {
                report
                    .errors
                    .push(format!("depth_fail ({}): {}", leg.side, verdict.reason));
                report.partial = true;
                continue;
            }

            let t0 = Instant::now();
            let result = self
                .orders
                .place_limit_buy_gtc(&leg.token_id, leg.price, leg_size)
                .await;
            let latency_ms = t0.elapsed().as_secs_f64() * 1000.0;
            self.risk
                .lock()
                .expect("risk poisoned")
                .record_latency(latency_ms);

            match result {
                Ok(ack) if ack.error.is_none() => {
                    self.risk.lock().expect("risk poisoned").record_trade();
                    self.log_order(opp, leg, &ack.order_id, OrderStatus::Submitted, None, latency_ms, leg_size);
                    report.legs.push(ExecutedLeg {
                        market_id: leg.market_id.clone(),
                        side: leg.side,
                        price: leg.price,
                        size_shares: leg_size,
                        amount_usd: leg_amount_usd,
                        order_id: ack.order_id,
                    });
                    report.total_spent += leg_amount_usd;
                    legs_ok += 1;
                }
                Ok(ack) => {
                    let err = ack.error.unwrap_or_else(|| "rejected".to_string());
                    self.risk.lock().expect("risk poisoned").record_api_error();
                    self.log_order(opp, leg, "", OrderStatus::Error, Some(&err), latency_ms, leg_size);
                    report.errors.push(format!("order_error ({}): {err}", leg.side));
                    report.partial = true;
                }
                Err(e) => {
                    self.risk.lock().expect("risk poisoned").record_api_error();
                    let err = e.to_string();
                    self.log_order(opp, leg, "", OrderStatus::Exception, Some(&err), latency_ms, leg_size);
                    report.errors.push(format!("exception ({}): {err}", leg.side));
                    report.partial = true;
                }
            }
        }

        // Classify the attempt.
        if legs_ok == total_legs && total_legs > 0 {
            report.executed = true;
            let mut risk = self.risk.lock().expect("risk poisoned");
            risk.record_hedged_complete();
            risk.add_exposure(report.total_spent);
            drop(risk);
            if let Err(e) = self.log.log_pnl(
                trade_size,
                report.total_spent,
                0.0,
                &format!("Hedge executed: {}", opp.name),
            ) {
                warn!(error = %e, "Failed to record pnl row");
            }
            info!(
                name = %opp.name,
                spent = format!("${:.2}", report.total_spent),
                legs = legs_ok,
                "Hedge fully executed"
            );
        } else if legs_ok > 0 {
            report.partial = true;
            let mut risk = self.risk.lock().expect("risk poisoned");
            risk.record_partial_fill();
            risk.add_exposure(report.total_spent);
            drop(risk);
            if let Err(e) = self.log.log_incident(
                IncidentKind::PartialFill,
                &format!("{legs_ok}/{total_legs} legs filled for {}", opp.name),
                None,
            ) {
                warn!(error = %e, "Failed to record partial-fill incident");
            }
            warn!(
                name = %opp.name,
                filled = legs_ok,
                total = total_legs,
                "Partial execution — position is unbalanced"
            );
        }

        report
    }

    #[allow(clippy::too_many_arguments)]
    fn log_order(
        &self,
        opp: &HedgeOpportunity,
        leg: &crate::types::HedgeLeg,
        order_id: &str,
        status: OrderStatus,
        error: Option<&str>,
        latency_ms: f64,
        size: f64,
    ) {
        if let Err(e) = self.log.log_order(
            &opp.name,
            &leg.market_id,
            &leg.token_id,
            leg.side,
            leg.price,
            size,
            order_id,
            status,
            error,
            latency_ms,
        ) {
            warn!(error = %e, "Failed to record order row");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
