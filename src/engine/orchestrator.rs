//! Orchestrator — owns the scan clock and drives everything else.
//!
//! One tick: run the three scanners in a fixed order, log a scan row per
//! scanner, process discovered opportunities in descending net-profit
//! order (ties broken by alert key), execute when allowed, then send the
//! tick's notifications after every log write for the tick has landed.
//! The alert-dedup map lives here and is pruned at the end of each tick.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::engine::executor::{ExecReport, Executor};
use crate::engine::reporter::{Reporter, SummarySnapshot};
use crate::platforms::OrderGateway;
use crate::risk::RiskManager;
use crate::scanners::HedgeScanner;
use crate::storage::EventLog;
use crate::types::{HedgeOpportunity, IncidentKind};

/// Every Nth empty scan emits a heartbeat note.
const QUIET_SCAN_HEARTBEAT: u64 = 5;

/// Re-alert rule: a known opportunity alerts again only when its profit
/// moved by more than `threshold` relative to the last alerted value.
pub fn should_realert(previous: f64, current: f64, threshold: f64) -> bool {
    let change = (current - previous).abs() / previous.abs().max(0.001);
    change > threshold
}

/// Deterministic processing order: best net profit first, alert key as
/// the tiebreaker.
pub fn sort_opportunities(opps: &mut [HedgeOpportunity]) {
    opps.sort_by(|a, b| {
        b.net_profit_per_dollar
            .partial_cmp(&a.net_profit_per_dollar)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.alert_key().cmp(&b.alert_key()))
    });
}

pub struct Orchestrator {
    config: Arc<AppConfig>,
    scanners: Vec<Box<dyn HedgeScanner>>,
    executor: Executor,
    reporter: Reporter,
    log: Arc<EventLog>,
    risk: Arc<Mutex<RiskManager>>,
    orders: Arc<dyn OrderGateway>,
    pattern_count: usize,

    alerted: HashMap<String, f64>,
    scan_count: u64,
    total_opps_found: u64,
    total_trades_executed: u64,
    started_at: chrono::DateTime<Utc>,
    last_summary: Instant,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<AppConfig>,
        scanners: Vec<Box<dyn HedgeScanner>>,
        executor: Executor,
        reporter: Reporter,
        log: Arc<EventLog>,
        risk: Arc<Mutex<RiskManager>>,
        orders: Arc<dyn OrderGateway>,
        pattern_count: usize,
    ) -> Self {
        Self {
            config,
            scanners,
            executor,
            reporter,
            log,
            risk,
            orders,
            pattern_count,
            alerted: HashMap::new(),
            scan_count: 0,
            total_opps_found: 0,
            total_trades_executed: 0,
            started_at: Utc::now(),
            last_summary: Instant::now(),
        }
    }

    /// Main loop. Returns after a stop signal, with one final summary
    /// emitted on the way out.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        self.reporter
            .send_startup(self.started_at, self.pattern_count)
            .await;

        let mut interval = tokio::time::interval(self.config.scheduling.scan_interval);
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        info!(
            interval_secs = self.config.scheduling.scan_interval.as_secs(),
            "Entering main loop"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if self.last_summary.elapsed() >= self.config.scheduling.summary_interval {
                        self.send_summary().await;
                    }
                    self.full_scan().await;
                }
                _ = &mut shutdown => {
                    info!("Stop signal received");
                    break;
                }
            }
        }

        self.send_summary().await;
        info!(
            scans = self.scan_count,
            opportunities = self.total_opps_found,
            executed = self.total_trades_executed,
            "Engine shut down cleanly"
        );
        Ok(())
    }

    /// One tick: scanners, processing, notifications, dedup pruning.
    pub async fn full_scan(&mut self) {
        self.scan_count += 1;
        info!(scan = self.scan_count, "Full scan starting");

        let killed = {
            let risk = self.risk.lock().expect("risk poisoned");
            risk.is_killed().then(|| risk.kill_reason().to_string())
        };
        if let Some(reason) = killed {
            warn!(reason = %reason, "Killed — scanning continues for alerts only");
        }

        // 1. Run scanners sequentially in their fixed order.
        let mut all_opps: Vec<HedgeOpportunity> = Vec::new();
        let mut total_markets_checked = 0usize;

        for scanner in &self.scanners {
            let tag = scanner.tag();
            let t0 = Instant::now();
            match scanner.scan().await {
                Ok(outcome) => {
                    let latency_ms = t0.elapsed().as_secs_f64() * 1000.0;
                    if let Err(e) = self.log.log_scan(
                        self.scan_count,
                        tag,
                        outcome.markets_checked,
                        outcome.opportunities.len(),
                        latency_ms,
                        None,
                    ) {
                        warn!(error = %e, "Failed to record scan row");
                    }
                    total_markets_checked += outcome.markets_checked;
                    all_opps.extend(outcome.opportunities);
                }
                Err(e) => {
                    let latency_ms = t0.elapsed().as_secs_f64() * 1000.0;
                    error!(scanner = %tag, error = %e, "Scanner pass failed");
                    if let Err(log_err) = self.log.log_scan(
                        self.scan_count,
                        tag,
                        0,
                        0,
                        latency_ms,
                        Some(&e.to_string()),
                    ) {
                        warn!(error = %log_err, "Failed to record scan row");
                    }
                    if let Err(log_err) = self.log.log_incident(
                        IncidentKind::ScanError,
                        &format!("{tag}: {e}"),
                        None,
                    ) {
                        warn!(error = %log_err, "Failed to record scan incident");
                    }
                    self.reporter.send_error(&e.to_string()).await;
                }
            }
        }

        // 2. Deterministic processing order.
        sort_opportunities(&mut all_opps);

        if all_opps.is_empty() {
            info!(markets = total_markets_checked, "No profitable hedges this scan");
            if self.scan_count % QUIET_SCAN_HEARTBEAT == 0 {
                self.reporter
                    .send_quiet_scan(self.scan_count, total_markets_checked)
                    .await;
            }
            self.alerted.clear();
            return;
        }

        self.total_opps_found += all_opps.len() as u64;
        info!(count = all_opps.len(), "Profitable hedges found");

        // 3. Log and (maybe) execute each opportunity; notifications are
        //    deferred until every row for the tick is written.
        let mut pending_alerts: Vec<(HedgeOpportunity, Option<ExecReport>)> = Vec::new();

        for opp in &all_opps {
            if let Err(e) = self.log.log_opportunity(opp, false) {
                warn!(error = %e, "Failed to record opportunity");
            }

            let key = opp.alert_key();
            let alert_now = match self.alerted.get(&key) {
                None => true,
                Some(prev) => should_realert(
                    *prev,
                    opp.net_profit_per_dollar,
                    self.config.economics.realert_threshold,
                ),
            };

            let latched = self.risk.lock().expect("risk poisoned").is_killed();
            let report = if self.config.execution.auto_trade
                && self.orders.is_executable()
                && !latched
            {
                let report = self.executor.execute(opp).await;
                if report.executed {
                    self.total_trades_executed += 1;
                    if let Err(e) = self.log.log_opportunity(opp, true) {
                        warn!(error = %e, "Failed to record executed opportunity");
                    }
                }
                Some(report)
            } else {
                None
            };

            if alert_now {
                self.alerted.insert(key, opp.net_profit_per_dollar);
                pending_alerts.push((opp.clone(), report));
            }
        }

        // 4. Send the tick's notifications.
        for (opp, report) in &pending_alerts {
            self.reporter.send_alert(opp, report.as_ref()).await;
        }

        // 5. Prune dedup entries whose hedge vanished from the book.
        let active: std::collections::HashSet<String> =
            all_opps.iter().map(|o| o.alert_key()).collect();
        self.alerted.retain(|key, _| active.contains(key));
    }

    async fn send_summary(&mut self) {
        let snapshot = self.build_snapshot().await;
        self.reporter.send_summary(&snapshot).await;
        self.last_summary = Instant::now();
    }

    async fn build_snapshot(&self) -> SummarySnapshot {
        let mut active_alerts: Vec<(String, f64)> = self
            .alerted
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        active_alerts.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        let wallet_balance = if self.orders.is_executable() {
            self.orders.get_balance().await.ok()
        } else {
            None
        };

        SummarySnapshot {
            uptime_hours: (Utc::now() - self.started_at).num_seconds() as f64 / 3600.0,
            scan_count: self.scan_count,
            opportunities_found: self.total_opps_found,
            trades_executed: self.total_trades_executed,
            active_alerts,
            log_stats: self.log.stats().unwrap_or_default(),
            risk_status: self.risk.lock().expect("risk poisoned").status_text(),
            wallet_balance,
            history: self.log.history().unwrap_or_default(),
            next_scan_minutes: self.config.scheduling.scan_interval.as_secs() / 60,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
