//! Reporter — renders and emits operator-facing messages.
//!
//! Four message kinds: startup, per-opportunity alert (with execution
//! outcome when one was attempted), the quiet-scan heartbeat, and the
//! interval summary. Messages are HTML-formatted for the sink and
//! truncated at a line boundary to stay inside the 4096-byte cap.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::AppConfig;
use crate::engine::executor::ExecReport;
use crate::notify::{NotifySink, MAX_MESSAGE_BYTES};
use crate::storage::{HistoryTotals, LogStats};
use crate::types::{HedgeOpportunity, ScannerTag};

/// Everything the interval summary renders.
#[derive(Debug, Clone, Default)]
pub struct SummarySnapshot {
    pub uptime_hours: f64,
    pub scan_count: u64,
    pub opportunities_found: u64,
    pub trades_executed: u64,
    /// alert_key → last alerted net profit, already sorted descending.
    pub active_alerts: Vec<(String, f64)>,
    pub log_stats: LogStats,
    pub risk_status: String,
    pub wallet_balance: Option<f64>,
    pub history: HistoryTotals,
    pub next_scan_minutes: u64,
}

pub struct Reporter {
    sink: Arc<dyn NotifySink>,
    config: Arc<AppConfig>,
}

impl Reporter {
    pub fn new(sink: Arc<dyn NotifySink>, config: Arc<AppConfig>) -> Self {
        Self { sink, config }
    }

    // -- Startup ---------------------------------------------------------

    pub async fn send_startup(&self, started_at: DateTime<Utc>, pattern_count: usize) {
        let cfg = &self.config;
        let level_count: usize = cfg.threshold_assets.iter().map(|a| a.levels.len()).sum();
        let msg = format!(
            "🦞 <b>Hedge Engine ONLINE</b>\n\
             <i>Scanners + CLOB execution + kill switches + event log</i>\n\n\
             ⏰ {}\n\
             🔄 Scan every: {} min\n\
             🤖 Auto-trade: {}\n\
             💰 Budget: ${:.0}/trade | Bankroll: ${:.0}\n\
             📊 Fee estimate: {:.0}%\n\
             🛡 Max spread: {:.1}% | Min depth: ${:.0}\n\n\
             📦 Event groups: 50 events/scan\n\
             📊 Thresholds: {} assets, {} price levels\n\
             🔗 Patterns: {}\n\n\
             <b>⛔ Kill switches:</b>\n{}",
            started_at.format("%Y-%m-%d %H:%M UTC"),
            cfg.scheduling.scan_interval.as_secs() / 60,
            if cfg.execution.auto_trade { "ON ✅" } else { "OFF (alerts only)" },
            cfg.execution.trade_budget,
            cfg.execution.bankroll,
            cfg.economics.fee_rate * 100.0,
            cfg.execution.max_spread * 100.0,
            cfg.execution.min_depth_usd,
            cfg.threshold_assets.len(),
            level_count,
            pattern_count,
            self.kill_limits_text(),
        );
        self.sink.send(&msg).await;
    }

    fn kill_limits_text(&self) -> String {
        let k = &self.config.kill;
        format!(
            "  • Partial fill streak: ≥{} → kill\n\
             \x20\x20• Partial fills /day: ≥{} → kill\n\
             \x20\x20• API errors (10m): ≥{} → kill\n\
             \x20\x20• Latency avg: ≥{:.0}ms → kill\n\
             \x20\x20• Thin book streak: ≥{} → kill\n\
             \x20\x20• Trades/hour: ≥{} → kill\n\
             \x20\x20• Exposure: ≤{:.0}% of bankroll",
            k.partial_fill_streak,
            k.partial_fill_day,
            k.api_errors_10m,
            k.latency_ms,
            k.thin_book_scans,
            k.max_trades_per_hour,
            k.max_exposure_pct * 100.0,
        )
    }

    // -- Opportunity alert -----------------------------------------------

    pub async fn send_alert(&self, opp: &HedgeOpportunity, exec: Option<&ExecReport>) {
        let msg = self.render_alert(opp, exec);
        info!(name = %opp.name, executed = exec.map(|e| e.executed).unwrap_or(false), "Alert sent");
        self.sink.send(&msg).await;
    }

    pub fn render_alert(&self, opp: &HedgeOpportunity, exec: Option<&ExecReport>) -> String {
        let scanner_label = match opp.scanner {
            ScannerTag::EventGroup => "📦 Event Group Arb",
            ScannerTag::Threshold => "📊 Threshold Hedge",
            ScannerTag::Pattern => "🔗 Known Pattern",
        };

        let mut msg = format!(
            "💰 <b>HEDGE FOUND: {}</b>\n\n\
             🔍 Scanner: {scanner_label}\n\
             📋 Type: {}\n\
             🛡 Confidence: {}\n\n\
             <b>📊 LEGS:</b>\n",
            opp.name, opp.hedge_type, opp.confidence,
        );

        for (i, leg) in opp.legs.iter().enumerate() {
            let question: String = leg.question.chars().take(60).collect();
            msg.push_str(&format!(
                "  Leg {}: <b>{}</b> @ ${:.4}\n  └ {}\n  └ Volume: ${:.0}\n\n",
                i + 1,
                leg.side,
                leg.price,
                question,
                leg.volume_24h,
            ));
        }

        msg.push_str(&format!(
            "<b>💵 FINANCIALS:</b>\n\
             \x20\x20Total cost: ${:.4}\n\
             \x20\x20Min payout: ${:.2}\n\
             \x20\x20Max payout: ${:.2}\n\
             \x20\x20Guaranteed: ${:+.4}/unit\n\
             \x20\x20Best case:  ${:+.4}/unit\n\
             \x20\x20Net (after fees): ${:+.4}/$\n\n",
            opp.total_cost,
            opp.min_payout,
            opp.max_payout,
            opp.guaranteed_profit,
            opp.best_case_profit,
            opp.net_profit_per_dollar,
        ));

        // Budget ladder of minimum returns.
        msg.push_str("<b>🛒 TRADE INSTRUCTIONS:</b>");
        if opp.total_cost > 0.0 {
            for budget in [10.0, 25.0, 50.0, 100.0] {
                let units = budget / opp.total_cost;
                let min_ret = units * opp.min_payout;
                msg.push_str(&format!(
                    "\n  💵 ${budget:.0} → min ${min_ret:.2} (profit ${:+.2})",
                    min_ret - budget
                ));
            }
        } else {
            msg.push_str("\n  ⚠️ Invalid pricing");
        }

        match exec {
            Some(report) if report.executed => {
                msg.push_str(&format!(
                    "\n\n🤖 <b>AUTO-EXECUTED ✅</b>\n  Spent: ${:.2}\n  Legs filled: {}/{}\n",
                    report.total_spent,
                    report.legs.len(),
                    opp.legs.len(),
                ));
                for leg in &report.legs {
                    let order_id: String = leg.order_id.chars().take(12).collect();
                    msg.push_str(&format!(
                        "  ✅ {} ${:.2} → order {order_id}…\n",
                        leg.side, leg.amount_usd
                    ));
                }
            }
            Some(report) if report.partial => {
                msg.push_str(&format!(
                    "\n\n⚠️ <b>PARTIAL EXECUTION</b>\n  Legs filled: {}/{}\n",
                    report.legs.len(),
                    opp.legs.len(),
                ));
                for err in &report.errors {
                    msg.push_str(&format!("  ❌ {err}\n"));
                }
            }
            Some(report) if !report.errors.is_empty() => {
                msg.push_str("\n\n❌ <b>EXECUTION FAILED</b>\n");
                for err in report.errors.iter().take(3) {
                    msg.push_str(&format!("  • {err}\n"));
                }
            }
            Some(_) => {}
            None if !self.config.execution.auto_trade => {
                msg.push_str("\n\n⚠️ Auto-trade OFF — execute manually on the venue");
            }
            None => {}
        }

        truncate_at_line_boundary(&msg, MAX_MESSAGE_BYTES)
    }

    // -- Quiet-scan heartbeat --------------------------------------------

    pub async fn send_quiet_scan(&self, scan_number: u64, markets_checked: usize) {
        let msg = format!(
            "🔍 Scan #{scan_number} — no hedges found ({markets_checked} markets checked). Next scan in {}m",
            self.config.scheduling.scan_interval.as_secs() / 60,
        );
        self.sink.send(&msg).await;
    }

    // -- Error alert -----------------------------------------------------

    pub async fn send_error(&self, error: &str) {
        let mut detail: String = error.chars().take(500).collect();
        if detail.len() < error.len() {
            detail.push('…');
        }
        self.sink
            .send(&format!("🚨 <b>SCAN ERROR</b>\n<code>{detail}</code>"))
            .await;
    }

    // -- Interval summary ------------------------------------------------

    pub async fn send_summary(&self, snapshot: &SummarySnapshot) {
        let msg = self.render_summary(snapshot);
        info!(scans = snapshot.scan_count, "Summary sent");
        self.sink.send(&msg).await;
    }

    pub fn render_summary(&self, s: &SummarySnapshot) -> String {
        let mut msg = format!(
            "📊 <b>STATUS REPORT</b>\n\
             ━━━━━━━━━━━━━━━━━━━━━━━\n\
             ⏱ Uptime: {:.1}h\n\
             🔍 Scans: {}\n\
             🎯 Opportunities: {}\n\
             🤖 Trades executed: {}\n\
             📌 Active hedges: {}\n\n\
             <b>📁 Database:</b>\n\
             \x20\x20Scans logged: {}\n\
             \x20\x20Opps logged: {}\n\
             \x20\x20Orders filled: {}\n\
             \x20\x20Order errors: {}\n\
             \x20\x20Incidents: {}\n\n\
             <b>⛔ Risk manager:</b>\n{}\n\n",
            s.uptime_hours,
            s.scan_count,
            s.opportunities_found,
            s.trades_executed,
            s.active_alerts.len(),
            s.log_stats.total_scans,
            s.log_stats.total_opportunities,
            s.log_stats.total_fills,
            s.log_stats.total_order_errors,
            s.log_stats.total_incidents,
            s.risk_status,
        );

        if let Some(balance) = s.wallet_balance {
            msg.push_str(&format!("<b>💰 Wallet:</b>\n  USDC: ${balance:.2}\n\n"));
        }

        if !s.active_alerts.is_empty() {
            msg.push_str("<b>Active hedges:</b>\n");
            for (key, profit) in s.active_alerts.iter().take(5) {
                let key_short: String = key.chars().take(30).collect();
                msg.push_str(&format!("  • ${profit:+.4}/$ — {key_short}\n"));
            }
            msg.push('\n');
        }

        msg.push_str(&format!(
            "━━━━━━━━━━━━━━━━━━━━━━━\n\
             📈 History: {} discoveries, ${:.4} guaranteed seen\n\
             ⏭ Next scan in {}m",
            s.history.discoveries, s.history.guaranteed_profit_sum, s.next_scan_minutes,
        ));

        truncate_at_line_boundary(&msg, MAX_MESSAGE_BYTES)
    }
}

/// Cut `msg` down to `max` bytes at the last complete line, so a capped
/// message never ends mid-token.
pub fn truncate_at_line_boundary(msg: &str, max: usize) -> String {
    if msg.len() <= max {
        return msg.to_string();
    }
    let mut end = max;
    while !msg.is_char_boundary(end) {
        end -= 1;
    }
    match msg[..end].rfind('\n') {
        Some(pos) if pos > 0 => msg[..pos].to_string(),
        _ => msg[..end].to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
