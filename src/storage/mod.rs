//! Persistence layer — the append-only event log.
//!
//! Seven relations backed by a single SQLite file: scans, opportunities,
//! orders, fills, incidents, depth_checks, pnl. Rows are only ever
//! inserted; history queries aggregate, never mutate. The connection is
//! owned exclusively by [`EventLog`]; WAL mode keeps reads from the
//! external dashboard process safe while the engine writes.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::{debug, info};

use crate::types::{DepthCheck, HedgeOpportunity, IncidentKind, OrderStatus, ScannerTag, Side};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS scans (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        ts TEXT NOT NULL,
        scan_number INTEGER,
        scanner TEXT,
        markets_checked INTEGER DEFAULT 0,
        opportunities_found INTEGER DEFAULT 0,
        latency_ms REAL,
        error TEXT
    )",
    "CREATE TABLE IF NOT EXISTS opportunities (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        ts TEXT NOT NULL,
        name TEXT NOT NULL,
        scanner TEXT,
        hedge_type TEXT,
        total_cost REAL,
        min_payout REAL,
        max_payout REAL,
        guaranteed_profit REAL,
        best_case_profit REAL,
        net_profit_per_dollar REAL,
        confidence TEXT,
        market_ids TEXT,
        executed INTEGER DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS orders (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        ts TEXT NOT NULL,
        opportunity_name TEXT,
        market_id TEXT NOT NULL,
        token_id TEXT,
        side TEXT NOT NULL,
        price REAL,
        size REAL,
        order_id TEXT,
        status TEXT,
        error TEXT,
        latency_ms REAL
    )",
    "CREATE TABLE IF NOT EXISTS fills (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        ts TEXT NOT NULL,
        order_id TEXT,
        market_id TEXT NOT NULL,
        side TEXT NOT NULL,
        price REAL,
        size REAL,
        fee_est REAL
    )",
    "CREATE TABLE IF NOT EXISTS incidents (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        ts TEXT NOT NULL,
        incident_type TEXT NOT NULL,
        details TEXT,
        kill_reason TEXT
    )",
    "CREATE TABLE IF NOT EXISTS depth_checks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        ts TEXT NOT NULL,
        token_id TEXT NOT NULL,
        spread REAL,
        ask_depth_usd REAL,
        vwap_cost REAL,
        depth_ok INTEGER,
        spread_ok INTEGER
    )",
    "CREATE TABLE IF NOT EXISTS pnl (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        ts TEXT NOT NULL,
        trade_budget REAL,
        exposure REAL,
        realized REAL DEFAULT 0,
        notes TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_scans_ts ON scans(ts)",
    "CREATE INDEX IF NOT EXISTS idx_opps_ts ON opportunities(ts)",
    "CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status)",
];

/// Row counts for health reporting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogStats {
    pub total_scans: u64,
    pub total_opportunities: u64,
    pub total_fills: u64,
    pub total_order_errors: u64,
    pub total_incidents: u64,
}

/// Cumulative discovery totals, aggregated from the opportunities table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryTotals {
    pub discoveries: u64,
    pub guaranteed_profit_sum: f64,
    pub best_case_profit_sum: f64,
}

pub struct EventLog {
    conn: Mutex<Connection>,
}

impl EventLog {
    /// Open (or create) the store at `path`, creating parent directories
    /// and the schema as needed.
    pub fn open(path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create data dir {}", parent.display()))?;
            }
        }
        let conn =
            Connection::open(path).with_context(|| format!("failed to open event log {path}"))?;
        // WAL keeps the dashboard's concurrent reads from blocking writes.
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
            .context("failed to enable WAL")?;
        conn.execute_batch("PRAGMA synchronous = NORMAL")
            .context("failed to set synchronous pragma")?;
        let log = Self::init(conn)?;
        info!(path, "Event log ready");
        Ok(log)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory().context("failed to open in-memory store")?)
    }

    fn init(conn: Connection) -> Result<Self> {
        for ddl in SCHEMA {
            conn.execute(ddl, []).context("failed to apply schema")?;
        }
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn now() -> String {
        Utc::now().to_rfc3339()
    }

    // -- Writers ---------------------------------------------------------

    pub fn log_scan(
        &self,
        scan_number: u64,
        scanner: ScannerTag,
        markets_checked: usize,
        opportunities_found: usize,
        latency_ms: f64,
        error: Option<&str>,
    ) -> Result<()> {
        let conn = self.conn.lock().expect("event log poisoned");
        conn.execute(
            "INSERT INTO scans (ts, scan_number, scanner, markets_checked, opportunities_found, latency_ms, error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                Self::now(),
                scan_number as i64,
                scanner.as_str(),
                markets_checked as i64,
                opportunities_found as i64,
                latency_ms,
                error.unwrap_or(""),
            ],
        )
        .context("failed to insert scan row")?;
        Ok(())
    }

    pub fn log_opportunity(&self, opp: &HedgeOpportunity, executed: bool) -> Result<()> {
        let market_ids = serde_json::to_string(&opp.market_ids())
            .context("failed to serialise market ids")?;
        let conn = self.conn.lock().expect("event log poisoned");
        conn.execute(
            "INSERT INTO opportunities (ts, name, scanner, hedge_type, total_cost, min_payout,
             max_payout, guaranteed_profit, best_case_profit, net_profit_per_dollar, confidence,
             market_ids, executed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                Self::now(),
                opp.name,
                opp.scanner.as_str(),
                opp.hedge_type.as_str(),
                opp.total_cost,
                opp.min_payout,
                opp.max_payout,
                opp.guaranteed_profit,
                opp.best_case_profit,
                opp.net_profit_per_dollar,
                opp.confidence.as_str(),
                market_ids,
                executed as i64,
            ],
        )
        .context("failed to insert opportunity row")?;
        debug!(name = %opp.name, executed, "Opportunity logged");
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn log_order(
        &self,
        opportunity_name: &str,
        market_id: &str,
        token_id: &str,
        side: Side,
        price: f64,
        size: f64,
        order_id: &str,
        status: OrderStatus,
        error: Option<&str>,
        latency_ms: f64,
    ) -> Result<()> {
        let conn = self.conn.lock().expect("event log poisoned");
        conn.execute(
            "INSERT INTO orders (ts, opportunity_name, market_id, token_id, side, price, size,
             order_id, status, error, latency_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                Self::now(),
                opportunity_name,
                market_id,
                token_id,
                side.to_string(),
                price,
                size,
                order_id,
                status.as_str(),
                error.unwrap_or(""),
                latency_ms,
            ],
        )
        .context("failed to insert order row")?;
        Ok(())
    }

    pub fn log_fill(
        &self,
        order_id: &str,
        market_id: &str,
        side: Side,
        price: f64,
        size: f64,
        fee_est: f64,
    ) -> Result<()> {
        let conn = self.conn.lock().expect("event log poisoned");
        conn.execute(
            "INSERT INTO fills (ts, order_id, market_id, side, price, size, fee_est)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![Self::now(), order_id, market_id, side.to_string(), price, size, fee_est],
        )
        .context("failed to insert fill row")?;
        Ok(())
    }

    pub fn log_incident(
        &self,
        kind: IncidentKind,
        details: &str,
        kill_reason: Option<&str>,
    ) -> Result<()> {
        let conn = self.conn.lock().expect("event log poisoned");
        conn.execute(
            "INSERT INTO incidents (ts, incident_type, details, kill_reason)
             VALUES (?1, ?2, ?3, ?4)",
            params![Self::now(), kind.as_str(), details, kill_reason.unwrap_or("")],
        )
        .context("failed to insert incident row")?;
        Ok(())
    }

    pub fn log_depth_check(&self, check: &DepthCheck) -> Result<()> {
        let conn = self.conn.lock().expect("event log poisoned");
        conn.execute(
            "INSERT INTO depth_checks (ts, token_id, spread, ask_depth_usd, vwap_cost, depth_ok, spread_ok)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                Self::now(),
                check.token_id,
                check.top_spread,
                check.ask_depth_usd,
                check.vwap_cost,
                check.depth_ok as i64,
                check.spread_ok as i64,
            ],
        )
        .context("failed to insert depth check row")?;
        Ok(())
    }

    pub fn log_pnl(&self, budget: f64, exposure: f64, realized: f64, notes: &str) -> Result<()> {
        let conn = self.conn.lock().expect("event log poisoned");
        conn.execute(
            "INSERT INTO pnl (ts, trade_budget, exposure, realized, notes)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![Self::now(), budget, exposure, realized, notes],
        )
        .context("failed to insert pnl row")?;
        Ok(())
    }

    // -- Readers ---------------------------------------------------------

    pub fn stats(&self) -> Result<LogStats> {
        let conn = self.conn.lock().expect("event log poisoned");
        let count = |sql: &str| -> Result<u64> {
            conn.query_row(sql, [], |row| row.get::<_, i64>(0))
                .map(|n| n as u64)
                .context("failed to count rows")
        };
        Ok(LogStats {
            total_scans: count("SELECT COUNT(*) FROM scans")?,
            total_opportunities: count("SELECT COUNT(*) FROM opportunities")?,
            total_fills: count("SELECT COUNT(*) FROM orders WHERE status = 'filled'")?,
            total_order_errors: count(
                "SELECT COUNT(*) FROM orders WHERE error != '' AND error IS NOT NULL",
            )?,
            total_incidents: count("SELECT COUNT(*) FROM incidents")?,
        })
    }

    /// Cumulative discovery totals across the engine's whole history.
    pub fn history(&self) -> Result<HistoryTotals> {
        let conn = self.conn.lock().expect("event log poisoned");
        conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(guaranteed_profit), 0),
                    COALESCE(SUM(best_case_profit), 0)
             FROM opportunities WHERE executed = 0",
            [],
            |row| {
                Ok(HistoryTotals {
                    discoveries: row.get::<_, i64>(0)? as u64,
                    guaranteed_profit_sum: row.get(1)?,
                    best_case_profit_sum: row.get(2)?,
                })
            },
        )
        .context("failed to aggregate history")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
