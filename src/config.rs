//! Configuration loading from environment variables.
//!
//! Every knob has a default so the engine runs scan-only out of
//! the box. Secrets (CLOB credentials, Telegram token) are read here and
//! injected into their adapters; they are never logged.

use anyhow::{Context, Result};
use std::time::Duration;

/// Top-level application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub scheduling: SchedulingConfig,
    pub economics: EconomicsConfig,
    pub execution: ExecutionConfig,
    pub kill: KillConfig,
    pub telegram: TelegramConfig,
    pub clob: ClobCredentials,
    /// Keyword heuristic for exclusive event groups (lowercase).
    pub exclusivity_keywords: Vec<String>,
    /// Assets covered by the threshold scanner.
    pub threshold_assets: Vec<ThresholdAsset>,
    /// Path to the SQLite event log.
    pub db_path: String,
    /// Optional JSON file of operator-discovered hedge patterns.
    pub patterns_file: String,
}

#[derive(Debug, Clone)]
pub struct SchedulingConfig {
    pub scan_interval: Duration,
    pub summary_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct EconomicsConfig {
    /// Minimum net profit per dollar to emit an opportunity.
    pub min_profit_per_dollar: f64,
    /// Flat per-side fee estimate. The emission threshold and net profit
    /// subtract 2 × fee_rate per opportunity; this does not model the
    /// venue's actual fee schedule.
    pub fee_rate: f64,
    /// Minimum 24h volume across an event group's retained markets.
    pub min_event_volume_24h: f64,
    /// Relative profit change that triggers a re-alert for a known key.
    pub realert_threshold: f64,
}

#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    pub auto_trade: bool,
    /// Dollars committed per hedge.
    pub trade_budget: f64,
    /// Total bankroll, the base for the exposure cap.
    pub bankroll: f64,
    /// Maximum tolerated top-of-book spread.
    pub max_spread: f64,
    /// Minimum USD ask-side depth to accept a leg.
    pub min_depth_usd: f64,
}

#[derive(Debug, Clone)]
pub struct KillConfig {
    pub partial_fill_streak: u32,
    pub partial_fill_day: u32,
    pub api_errors_10m: usize,
    pub latency_ms: f64,
    pub latency_window_sec: u64,
    pub thin_book_scans: u32,
    pub max_trades_per_hour: usize,
    pub max_exposure_pct: f64,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_ids: Vec<String>,
}

impl TelegramConfig {
    pub fn is_configured(&self) -> bool {
        !self.token.is_empty() && !self.chat_ids.is_empty()
    }
}

/// Opaque signing identity for the order gateway. The core never inspects
/// these beyond checking presence.
#[derive(Clone)]
pub struct ClobCredentials {
    pub address: String,
    pub api_key: String,
    pub api_secret: String,
    pub passphrase: String,
}

impl ClobCredentials {
    pub fn is_configured(&self) -> bool {
        !self.address.is_empty() && !self.api_key.is_empty() && !self.api_secret.is_empty()
    }
}

// Credentials intentionally do not derive Debug with field contents.
impl std::fmt::Debug for ClobCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClobCredentials")
            .field("address", &self.address)
            .field("configured", &self.is_configured())
            .finish()
    }
}

/// One asset in the threshold scanner's universe.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ThresholdAsset {
    pub name: String,
    pub search_terms: Vec<String>,
    /// Canonical numeric levels; parsed thresholds within ±5% of one of
    /// these are kept. An empty list keeps everything.
    pub levels: Vec<f64>,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

fn env_f64(name: &str, default: f64) -> Result<f64> {
    match std::env::var(name) {
        Ok(v) => v
            .parse::<f64>()
            .with_context(|| format!("{name} must be a number, got {v:?}")),
        Err(_) => Ok(default),
    }
}

fn env_u64(name: &str, default: u64) -> Result<u64> {
    match std::env::var(name) {
        Ok(v) => v
            .parse::<u64>()
            .with_context(|| format!("{name} must be an integer, got {v:?}")),
        Err(_) => Ok(default),
    }
}

fn env_bool(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| {
            let v = v.to_lowercase();
            v == "1" || v == "true" || v == "yes"
        })
        .unwrap_or(default)
}

fn env_str(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

impl AppConfig {
    /// Load configuration from the environment. Fails fast on malformed
    /// values; unset variables fall back to their defaults.
    pub fn from_env() -> Result<Self> {
        let chat_ids: Vec<String> = match std::env::var("TELEGRAM_CHAT_IDS") {
            Ok(raw) => serde_json::from_str(&raw)
                .context("TELEGRAM_CHAT_IDS must be a JSON array of strings")?,
            Err(_) => Vec::new(),
        };

        let threshold_assets = match std::env::var("THRESHOLD_ASSETS_FILE") {
            Ok(path) => {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read THRESHOLD_ASSETS_FILE {path}"))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("failed to parse threshold assets from {path}"))?
            }
            Err(_) => default_threshold_assets(),
        };

        Ok(Self {
            scheduling: SchedulingConfig {
                scan_interval: Duration::from_secs(env_u64("SCAN_INTERVAL", 180)?),
                summary_interval: Duration::from_secs(env_u64("SUMMARY_INTERVAL", 900)?),
            },
            economics: EconomicsConfig {
                min_profit_per_dollar: env_f64("MIN_PROFIT_PER_DOLLAR", 0.003)?,
                fee_rate: env_f64("POLY_FEE", 0.02)?,
                min_event_volume_24h: env_f64("MIN_EVENT_VOLUME_24H", 5000.0)?,
                realert_threshold: env_f64("REALERT_THRESHOLD", 0.05)?,
            },
            execution: ExecutionConfig {
                auto_trade: env_bool("AUTO_TRADE", false),
                trade_budget: env_f64("TRADE_BUDGET", 50.0)?,
                bankroll: env_f64("BANKROLL", 100.0)?,
                max_spread: env_f64("MAX_SPREAD", 0.05)?,
                min_depth_usd: env_f64("MIN_DEPTH_USD", 20.0)?,
            },
            kill: KillConfig {
                partial_fill_streak: env_u64("KILL_PARTIAL_FILL_STREAK", 3)? as u32,
                partial_fill_day: env_u64("KILL_PARTIAL_FILL_DAY", 8)? as u32,
                api_errors_10m: env_u64("KILL_API_ERRORS_10M", 5)? as usize,
                latency_ms: env_f64("KILL_LATENCY_MS", 4000.0)?,
                latency_window_sec: env_u64("KILL_LATENCY_WINDOW_SEC", 120)?,
                thin_book_scans: env_u64("KILL_THIN_BOOK_SCANS", 4)? as u32,
                max_trades_per_hour: env_u64("KILL_MAX_TRADES_PER_HOUR", 20)? as usize,
                max_exposure_pct: env_f64("KILL_MAX_EXPOSURE_PCT", 0.5)?,
            },
            telegram: TelegramConfig {
                token: env_str("TELEGRAM_TOKEN", ""),
                chat_ids,
            },
            clob: ClobCredentials {
                address: env_str("CLOB_WALLET_ADDRESS", ""),
                api_key: env_str("CLOB_API_KEY", ""),
                api_secret: env_str("CLOB_API_SECRET", ""),
                passphrase: env_str("CLOB_PASSPHRASE", ""),
            },
            exclusivity_keywords: default_exclusivity_keywords(),
            threshold_assets,
            db_path: env_str("DB_PATH", "data/hedge_engine.db"),
            patterns_file: env_str("PATTERNS_FILE", "data/discovered_patterns.json"),
        })
    }
}

/// Default keyword set for the exclusivity heuristic. A soft signal:
/// groups matching a keyword but failing the overround band are recorded
/// as mis-exclusivity incidents rather than scanned.
fn default_exclusivity_keywords() -> Vec<String> {
    [
        "winner", "nominee", "who will", "which", "election", "primary", "champion", "wins",
        "best", "award", "oscar", "grammy", "world cup", "super bowl", "nba", "nhl", "ufc",
        "formula 1",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn asset(name: &str, terms: &[&str], levels: &[f64]) -> ThresholdAsset {
    ThresholdAsset {
        name: name.to_string(),
        search_terms: terms.iter().map(|s| s.to_string()).collect(),
        levels: levels.to_vec(),
    }
}

/// The built-in asset universe for the threshold scanner.
fn default_threshold_assets() -> Vec<ThresholdAsset> {
    vec![
        asset(
            "Bitcoin",
            &["Bitcoin above", "Bitcoin reach", "BTC above"],
            &[
                50_000.0, 55_000.0, 60_000.0, 65_000.0, 68_000.0, 70_000.0, 72_000.0, 75_000.0,
                80_000.0, 85_000.0, 90_000.0, 95_000.0, 100_000.0, 110_000.0, 120_000.0, 150_000.0,
            ],
        ),
        asset(
            "Ethereum",
            &["Ethereum above", "ETH above", "Ethereum reach"],
            &[2000.0, 2500.0, 3000.0, 3500.0, 4000.0, 4500.0, 5000.0, 6000.0],
        ),
        asset(
            "Solana",
            &["Solana above", "SOL above", "Solana reach", "Solana dip"],
            &[100.0, 150.0, 200.0, 250.0, 300.0, 400.0, 500.0],
        ),
        asset("XRP", &["XRP above", "XRP reach"], &[1.0, 2.0, 3.0, 5.0, 10.0]),
        asset(
            "AAPL",
            &["AAPL above", "AAPL close above", "Apple stock"],
            &[200.0, 225.0, 250.0, 275.0, 285.0, 300.0],
        ),
        asset(
            "META",
            &["META above", "META close above"],
            &[500.0, 550.0, 600.0, 640.0, 700.0],
        ),
        asset(
            "PLTR",
            &["PLTR above", "PLTR close above", "Palantir"],
            &[80.0, 100.0, 120.0, 128.0, 150.0],
        ),
        asset(
            "GOOGL",
            &["GOOGL above", "GOOGL close above", "Google stock"],
            &[150.0, 175.0, 200.0, 225.0],
        ),
        asset(
            "NVDA",
            &["NVDA above", "NVDA close above", "Nvidia stock"],
            &[100.0, 120.0, 140.0, 150.0, 160.0, 180.0, 200.0],
        ),
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
