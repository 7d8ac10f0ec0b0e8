//! Hedge engine entry point.
//!
//! Loads configuration from the environment, initialises structured
//! logging, wires the gateways, scanners, risk manager, executor, and
//! event log together, and runs the scan loop until a stop signal.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use tracing::{info, warn};

use polyhedge::config::AppConfig;
use polyhedge::engine::depth::DepthProbe;
use polyhedge::engine::executor::Executor;
use polyhedge::engine::orchestrator::Orchestrator;
use polyhedge::engine::reporter::Reporter;
use polyhedge::notify::{telegram::TelegramSink, NotifySink, NullSink};
use polyhedge::platforms::{clob::ClobClient, gamma::GammaClient, MarketGateway, OrderGateway};
use polyhedge::risk::RiskManager;
use polyhedge::scanners::{
    event_group::EventGroupScanner, patterns::PatternScanner, threshold::ThresholdScanner,
    HedgeScanner,
};
use polyhedge::storage::EventLog;

const BANNER: &str = r#"
  _          _                     _
 | |__   ___| |_ __ _  ___  _ __  (_)_ __   ___
 | '_ \ / _ \ __/ _` |/ _ \| '_ \ | | '_ \ / _ \
 | | | |  __/ || (_| | (_) | | | || | | | |  __/
 |_| |_|\___|\__\__, |\___/|_| |_||_|_| |_|\___|
                |___/   polyhedge — hedge engine
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present (non-fatal when missing).
    let _ = dotenv::dotenv();

    let config = Arc::new(AppConfig::from_env()?);
    init_logging();

    println!("{BANNER}");
    info!(
        scan_interval_secs = config.scheduling.scan_interval.as_secs(),
        auto_trade = config.execution.auto_trade,
        trade_budget = config.execution.trade_budget,
        bankroll = config.execution.bankroll,
        "Starting hedge engine"
    );

    // -- Shared infrastructure -------------------------------------------

    let log = Arc::new(EventLog::open(&config.db_path)?);
    let risk = Arc::new(Mutex::new(RiskManager::new(config.kill.clone())));

    let sink: Arc<dyn NotifySink> = if config.telegram.is_configured() {
        Arc::new(TelegramSink::new(&config.telegram)?)
    } else {
        warn!("Telegram not configured — notifications disabled");
        Arc::new(NullSink)
    };

    // -- Gateways ----------------------------------------------------------

    let markets: Arc<dyn MarketGateway> = Arc::new(GammaClient::new()?);
    let orders: Arc<dyn OrderGateway> = Arc::new(ClobClient::new(config.clob.clone())?);
    if config.execution.auto_trade && !orders.is_executable() {
        warn!("AUTO_TRADE is on but CLOB credentials are missing — alerts only");
    }

    // -- Scanners ----------------------------------------------------------

    let pattern_scanner = PatternScanner::new(
        markets.clone(),
        risk.clone(),
        config.economics.clone(),
        &config.patterns_file,
    );
    let pattern_count = pattern_scanner.pattern_count();

    let scanners: Vec<Box<dyn HedgeScanner>> = vec![
        Box::new(EventGroupScanner::new(
            markets.clone(),
            log.clone(),
            risk.clone(),
            config.economics.clone(),
            config.exclusivity_keywords.clone(),
        )),
        Box::new(ThresholdScanner::new(
            markets.clone(),
            risk.clone(),
            config.economics.clone(),
            config.threshold_assets.clone(),
        )),
        Box::new(pattern_scanner),
    ];

    // -- Execution pipeline ------------------------------------------------

    let depth = DepthProbe::new(orders.clone(), log.clone(), risk.clone(), &config.execution);
    let executor = Executor::new(
        orders.clone(),
        depth,
        log.clone(),
        risk.clone(),
        sink.clone(),
        config.execution.clone(),
    );
    let reporter = Reporter::new(sink, config.clone());

    let mut orchestrator = Orchestrator::new(
        config,
        scanners,
        executor,
        reporter,
        log,
        risk,
        orders,
        pattern_count,
    );

    orchestrator.run().await
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("polyhedge=info"));

    if std::env::var("POLYHEDGE_LOG_JSON").is_ok() {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
