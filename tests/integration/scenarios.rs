//! End-to-end scenarios against the mock gateways.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use polyhedge::config::{
    AppConfig, ClobCredentials, EconomicsConfig, ExecutionConfig, KillConfig, SchedulingConfig,
    TelegramConfig, ThresholdAsset,
};
use polyhedge::engine::depth::DepthProbe;
use polyhedge::engine::executor::Executor;
use polyhedge::engine::orchestrator::Orchestrator;
use polyhedge::engine::reporter::Reporter;
use polyhedge::notify::NotifySink;
use polyhedge::platforms::{OrderBook, OrderGateway};
use polyhedge::risk::RiskManager;
use polyhedge::scanners::event_group::EventGroupScanner;
use polyhedge::scanners::threshold::ThresholdScanner;
use polyhedge::scanners::{HedgeScanner, ScanOutcome};
use polyhedge::storage::EventLog;
use polyhedge::types::{
    Confidence, HedgeLeg, HedgeOpportunity, HedgeType, MarketGroup, ScannerTag, Side,
};

use crate::mock_gateway::{level, market, MockMarketGateway, MockOrderGateway, RecordingSink};

// ---------------------------------------------------------------------------
// Shared builders
// ---------------------------------------------------------------------------

fn kill_config() -> KillConfig {
    KillConfig {
        partial_fill_streak: 3,
        partial_fill_day: 8,
        api_errors_10m: 5,
        latency_ms: 4000.0,
        latency_window_sec: 120,
        thin_book_scans: 4,
        max_trades_per_hour: 20,
        max_exposure_pct: 0.5,
    }
}

fn economics() -> EconomicsConfig {
    EconomicsConfig {
        min_profit_per_dollar: 0.003,
        fee_rate: 0.02,
        min_event_volume_24h: 5000.0,
        realert_threshold: 0.05,
    }
}

fn execution(auto_trade: bool) -> ExecutionConfig {
    ExecutionConfig {
        auto_trade,
        trade_budget: 50.0,
        bankroll: 100.0,
        max_spread: 0.05,
        min_depth_usd: 20.0,
    }
}

fn app_config(auto_trade: bool) -> Arc<AppConfig> {
    Arc::new(AppConfig {
        scheduling: SchedulingConfig {
            scan_interval: Duration::from_secs(180),
            summary_interval: Duration::from_secs(900),
        },
        economics: economics(),
        execution: execution(auto_trade),
        kill: kill_config(),
        telegram: TelegramConfig {
            token: String::new(),
            chat_ids: Vec::new(),
        },
        clob: ClobCredentials {
            address: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            passphrase: String::new(),
        },
        exclusivity_keywords: vec!["who will".to_string(), "winner".to_string()],
        threshold_assets: Vec::new(),
        db_path: ":memory:".to_string(),
        patterns_file: "/nonexistent/patterns.json".to_string(),
    })
}

fn fresh_risk() -> Arc<Mutex<RiskManager>> {
    Arc::new(Mutex::new(RiskManager::new(kill_config())))
}

fn two_leg_opp(net: f64) -> HedgeOpportunity {
    let legs = vec![
        HedgeLeg {
            market_id: "m-a".to_string(),
            question: "Leg A?".to_string(),
            side: Side::Yes,
            price: 0.55,
            token_id: "tok-a".to_string(),
            volume_24h: 8000.0,
        },
        HedgeLeg {
            market_id: "m-b".to_string(),
            question: "Leg B?".to_string(),
            side: Side::Yes,
            price: 0.35,
            token_id: "tok-b".to_string(),
            volume_24h: 7000.0,
        },
    ];
    HedgeOpportunity {
        name: "integration hedge".to_string(),
        scanner: ScannerTag::Pattern,
        hedge_type: HedgeType::Complementary,
        legs,
        total_cost: 0.90,
        min_payout: 1.0,
        max_payout: 1.0,
        guaranteed_profit: 0.10,
        best_case_profit: 0.10,
        net_profit_per_dollar: net,
        confidence: Confidence::Guaranteed,
        discovered_at: Utc::now(),
    }
}

fn executor_with(
    orders: Arc<MockOrderGateway>,
    auto_trade: bool,
) -> (Executor, Arc<EventLog>, Arc<Mutex<RiskManager>>, Arc<RecordingSink>) {
    let log = Arc::new(EventLog::open_in_memory().unwrap());
    let risk = fresh_risk();
    let sink = Arc::new(RecordingSink::default());
    let exec_cfg = execution(auto_trade);
    let gateway: Arc<dyn OrderGateway> = orders;
    let depth = DepthProbe::new(gateway.clone(), log.clone(), risk.clone(), &exec_cfg);
    let executor = Executor::new(
        gateway,
        depth,
        log.clone(),
        risk.clone(),
        sink.clone(),
        exec_cfg,
    );
    (executor, log, risk, sink)
}

// ---------------------------------------------------------------------------
// Scenario A — event-group all-YES arbitrage
// ---------------------------------------------------------------------------

#[tokio::test]
async fn scenario_a_event_group_all_yes() {
    let markets = vec![
        market("m1", "Who will win: candidate one?", 0.30, 0.70, 2000.0),
        market("m2", "Who will win: candidate two?", 0.35, 0.65, 2000.0),
        market("m3", "Who will win: candidate three?", 0.28, 0.72, 2000.0),
    ];
    let group = MarketGroup {
        id: "ev1".to_string(),
        title: "Who will win the nomination?".to_string(),
        description: String::new(),
        markets,
    };

    let log = Arc::new(EventLog::open_in_memory().unwrap());
    let scanner = EventGroupScanner::new(
        Arc::new(MockMarketGateway::with_events(vec![group])),
        log,
        fresh_risk(),
        economics(),
        vec!["who will".to_string()],
    );

    let outcome = scanner.scan().await.unwrap();
    let opp = outcome
        .opportunities
        .iter()
        .find(|o| o.legs.iter().all(|l| l.side == Side::Yes))
        .expect("all-YES opportunity");

    assert_eq!(opp.legs.len(), 3);
    assert!((opp.total_cost - 0.93).abs() < 1e-9);
    assert!((opp.min_payout - 1.0).abs() < 1e-12);
    assert!((opp.max_payout - 1.0).abs() < 1e-12);
    assert!((opp.guaranteed_profit - 0.07).abs() < 1e-9);
    let expected_net = 0.07 / 0.93 - 0.04;
    assert!((opp.net_profit_per_dollar - expected_net).abs() < 1e-9);
    assert!((expected_net - 0.0353).abs() < 1e-3);
}

// ---------------------------------------------------------------------------
// Scenario B — threshold pair
// ---------------------------------------------------------------------------

#[tokio::test]
async fn scenario_b_threshold_pair() {
    let low = market(
        "m-68",
        "Will Bitcoin be above $68,000 on Dec 31?",
        0.72,
        0.28,
        9000.0,
    );
    let high = market(
        "m-72",
        "Will Bitcoin be above $72,000 on Dec 31?",
        0.78,
        0.22,
        8000.0,
    );
    let mut search = HashMap::new();
    search.insert("Bitcoin above".to_string(), vec![low, high]);

    let scanner = ThresholdScanner::new(
        Arc::new(MockMarketGateway::with_search(search)),
        fresh_risk(),
        economics(),
        vec![ThresholdAsset {
            name: "Bitcoin".to_string(),
            search_terms: vec!["Bitcoin above".to_string()],
            levels: vec![68_000.0, 72_000.0],
        }],
    );

    let outcome = scanner.scan().await.unwrap();
    assert_eq!(outcome.opportunities.len(), 1);
    let opp = &outcome.opportunities[0];

    assert_eq!(opp.legs[0].side, Side::No);
    assert_eq!(opp.legs[0].market_id, "m-72");
    assert!((opp.legs[0].price - 0.22).abs() < 1e-9);
    assert_eq!(opp.legs[1].side, Side::Yes);
    assert_eq!(opp.legs[1].market_id, "m-68");
    assert!((opp.legs[1].price - 0.72).abs() < 1e-9);
    assert!((opp.total_cost - 0.94).abs() < 1e-9);
    assert!((opp.min_payout - 1.0).abs() < 1e-12);
    assert!((opp.max_payout - 2.0).abs() < 1e-12);
    assert!((opp.net_profit_per_dollar - (0.06 / 0.94 - 0.04)).abs() < 1e-9);
    assert!((opp.net_profit_per_dollar - 0.0238).abs() < 1e-3);
}

// ---------------------------------------------------------------------------
// Scenario C — kill-switch trip on API errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn scenario_c_kill_switch_blocks_execution() {
    let orders = Arc::new(MockOrderGateway::default());
    let (executor, log, risk, sink) = executor_with(orders.clone(), true);

    for _ in 0..5 {
        risk.lock().unwrap().record_api_error();
    }
    assert!(risk.lock().unwrap().should_kill());
    assert!(risk.lock().unwrap().kill_reason().contains("api_errors"));

    let report = executor.execute(&two_leg_opp(0.07)).await;
    assert!(!report.executed);
    assert!(report.legs.is_empty());
    assert!(orders.placed_orders().is_empty());
    assert!(report.errors.iter().any(|e| e.contains("kill_switch")));
    assert_eq!(log.stats().unwrap().total_incidents, 1);
    // One kill notification went out.
    assert_eq!(sink.messages().len(), 1);
    assert!(sink.messages()[0].contains("KILL SWITCH"));
}

// ---------------------------------------------------------------------------
// Scenario D — partial fill
// ---------------------------------------------------------------------------

#[tokio::test]
async fn scenario_d_partial_fill() {
    let orders = Arc::new(MockOrderGateway::rejecting("tok-b", "book_crossed"));
    let (executor, log, risk, _sink) = executor_with(orders.clone(), true);

    let report = executor.execute(&two_leg_opp(0.07)).await;

    assert!(!report.executed);
    assert!(report.partial);
    assert_eq!(report.legs.len(), 1);
    assert_eq!(orders.placed_orders().len(), 1);
    assert_eq!(orders.placed_orders()[0].token_id, "tok-a");

    // Exposure grew by leg A only.
    let leg_a_amount = 0.55 * (50.0 / 0.90);
    assert!((risk.lock().unwrap().current_open_exposure() - leg_a_amount).abs() < 1e-6);

    // Streak incremented; one partial_fill incident appended.
    let status = risk.lock().unwrap().status_text();
    assert!(status.contains("Partial fills (streak/day): 1/1"));
    assert_eq!(log.stats().unwrap().total_incidents, 1);
    assert_eq!(log.stats().unwrap().total_order_errors, 1);
}

// ---------------------------------------------------------------------------
// Scenario E — depth rejection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn scenario_e_depth_rejection() {
    // $20 target against a $5.82 book.
    let book = OrderBook {
        asks: vec![level(0.72, 5.0), level(0.74, 3.0)],
        bids: vec![level(0.70, 5.0)],
    };
    let orders = Arc::new(MockOrderGateway::with_book("tok-thin", book));
    let log = Arc::new(EventLog::open_in_memory().unwrap());
    let risk = fresh_risk();
    let gateway: Arc<dyn OrderGateway> = orders;
    let probe = DepthProbe::new(gateway, log, risk.clone(), &execution(true));

    let verdict = probe.check("tok-thin", 20.0).await;
    assert!(!verdict.pass);
    assert!(verdict.reason.contains("insufficient_depth"));

    let status = risk.lock().unwrap().status_text();
    assert!(status.contains("Thin book streak: 1"));
}

// ---------------------------------------------------------------------------
// Scenario F — re-alert threshold (full orchestrator ticks)
// ---------------------------------------------------------------------------

/// Scanner that replays a scripted sequence of outcomes, one per tick.
struct ScriptedScanner {
    script: Mutex<Vec<Vec<HedgeOpportunity>>>,
}

impl ScriptedScanner {
    fn new(mut script: Vec<Vec<HedgeOpportunity>>) -> Self {
        script.reverse();
        Self {
            script: Mutex::new(script),
        }
    }
}

#[async_trait]
impl HedgeScanner for ScriptedScanner {
    fn tag(&self) -> ScannerTag {
        ScannerTag::Pattern
    }

    async fn scan(&self) -> anyhow::Result<ScanOutcome> {
        let opportunities = self.script.lock().unwrap().pop().unwrap_or_default();
        Ok(ScanOutcome {
            markets_checked: 2,
            opportunities,
        })
    }
}

fn orchestrator_with(
    script: Vec<Vec<HedgeOpportunity>>,
    auto_trade: bool,
) -> (Orchestrator, Arc<EventLog>, Arc<RecordingSink>, Arc<MockOrderGateway>) {
    let config = app_config(auto_trade);
    let log = Arc::new(EventLog::open_in_memory().unwrap());
    let risk = fresh_risk();
    let sink = Arc::new(RecordingSink::default());
    let orders = Arc::new(MockOrderGateway::default());

    let gateway: Arc<dyn OrderGateway> = orders.clone();
    let depth = DepthProbe::new(gateway.clone(), log.clone(), risk.clone(), &config.execution);
    let executor = Executor::new(
        gateway.clone(),
        depth,
        log.clone(),
        risk.clone(),
        sink.clone() as Arc<dyn NotifySink>,
        config.execution.clone(),
    );
    let reporter = Reporter::new(sink.clone() as Arc<dyn NotifySink>, config.clone());

    let scanners: Vec<Box<dyn HedgeScanner>> = vec![Box::new(ScriptedScanner::new(script))];
    let orchestrator = Orchestrator::new(
        config,
        scanners,
        executor,
        reporter,
        log.clone(),
        risk,
        gateway,
        5,
    );
    (orchestrator, log, sink, orders)
}

fn alert_count(sink: &RecordingSink) -> usize {
    sink.messages()
        .iter()
        .filter(|m| m.contains("HEDGE FOUND"))
        .count()
}

#[tokio::test]
async fn scenario_f_realert_threshold() {
    let script = vec![
        vec![two_leg_opp(0.010)],  // first sighting → alert
        vec![two_leg_opp(0.0104)], // Δ 4% → suppressed
        vec![two_leg_opp(0.011)],  // Δ 10% from baseline → re-alert
    ];
    let (mut orchestrator, _log, sink, _orders) = orchestrator_with(script, false);

    orchestrator.full_scan().await;
    assert_eq!(alert_count(&sink), 1);

    orchestrator.full_scan().await;
    assert_eq!(alert_count(&sink), 1, "4% move must not re-alert");

    orchestrator.full_scan().await;
    assert_eq!(alert_count(&sink), 2, "10% move must re-alert");
}

#[tokio::test]
async fn dedup_entry_pruned_when_hedge_disappears() {
    let script = vec![
        vec![two_leg_opp(0.010)],
        vec![], // hedge gone → dedup entry cleared
        vec![two_leg_opp(0.010)],
    ];
    let (mut orchestrator, _log, sink, _orders) = orchestrator_with(script, false);

    orchestrator.full_scan().await;
    orchestrator.full_scan().await;
    orchestrator.full_scan().await;

    // The third sighting alerts again even though profit is unchanged,
    // because the key was pruned in the empty scan.
    assert_eq!(alert_count(&sink), 2);
}

// ---------------------------------------------------------------------------
// Full auto-trade tick
// ---------------------------------------------------------------------------

#[tokio::test]
async fn auto_trade_tick_executes_and_logs() {
    let script = vec![vec![two_leg_opp(0.07)]];
    let (mut orchestrator, log, sink, orders) = orchestrator_with(script, true);

    orchestrator.full_scan().await;

    // Both legs reached the venue.
    assert_eq!(orders.placed_orders().len(), 2);

    // Opportunity logged twice: discovery, then executed re-log.
    let stats = log.stats().unwrap();
    assert_eq!(stats.total_opportunities, 2);
    assert_eq!(stats.total_scans, 1);

    // The alert reports the auto-execution.
    let alert = sink
        .messages()
        .into_iter()
        .find(|m| m.contains("HEDGE FOUND"))
        .expect("alert sent");
    assert!(alert.contains("AUTO-EXECUTED"));
}

#[tokio::test]
async fn scanner_failure_records_incident_and_error_alert() {
    struct FailingScanner;

    #[async_trait]
    impl HedgeScanner for FailingScanner {
        fn tag(&self) -> ScannerTag {
            ScannerTag::EventGroup
        }
        async fn scan(&self) -> anyhow::Result<ScanOutcome> {
            anyhow::bail!("gateway unreachable")
        }
    }

    let config = app_config(false);
    let log = Arc::new(EventLog::open_in_memory().unwrap());
    let risk = fresh_risk();
    let sink = Arc::new(RecordingSink::default());
    let orders = Arc::new(MockOrderGateway::default());
    let gateway: Arc<dyn OrderGateway> = orders;
    let depth = DepthProbe::new(gateway.clone(), log.clone(), risk.clone(), &config.execution);
    let executor = Executor::new(
        gateway.clone(),
        depth,
        log.clone(),
        risk.clone(),
        sink.clone() as Arc<dyn NotifySink>,
        config.execution.clone(),
    );
    let reporter = Reporter::new(sink.clone() as Arc<dyn NotifySink>, config.clone());

    let mut orchestrator = Orchestrator::new(
        config,
        vec![Box::new(FailingScanner)],
        executor,
        reporter,
        log.clone(),
        risk,
        gateway,
        0,
    );

    orchestrator.full_scan().await;

    let stats = log.stats().unwrap();
    assert_eq!(stats.total_scans, 1); // error row still written
    assert_eq!(stats.total_incidents, 1);
    assert!(sink
        .messages()
        .iter()
        .any(|m| m.contains("SCAN ERROR") && m.contains("gateway unreachable")));
}

// ---------------------------------------------------------------------------
// Cross-cutting properties
// ---------------------------------------------------------------------------

#[tokio::test]
async fn opportunity_well_formedness_across_scanners() {
    // Event-group fixture.
    let group = MarketGroup {
        id: "ev1".to_string(),
        title: "Who will win the award?".to_string(),
        description: String::new(),
        markets: vec![
            market("g1", "Winner one?", 0.30, 0.70, 3000.0),
            market("g2", "Winner two?", 0.31, 0.69, 3000.0),
            market("g3", "Winner three?", 0.29, 0.71, 3000.0),
        ],
    };
    let log = Arc::new(EventLog::open_in_memory().unwrap());
    let eg = EventGroupScanner::new(
        Arc::new(MockMarketGateway::with_events(vec![group])),
        log,
        fresh_risk(),
        economics(),
        vec!["who will".to_string()],
    );

    // Threshold fixture.
    let mut search = HashMap::new();
    search.insert(
        "Bitcoin above".to_string(),
        vec![
            market("t1", "Bitcoin above $68,000?", 0.70, 0.30, 5000.0),
            market("t2", "Bitcoin above $72,000?", 0.76, 0.24, 5000.0),
        ],
    );
    let th = ThresholdScanner::new(
        Arc::new(MockMarketGateway::with_search(search)),
        fresh_risk(),
        economics(),
        vec![ThresholdAsset {
            name: "Bitcoin".to_string(),
            search_terms: vec!["Bitcoin above".to_string()],
            levels: vec![],
        }],
    );

    let mut all = eg.scan().await.unwrap().opportunities;
    all.extend(th.scan().await.unwrap().opportunities);
    assert!(!all.is_empty());

    for opp in &all {
        let leg_sum: f64 = opp.legs.iter().map(|l| l.price).sum();
        assert!((opp.total_cost - leg_sum).abs() < 1e-9, "cost equals Σ legs");
        assert!(opp.total_cost > 0.0);
        assert!(opp.min_payout <= opp.max_payout);
        assert!(opp.net_profit_per_dollar >= economics().min_profit_per_dollar);
        for leg in &opp.legs {
            assert!(leg.price > 0.0 && leg.price < 1.0);
        }
    }
}

#[tokio::test]
async fn scanner_determinism_identical_runs() {
    let mut search = HashMap::new();
    search.insert(
        "Bitcoin above".to_string(),
        vec![
            market("t1", "Bitcoin above $68,000?", 0.70, 0.30, 5000.0),
            market("t2", "Bitcoin above $72,000?", 0.76, 0.24, 5000.0),
            market("t3", "Bitcoin above $80,000?", 0.85, 0.15, 5000.0),
        ],
    );
    let th = ThresholdScanner::new(
        Arc::new(MockMarketGateway::with_search(search)),
        fresh_risk(),
        economics(),
        vec![ThresholdAsset {
            name: "Bitcoin".to_string(),
            search_terms: vec!["Bitcoin above".to_string()],
            levels: vec![],
        }],
    );

    let a = th.scan().await.unwrap().opportunities;
    let b = th.scan().await.unwrap().opportunities;
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(&b) {
        assert_eq!(x.name, y.name);
        assert_eq!(x.alert_key(), y.alert_key());
        assert_eq!(x.market_ids(), y.market_ids());
        assert!((x.total_cost - y.total_cost).abs() < 1e-12);
    }
}

#[test]
fn alert_key_permutation_stability() {
    let mut opp = two_leg_opp(0.05);
    let key = opp.alert_key();
    opp.legs.reverse();
    assert_eq!(opp.alert_key(), key);
}

#[test]
fn exposure_monotonicity() {
    let risk = fresh_risk();
    let before = risk.lock().unwrap().current_open_exposure();
    risk.lock().unwrap().add_exposure(33.0);
    risk.lock().unwrap().reduce_exposure(33.0);
    assert!((risk.lock().unwrap().current_open_exposure() - before).abs() < 1e-12);
    risk.lock().unwrap().reduce_exposure(10.0);
    assert_eq!(risk.lock().unwrap().current_open_exposure(), 0.0);
}

#[test]
fn kill_switch_latch_property() {
    let risk = fresh_risk();
    for _ in 0..5 {
        risk.lock().unwrap().record_api_error();
    }
    assert!(risk.lock().unwrap().should_kill());
    // Healthy signals afterwards cannot clear the latch.
    for _ in 0..10 {
        risk.lock().unwrap().record_hedged_complete();
        risk.lock().unwrap().record_thin_book(false);
        assert!(risk.lock().unwrap().should_kill());
    }
}

#[test]
fn depth_sweep_arithmetic_property() {
    use polyhedge::engine::depth::vwap_cost;

    let asks = vec![level(0.40, 10.0), level(0.45, 8.0), level(0.60, 30.0)];
    for qty in [1.0, 5.0, 10.0, 17.9, 18.0, 47.9, 48.0, 60.0] {
        let (cost, enough) = vwap_cost(&asks, qty);
        let total_size: f64 = asks.iter().map(|l| l.size).sum();
        assert_eq!(enough, qty <= total_size);
        if enough {
            // Never worse than paying the worst consumed price for all.
            assert!(cost <= qty * 0.60 + 1e-9);
            // Never better than the best price for all.
            assert!(cost >= qty * 0.40 - 1e-9);
        }
    }
}
