// Concrete end-to-end admission scenarios (spec §8 scenarios 1-3).

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use aurora_dual_engine::config::TradingSettings;
use aurora_dual_engine::engine::BotEngine;
use aurora_dual_engine::events::EventBus;
use aurora_dual_engine::exchange::BybitClient;
use aurora_dual_engine::indicators::bollinger::BollingerResult;
use aurora_dual_engine::indicators::IndicatorSnapshot;
use aurora_dual_engine::market_data::MarketDataService;
use aurora_dual_engine::strategy::evaluator;
use aurora_dual_engine::types::{Direction, StrategyKind, TradingMode};

fn only_strategy(kind: StrategyKind) -> HashMap<StrategyKind, bool> {
    StrategyKind::priority_order().into_iter().map(|k| (k, k == kind)).collect()
}

fn engine(mode: TradingMode, user_id: &str, store: Arc<dyn aurora_dual_engine::store::Store>) -> Arc<BotEngine> {
    let market_data = Arc::new(MarketDataService::new(BybitClient::mainnet(), BybitClient::mainnet()));
    let exchange = Arc::new(BybitClient::mainnet());
    let event_bus = Arc::new(EventBus::default());
    Arc::new(BotEngine::new(mode, user_id, store, market_data, exchange, event_bus, None))
}

#[tokio::test]
async fn spot_paper_long_admitted_on_oversold() {
    let (store, user_id) = common::memory_store().await;
    let engine = engine(TradingMode::Spot, &user_id, store.clone());

    let mut settings = TradingSettings::default();
    settings.usdt_per_trade = 100.0;
    settings.stop_loss_pct = 3.0;
    settings.take_profit_pct = 6.0;
    settings.indicators.rsi_low = 30.0;
    settings.min_confidence = 70.0;
    settings.spot_strategies = only_strategy(StrategyKind::MeanReversion);

    let snapshot = IndicatorSnapshot {
        rsi: Some(25.0),
        bollinger: Some(BollingerResult { upper: 20700.0, middle: 20400.0, lower: 20100.0, width: 3.0 }),
        ema_fast: None,
        ema_slow: None,
        macd: None,
        adx: None,
        sma: None,
    };

    let signals: Vec<_> = evaluator::evaluate("BTCUSDT", 20000.0, &snapshot, &settings, TradingMode::Spot)
        .into_iter()
        .filter_map(|s| s.for_mode(TradingMode::Spot))
        .collect();
    assert_eq!(signals.len(), 1);
    let signal = &signals[0];
    assert_eq!(signal.direction, Direction::Up);
    assert_eq!(signal.stop_loss, 19400.0);
    assert_eq!(signal.take_profit, 20400.0);
    assert!(signal.confidence >= 70.0);

    let admitted = engine.try_admit(signal, &settings).await.expect("admission should not error");
    assert!(admitted);

    let open = store.get_open_positions(&user_id, Some(TradingMode::Spot), None).await.unwrap();
    assert_eq!(open.len(), 1);
    let position = &open[0];
    assert_eq!(position.direction, Direction::Up);
    assert_eq!(position.entry_price, 20000.0);
    assert_eq!(position.quantity, 0.005);
    assert_eq!(position.stop_loss, Some(19400.0));
    assert_eq!(position.take_profit, Some(20400.0));
    assert!(position.is_paper_trade);
    assert_eq!(position.strategy, "Mean Reversion");
}

#[tokio::test]
async fn leverage_short_admitted_on_overbought_breakdown() {
    let (store, user_id) = common::memory_store().await;
    let engine = engine(TradingMode::Leverage, &user_id, store.clone());

    let mut settings = TradingSettings::default();
    settings.usdt_per_trade = 200.0;
    settings.take_profit_pct = 6.0;
    settings.leverage_strategies = only_strategy(StrategyKind::BreakoutTrading);

    let snapshot = IndicatorSnapshot {
        adx: Some(30.0),
        bollinger: Some(BollingerResult { upper: 1090.0, middle: 1050.0, lower: 1010.0, width: 8.0 }),
        rsi: None,
        ema_fast: None,
        ema_slow: None,
        macd: None,
        sma: None,
    };

    let signals: Vec<_> = evaluator::evaluate("ETHUSDT", 1000.0, &snapshot, &settings, TradingMode::Leverage)
        .into_iter()
        .filter_map(|s| s.for_mode(TradingMode::Leverage))
        .collect();
    assert_eq!(signals.len(), 1);
    let signal = &signals[0];
    assert_eq!(signal.direction, Direction::Short);
    assert_eq!(signal.stop_loss, 1050.0);
    assert_eq!(signal.take_profit, 940.0);
    assert_eq!(signal.confidence, 85.0);

    let admitted = engine.try_admit(signal, &settings).await.expect("admission should not error");
    assert!(admitted);

    let open = store.get_open_positions(&user_id, Some(TradingMode::Leverage), None).await.unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].quantity, 0.2);
    assert_eq!(open[0].direction, Direction::Short);
}

#[tokio::test]
async fn admission_denied_by_position_cap() {
    let (store, user_id) = common::memory_store().await;
    let engine = engine(TradingMode::Spot, &user_id, store.clone());

    for i in 0..10 {
        store
            .create_position(&user_id, &format!("SYM{i}USDT"), Direction::Up, 100.0, 1.0, None, None, TradingMode::Spot, "Trend Following", true, None)
            .await
            .expect("seed open position");
    }

    let mut settings = TradingSettings::default();
    settings.max_positions = 10;

    let signal = aurora_dual_engine::strategy::Signal {
        symbol: "SOLUSDT".into(),
        direction: Direction::Up,
        confidence: 90.0,
        strategy: StrategyKind::MeanReversion,
        entry_price: 20.0,
        stop_loss: 19.0,
        take_profit: 21.0,
    };

    let admitted = engine.try_admit(&signal, &settings).await.expect("admission gate must not error on a full cap");
    assert!(!admitted);

    let open = store.get_open_positions(&user_id, Some(TradingMode::Spot), None).await.unwrap();
    assert_eq!(open.len(), 10);
    assert!(!open.iter().any(|p| p.symbol == "SOLUSDT"));

    let logs = store.get_bot_logs(&user_id, 20).await.unwrap();
    assert!(logs.iter().any(|l| l.level == aurora_dual_engine::types::BotLogLevel::Info && l.message.contains("cap reached")));
}
