// Scenario 6 (dual bot isolation) plus the Bot Manager's close dispatch.

mod common;

use std::sync::Arc;

use aurora_dual_engine::engine::BotEngine;
use aurora_dual_engine::events::EventBus;
use aurora_dual_engine::exchange::BybitClient;
use aurora_dual_engine::manager::BotManager;
use aurora_dual_engine::market_data::MarketDataService;
use aurora_dual_engine::types::{BotState, Direction, TradingMode};

fn make_engine(mode: TradingMode, user_id: &str, store: Arc<dyn aurora_dual_engine::store::Store>, event_bus: Arc<EventBus>) -> Arc<BotEngine> {
    let market_data = Arc::new(MarketDataService::new(BybitClient::mainnet(), BybitClient::mainnet()));
    let exchange = Arc::new(BybitClient::mainnet());
    Arc::new(BotEngine::new(mode, user_id, store, market_data, exchange, event_bus, None))
}

#[tokio::test]
async fn dual_bot_isolation() {
    let (store, user_id) = common::memory_store().await;
    let event_bus = Arc::new(EventBus::default());
    let spot = make_engine(TradingMode::Spot, &user_id, store.clone(), event_bus.clone());
    let leverage = make_engine(TradingMode::Leverage, &user_id, store.clone(), event_bus.clone());
    let manager = BotManager::new(spot.clone(), leverage.clone(), store.clone());

    manager.start_spot().await.expect("spot bot should start from Stopped");
    assert_eq!(manager.get_statuses().spot, BotState::Running);
    assert_eq!(manager.get_statuses().leverage, BotState::Stopped);

    manager.start_leverage().await.expect("leverage bot should start independently of spot");
    let statuses = manager.get_statuses();
    assert_eq!(statuses.spot, BotState::Running);
    assert_eq!(statuses.leverage, BotState::Running);

    // starting an already-running bot is rejected, not silently accepted.
    assert!(manager.start_spot().await.is_err());

    // `stop` only signals cancellation; the owning run_loop task transitions
    // to Stopped once it next checks in, so only Running is ruled out here.
    manager.stop_spot().await;
    assert_ne!(manager.get_statuses().spot, BotState::Running);
    assert_eq!(manager.get_statuses().leverage, BotState::Running);

    manager.stop_leverage().await;
    assert_ne!(manager.get_statuses().leverage, BotState::Running);
}

#[tokio::test]
async fn close_position_dispatches_by_stored_trading_mode() {
    let (store, user_id) = common::memory_store().await;
    let event_bus = Arc::new(EventBus::default());
    let spot = make_engine(TradingMode::Spot, &user_id, store.clone(), event_bus.clone());
    let leverage = make_engine(TradingMode::Leverage, &user_id, store.clone(), event_bus.clone());
    let manager = BotManager::new(spot, leverage, store.clone());

    let position = store
        .create_position(&user_id, "BTCUSDT", Direction::Up, 20000.0, 0.01, None, None, TradingMode::Spot, "Trend Following", true, None)
        .await
        .unwrap();

    manager.close_position(&position.id, &user_id).await.expect("closing a paper position never touches the exchange");

    let closed = store.get_position(&position.id).await.unwrap().unwrap();
    assert_eq!(closed.status, aurora_dual_engine::types::PositionStatus::Closed);

    let history = store.get_trade_history(&user_id, None, 10).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn close_position_rejects_mismatched_user() {
    let (store, user_id) = common::memory_store().await;
    let event_bus = Arc::new(EventBus::default());
    let spot = make_engine(TradingMode::Spot, &user_id, store.clone(), event_bus.clone());
    let leverage = make_engine(TradingMode::Leverage, &user_id, store.clone(), event_bus.clone());
    let manager = BotManager::new(spot, leverage, store.clone());

    let position = store
        .create_position(&user_id, "BTCUSDT", Direction::Up, 20000.0, 0.01, None, None, TradingMode::Spot, "Trend Following", true, None)
        .await
        .unwrap();

    let result = manager.close_position(&position.id, "someone-else").await;
    assert!(result.is_err());

    let still_open = store.get_position(&position.id).await.unwrap().unwrap();
    assert_eq!(still_open.status, aurora_dual_engine::types::PositionStatus::Open);
}
