// Round-trip laws and the paper auto-close scenario (spec §8 scenario 4),
// exercised directly against the Store contract that both the Position
// Monitor and the Bot Manager build on.

mod common;

use aurora_dual_engine::pnl;
use aurora_dual_engine::types::{Direction, PositionStatus, TradingMode};

#[tokio::test]
async fn paper_auto_close_on_take_profit() {
    let (store, user_id) = common::memory_store().await;

    let position = store
        .create_position(&user_id, "BTCUSDT", Direction::Long, 50000.0, 0.002, Some(48500.0), Some(53000.0), TradingMode::Leverage, "Trend Following", true, None)
        .await
        .unwrap();

    let exit_price = 53010.0;
    let pnl_value = pnl::compute_pnl(position.direction, position.entry_price, exit_price, position.quantity);
    assert!((pnl_value - 6.02).abs() < 1e-9);

    let closed = store.close_position(&position.id, exit_price, pnl_value).await.unwrap();
    assert_eq!(closed.status, PositionStatus::Closed);
    assert!(closed.closed_at.is_some());
    assert_eq!(closed.current_price, exit_price);
    assert_eq!(closed.pnl, pnl_value);

    let duration_minutes = (closed.closed_at.unwrap() - closed.created_at).num_minutes();
    assert!(duration_minutes >= 0);

    let trade = store.create_trade(&closed, exit_price, pnl_value, duration_minutes).await.unwrap();
    assert_eq!(trade.entry_price, 50000.0);
    assert_eq!(trade.exit_price, exit_price);
    assert_eq!(trade.pnl, pnl_value);

    let history = store.get_trade_history(&user_id, None, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].pnl, pnl_value);

    // a position can never close twice
    assert!(matches!(
        store.close_position(&position.id, exit_price, pnl_value).await,
        Err(aurora_dual_engine::error::EngineError::AlreadyClosed)
    ));
}

#[tokio::test]
async fn closing_at_entry_price_yields_zero_pnl_and_nonnegative_duration() {
    let (store, user_id) = common::memory_store().await;
    let position = store
        .create_position(&user_id, "ETHUSDT", Direction::Up, 3000.0, 1.0, None, None, TradingMode::Spot, "Pullback", true, None)
        .await
        .unwrap();

    let pnl_value = pnl::compute_pnl(position.direction, position.entry_price, position.entry_price, position.quantity);
    assert_eq!(pnl_value, 0.0);

    let closed = store.close_position(&position.id, position.entry_price, pnl_value).await.unwrap();
    let duration_minutes = (closed.closed_at.unwrap() - closed.created_at).num_minutes();
    assert!(duration_minutes >= 0);
    assert_eq!(closed.pnl, 0.0);
}

#[tokio::test]
async fn at_most_one_open_position_per_user_symbol_mode() {
    let (store, user_id) = common::memory_store().await;
    store
        .create_position(&user_id, "BTCUSDT", Direction::Up, 20000.0, 0.01, None, None, TradingMode::Spot, "Trend Following", true, None)
        .await
        .unwrap();

    let second = store
        .create_position(&user_id, "BTCUSDT", Direction::Up, 20100.0, 0.01, None, None, TradingMode::Spot, "Mean Reversion", true, None)
        .await;
    assert!(second.is_err());

    let open = store.get_open_positions(&user_id, Some(TradingMode::Spot), None).await.unwrap();
    assert_eq!(open.len(), 1);
}
