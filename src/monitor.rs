// =============================================================================
// Position Monitor
// =============================================================================
//
// One periodic loop, independent of both bot engines, refreshing prices on
// every open position (across all users and both paper/live) and enforcing
// paper SL/TP. Live-mode SL/TP is enforced separately by each bot engine via
// exchange tickers; this loop only ever touches paper positions' exit path.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::events::{EngineEvent, EventBus};
use crate::market_data::MarketDataService;
use crate::pnl;
use crate::store::models::PositionPatch;
use crate::store::Store;
use crate::types::{Direction, TradingMode};

const MONITOR_INTERVAL: Duration = Duration::from_secs(30);

pub struct PositionMonitor {
    store: Arc<dyn Store>,
    market_data: Arc<MarketDataService>,
    event_bus: Arc<EventBus>,
}

impl PositionMonitor {
    pub fn new(store: Arc<dyn Store>, market_data: Arc<MarketDataService>, event_bus: Arc<EventBus>) -> Self {
        Self { store, market_data, event_bus }
    }

    /// Runs forever, one pass every `MONITOR_INTERVAL`. Intended to be
    /// spawned as its own task.
    pub async fn run(self: Arc<Self>, user_ids: Vec<String>) {
        loop {
            for user_id in &user_ids {
                if let Err(e) = self.run_pass(user_id).await {
                    warn!(user_id, error = %e, "position monitor pass failed");
                }
            }
            tokio::time::sleep(MONITOR_INTERVAL).await;
        }
    }

    async fn run_pass(&self, user_id: &str) -> Result<(), crate::error::EngineError> {
        let positions = self.store.get_open_positions(user_id, None, None).await?;
        if positions.is_empty() {
            return Ok(());
        }

        let mut price_cache: HashMap<(String, bool), f64> = HashMap::new();

        for position in positions {
            let for_spot = position.trading_mode == TradingMode::Spot;
            let cache_key = (position.symbol.clone(), for_spot);

            let current_price = if let Some(price) = price_cache.get(&cache_key) {
                *price
            } else {
                let fetched = self.fetch_price(&position.symbol, for_spot).await;
                let price = match fetched {
                    Some(p) => p,
                    None => continue,
                };
                price_cache.insert(cache_key, price);
                price
            };

            let pnl_value = pnl::compute_pnl(position.direction, position.entry_price, current_price, position.quantity);

            let should_close = position.is_paper_trade
                && match (position.direction, position.stop_loss, position.take_profit) {
                    (Direction::Long | Direction::Up, Some(sl), Some(tp)) => current_price <= sl || current_price >= tp,
                    (Direction::Short, Some(sl), Some(tp)) => current_price >= sl || current_price <= tp,
                    _ => false,
                };

            if should_close {
                let reason = match position.direction {
                    Direction::Long | Direction::Up => {
                        if position.stop_loss.map(|sl| current_price <= sl).unwrap_or(false) {
                            "Stop loss"
                        } else {
                            "Take profit"
                        }
                    }
                    Direction::Short => {
                        if position.stop_loss.map(|sl| current_price >= sl).unwrap_or(false) {
                            "Stop loss"
                        } else {
                            "Take profit"
                        }
                    }
                };

                let closed = self.store.close_position(&position.id, current_price, pnl_value).await?;
                let duration_minutes = (closed.closed_at.unwrap_or_else(chrono::Utc::now) - closed.created_at).num_minutes();
                self.store.create_trade(&closed, current_price, pnl_value, duration_minutes).await?;

                self.event_bus.publish_event(EngineEvent::PositionClosed {
                    position_id: closed.id.clone(),
                    symbol: closed.symbol.clone(),
                    exit_price: current_price,
                    pnl: pnl_value,
                    reason: reason.to_string(),
                });
            } else {
                let patch = PositionPatch { current_price: Some(current_price), pnl: Some(pnl_value), stop_loss: None, take_profit: None };
                let updated = self.store.update_position(&position.id, patch).await?;
                self.event_bus.publish_event(EngineEvent::PositionUpdate {
                    position_id: updated.id.clone(),
                    symbol: updated.symbol.clone(),
                    current_price: updated.current_price,
                    pnl: updated.pnl,
                });
            }
        }

        Ok(())
    }

    /// Last closed 1-minute candle's close, spot preferred and falling back
    /// to linear, matching the category fallback `fetch_price` used before.
    async fn fetch_price(&self, symbol: &str, for_spot: bool) -> Option<f64> {
        if let Some(price) = Self::last_close(&self.market_data, symbol, for_spot).await {
            return Some(price);
        }
        if for_spot {
            return Self::last_close(&self.market_data, symbol, false).await;
        }
        None
    }

    async fn last_close(market_data: &MarketDataService, symbol: &str, for_spot: bool) -> Option<f64> {
        let candles = market_data.get_ohlcv(symbol, crate::types::Timeframe::M1, 1, for_spot).await.ok()?;
        candles.last().map(|c| c.close)
    }
}
