// =============================================================================
// Bot Manager — lifecycle owner of both bot engines
// =============================================================================
//
// The only component that touches `BotEngine` directly; everything else
// (the HTTP/WebSocket surface, tests) goes through typed queries here. Global
// mutable bot status never lives in the HTTP layer.

use std::sync::Arc;

use crate::engine::BotEngine;
use crate::error::EngineError;
use crate::store::Store;
use crate::types::{BotState, TradingMode};

pub struct BotStatuses {
    pub spot: BotState,
    pub leverage: BotState,
}

pub struct BotManager {
    spot: Arc<BotEngine>,
    leverage: Arc<BotEngine>,
    store: Arc<dyn Store>,
}

impl BotManager {
    pub fn new(spot: Arc<BotEngine>, leverage: Arc<BotEngine>, store: Arc<dyn Store>) -> Self {
        Self { spot, leverage, store }
    }

    pub async fn start_spot(&self) -> Result<(), EngineError> {
        self.spot.start().await
    }

    pub async fn stop_spot(&self) {
        self.spot.stop().await
    }

    pub async fn start_leverage(&self) -> Result<(), EngineError> {
        self.leverage.start().await
    }

    pub async fn stop_leverage(&self) {
        self.leverage.stop().await
    }

    /// Stops both engines, waiting for each to signal its cancellation.
    pub async fn stop_all(&self) {
        self.stop_spot().await;
        self.stop_leverage().await;
    }

    pub fn get_statuses(&self) -> BotStatuses {
        BotStatuses { spot: self.spot.state(), leverage: self.leverage.state() }
    }

    /// Dispatches to the engine matching the position's stored `tradingMode`
    /// — the sole source of truth for which category a close belongs to.
    pub async fn close_position(&self, id: &str, user_id: &str) -> Result<(), EngineError> {
        let position = self
            .store
            .get_position(id)
            .await?
            .ok_or_else(|| EngineError::DataUnavailable(format!("position {id} not found")))?;

        if position.user_id != user_id {
            return Err(EngineError::ValidationError("position does not belong to user".into()));
        }

        let engine = match position.trading_mode {
            TradingMode::Spot => &self.spot,
            TradingMode::Leverage => &self.leverage,
        };
        engine.exit_live_position(&position).await?;

        let pnl = crate::pnl::compute_pnl(position.direction, position.entry_price, position.current_price, position.quantity);
        let closed = self.store.close_position(id, position.current_price, pnl).await?;
        let duration_minutes = (closed.closed_at.unwrap_or_else(chrono::Utc::now) - closed.created_at).num_minutes();
        self.store.create_trade(&closed, position.current_price, pnl, duration_minutes).await?;
        Ok(())
    }
}
