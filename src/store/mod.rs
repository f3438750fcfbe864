// =============================================================================
// Store — the engine's exclusive owner of durable state
// =============================================================================
//
// Every other component holds only borrowed snapshots or identifiers; all
// reads and writes of users, settings, positions, trades, logs and system
// errors go through this trait. Defined as a trait (rather than exposing
// `SqliteStore` directly everywhere) so tests can swap in an in-memory
// pool without touching call sites.

pub mod models;
pub mod sqlite;

use async_trait::async_trait;

use crate::config::TradingSettings;
use crate::error::EngineError;
use crate::types::TradingMode;
use models::{
    BotLog, MarketDataCache, PortfolioData, Position, PositionPatch, StrategyPerformance,
    SystemError, Trade, TradingStats, TradingSummary, User,
};

#[async_trait]
pub trait Store: Send + Sync {
    async fn get_user(&self, id: &str) -> Result<Option<User>, EngineError>;
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, EngineError>;
    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, EngineError>;
    async fn update_user_password(&self, id: &str, password_hash: &str) -> Result<(), EngineError>;

    /// Creates defaults atomically on first call; no TOCTOU window between
    /// the existence check and the insert.
    async fn get_trading_settings(&self, user_id: &str) -> Result<TradingSettings, EngineError>;
    async fn update_trading_settings(&self, user_id: &str, settings: &TradingSettings) -> Result<(), EngineError>;

    async fn get_position(&self, id: &str) -> Result<Option<Position>, EngineError>;
    async fn get_open_positions(
        &self,
        user_id: &str,
        trading_mode: Option<TradingMode>,
        is_paper_trade: Option<bool>,
    ) -> Result<Vec<Position>, EngineError>;

    /// Transactional: the "no existing open position for (user, symbol,
    /// mode)" admission check and the insert happen in one transaction, so
    /// two concurrent scan cycles can never both open a duplicate position.
    async fn create_position(
        &self,
        user_id: &str,
        symbol: &str,
        direction: crate::types::Direction,
        entry_price: f64,
        quantity: f64,
        stop_loss: Option<f64>,
        take_profit: Option<f64>,
        trading_mode: TradingMode,
        strategy: &str,
        is_paper_trade: bool,
        exchange_order_id: Option<String>,
    ) -> Result<Position, EngineError>;

    async fn update_position(&self, id: &str, patch: PositionPatch) -> Result<Position, EngineError>;

    /// Idempotent: a second call on an already-closed position returns the
    /// existing row unchanged and signals `AlreadyClosed` rather than erroring.
    async fn close_position(&self, id: &str, exit_price: f64, pnl: f64) -> Result<Position, EngineError>;

    async fn create_trade(
        &self,
        position: &Position,
        exit_price: f64,
        pnl: f64,
        duration_minutes: i64,
    ) -> Result<Trade, EngineError>;
    async fn get_trade_history(
        &self,
        user_id: &str,
        is_paper_trade: Option<bool>,
        limit: i64,
    ) -> Result<Vec<Trade>, EngineError>;

    async fn create_bot_log(
        &self,
        user_id: &str,
        level: crate::types::BotLogLevel,
        message: &str,
        symbol: Option<&str>,
        data: Option<serde_json::Value>,
    ) -> Result<BotLog, EngineError>;
    async fn get_bot_logs(&self, user_id: &str, limit: i64) -> Result<Vec<BotLog>, EngineError>;
    async fn clear_bot_logs(&self, user_id: &str) -> Result<(), EngineError>;

    async fn create_system_error(
        &self,
        user_id: &str,
        title: &str,
        source: &str,
        error_code: Option<&str>,
        message: &str,
    ) -> Result<SystemError, EngineError>;
    async fn get_system_errors(&self, user_id: &str, unresolved_only: bool) -> Result<Vec<SystemError>, EngineError>;
    async fn resolve_system_error(&self, id: &str) -> Result<(), EngineError>;

    async fn upsert_market_data(&self, data: &MarketDataCache) -> Result<(), EngineError>;
    async fn get_market_data(&self, symbol: &str) -> Result<Option<MarketDataCache>, EngineError>;

    async fn get_trading_stats(&self, user_id: &str, is_paper_trade: Option<bool>) -> Result<TradingStats, EngineError>;
    async fn get_trading_summary(&self, user_id: &str) -> Result<TradingSummary, EngineError>;
    async fn get_strategy_performance(&self, user_id: &str) -> Result<Vec<StrategyPerformance>, EngineError>;
    async fn get_portfolio_data(&self, user_id: &str) -> Result<PortfolioData, EngineError>;
}
