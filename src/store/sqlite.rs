// =============================================================================
// SqliteStore — embedded single-file persistence via sqlx
// =============================================================================

use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::config::{IndicatorParams, TradingSettings};
use crate::error::EngineError;
use crate::types::{BotLogLevel, Direction, Environment, PositionStatus, StrategyKind, Timeframe, TradingMode};

use super::models::{
    BotLog, MarketDataCache, PortfolioData, Position, PositionPatch, StrategyPerformance,
    SystemError, Trade, TradingStats, TradingSummary, User,
};
use super::Store;

fn money_to_text(v: f64) -> String {
    Decimal::from_f64_retain(v).unwrap_or_default().normalize().to_string()
}

fn text_to_money(s: &str) -> f64 {
    Decimal::from_str(s).ok().and_then(|d| d.to_f64()).unwrap_or(0.0)
}

fn bool_to_int(b: bool) -> i64 {
    if b {
        1
    } else {
        0
    }
}

fn storage_err(e: sqlx::Error) -> EngineError {
    EngineError::StorageError(e.to_string())
}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self, EngineError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(database_url)
            .await
            .map_err(storage_err)?;
        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| EngineError::StorageError(e.to_string()))?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_user(row: &SqliteRow) -> Result<User, EngineError> {
        Ok(User {
            id: row.try_get("id").map_err(storage_err)?,
            username: row.try_get("username").map_err(storage_err)?,
            password_hash: row.try_get("password_hash").map_err(storage_err)?,
            created_at: parse_ts(row.try_get::<String, _>("created_at").map_err(storage_err)?)?,
        })
    }

    fn row_to_position(row: &SqliteRow) -> Result<Position, EngineError> {
        let direction_s: String = row.try_get("direction").map_err(storage_err)?;
        let status_s: String = row.try_get("status").map_err(storage_err)?;
        let mode_s: String = row.try_get("trading_mode").map_err(storage_err)?;
        let closed_at: Option<String> = row.try_get("closed_at").map_err(storage_err)?;
        Ok(Position {
            id: row.try_get("id").map_err(storage_err)?,
            user_id: row.try_get("user_id").map_err(storage_err)?,
            symbol: row.try_get("symbol").map_err(storage_err)?,
            direction: Direction::parse(&direction_s)
                .ok_or_else(|| EngineError::StorageError(format!("bad direction {direction_s}")))?,
            entry_price: text_to_money(&row.try_get::<String, _>("entry_price").map_err(storage_err)?),
            current_price: text_to_money(&row.try_get::<String, _>("current_price").map_err(storage_err)?),
            stop_loss: row
                .try_get::<Option<String>, _>("stop_loss")
                .map_err(storage_err)?
                .map(|s| text_to_money(&s)),
            take_profit: row
                .try_get::<Option<String>, _>("take_profit")
                .map_err(storage_err)?
                .map(|s| text_to_money(&s)),
            quantity: text_to_money(&row.try_get::<String, _>("quantity").map_err(storage_err)?),
            pnl: text_to_money(&row.try_get::<String, _>("pnl").map_err(storage_err)?),
            status: if status_s == "closed" { PositionStatus::Closed } else { PositionStatus::Open },
            trading_mode: TradingMode::parse(&mode_s)
                .ok_or_else(|| EngineError::StorageError(format!("bad trading_mode {mode_s}")))?,
            strategy: row.try_get("strategy").map_err(storage_err)?,
            is_paper_trade: row.try_get::<i64, _>("is_paper_trade").map_err(storage_err)? != 0,
            exchange_order_id: row.try_get("exchange_order_id").map_err(storage_err)?,
            created_at: parse_ts(row.try_get::<String, _>("created_at").map_err(storage_err)?)?,
            closed_at: closed_at.map(parse_ts).transpose()?,
        })
    }

    fn row_to_trade(row: &SqliteRow) -> Result<Trade, EngineError> {
        let direction_s: String = row.try_get("direction").map_err(storage_err)?;
        let mode_s: String = row.try_get("trading_mode").map_err(storage_err)?;
        Ok(Trade {
            id: row.try_get("id").map_err(storage_err)?,
            user_id: row.try_get("user_id").map_err(storage_err)?,
            position_id: row.try_get("position_id").map_err(storage_err)?,
            symbol: row.try_get("symbol").map_err(storage_err)?,
            direction: Direction::parse(&direction_s)
                .ok_or_else(|| EngineError::StorageError(format!("bad direction {direction_s}")))?,
            entry_price: text_to_money(&row.try_get::<String, _>("entry_price").map_err(storage_err)?),
            exit_price: text_to_money(&row.try_get::<String, _>("exit_price").map_err(storage_err)?),
            quantity: text_to_money(&row.try_get::<String, _>("quantity").map_err(storage_err)?),
            pnl: text_to_money(&row.try_get::<String, _>("pnl").map_err(storage_err)?),
            duration_minutes: row.try_get("duration_minutes").map_err(storage_err)?,
            strategy: row.try_get("strategy").map_err(storage_err)?,
            trading_mode: TradingMode::parse(&mode_s)
                .ok_or_else(|| EngineError::StorageError(format!("bad trading_mode {mode_s}")))?,
            is_paper_trade: row.try_get::<i64, _>("is_paper_trade").map_err(storage_err)? != 0,
            entry_time: parse_ts(row.try_get::<String, _>("entry_time").map_err(storage_err)?)?,
            exit_time: parse_ts(row.try_get::<String, _>("exit_time").map_err(storage_err)?)?,
        })
    }

    fn row_to_bot_log(row: &SqliteRow) -> Result<BotLog, EngineError> {
        let level_s: String = row.try_get("level").map_err(storage_err)?;
        let data: Option<String> = row.try_get("data").map_err(storage_err)?;
        Ok(BotLog {
            id: row.try_get("id").map_err(storage_err)?,
            user_id: row.try_get("user_id").map_err(storage_err)?,
            level: BotLogLevel::parse(&level_s).unwrap_or(BotLogLevel::Info),
            message: row.try_get("message").map_err(storage_err)?,
            symbol: row.try_get("symbol").map_err(storage_err)?,
            data: data.and_then(|d| serde_json::from_str(&d).ok()),
            created_at: parse_ts(row.try_get::<String, _>("created_at").map_err(storage_err)?)?,
        })
    }

    fn row_to_system_error(row: &SqliteRow) -> Result<SystemError, EngineError> {
        Ok(SystemError {
            id: row.try_get("id").map_err(storage_err)?,
            user_id: row.try_get("user_id").map_err(storage_err)?,
            title: row.try_get("title").map_err(storage_err)?,
            source: row.try_get("source").map_err(storage_err)?,
            error_code: row.try_get("error_code").map_err(storage_err)?,
            message: row.try_get("message").map_err(storage_err)?,
            resolved: row.try_get::<i64, _>("resolved").map_err(storage_err)? != 0,
            created_at: parse_ts(row.try_get::<String, _>("created_at").map_err(storage_err)?)?,
        })
    }
}

fn parse_ts(s: String) -> Result<DateTime<Utc>, EngineError> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| EngineError::StorageError(format!("bad timestamp {s}: {e}")))
}

#[async_trait]
impl Store for SqliteStore {
    async fn get_user(&self, id: &str) -> Result<Option<User>, EngineError> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        row.as_ref().map(Self::row_to_user).transpose()
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, EngineError> {
        let row = sqlx::query("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        row.as_ref().map(Self::row_to_user).transpose()
    }

    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, EngineError> {
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now();
        sqlx::query("INSERT INTO users (id, username, password_hash, created_at) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(username)
            .bind(password_hash)
            .bind(created_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(User { id, username: username.to_string(), password_hash: password_hash.to_string(), created_at })
    }

    async fn update_user_password(&self, id: &str, password_hash: &str) -> Result<(), EngineError> {
        sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn get_trading_settings(&self, user_id: &str) -> Result<TradingSettings, EngineError> {
        // BEGIN IMMEDIATE takes the write lock up front, closing the TOCTOU
        // window between the existence check and the defaults insert.
        let mut tx = self.pool.begin().await.map_err(storage_err)?;
        sqlx::query("INSERT OR IGNORE INTO trading_settings (user_id, usdt_per_trade, risk_per_trade, stop_loss_pct, take_profit_pct, max_positions, environment, spot_paper_trading, leverage_paper_trading, rsi_period, rsi_low, rsi_high, ema_fast, ema_slow, macd_signal, adx_period, spot_strategies, leverage_strategies, spot_ai_trading, leverage_ai_trading, timeframe, min_confidence) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)")
            .bind(user_id)
            .bind(money_to_text(50.0))
            .bind(money_to_text(1.0))
            .bind(money_to_text(1.5))
            .bind(money_to_text(3.0))
            .bind(3_i64)
            .bind("mainnet")
            .bind(1_i64)
            .bind(1_i64)
            .bind(14_i64)
            .bind(money_to_text(30.0))
            .bind(money_to_text(70.0))
            .bind(9_i64)
            .bind(21_i64)
            .bind(9_i64)
            .bind(14_i64)
            .bind(serde_json::to_string(&default_toggles()).unwrap())
            .bind(serde_json::to_string(&default_toggles()).unwrap())
            .bind(0_i64)
            .bind(0_i64)
            .bind("15m")
            .bind(money_to_text(60.0))
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        let row = sqlx::query("SELECT * FROM trading_settings WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(storage_err)?;
        tx.commit().await.map_err(storage_err)?;
        row_to_settings(&row)
    }

    async fn update_trading_settings(&self, user_id: &str, settings: &TradingSettings) -> Result<(), EngineError> {
        settings.validate()?;
        let (api_key, api_secret) = settings
            .credentials
            .as_ref()
            .map(|c| (Some(c.api_key.clone()), Some(c.api_secret.clone())))
            .unwrap_or((None, None));
        sqlx::query(
            "UPDATE trading_settings SET usdt_per_trade=?, risk_per_trade=?, stop_loss_pct=?, take_profit_pct=?, \
             max_positions=?, api_key=?, api_secret=?, environment=?, spot_paper_trading=?, leverage_paper_trading=?, \
             rsi_period=?, rsi_low=?, rsi_high=?, ema_fast=?, ema_slow=?, macd_signal=?, adx_period=?, \
             spot_strategies=?, leverage_strategies=?, spot_ai_trading=?, leverage_ai_trading=?, timeframe=?, min_confidence=? \
             WHERE user_id = ?",
        )
        .bind(money_to_text(settings.usdt_per_trade))
        .bind(money_to_text(settings.risk_per_trade))
        .bind(money_to_text(settings.stop_loss_pct))
        .bind(money_to_text(settings.take_profit_pct))
        .bind(settings.max_positions)
        .bind(api_key)
        .bind(api_secret)
        .bind(match settings.environment { Environment::Mainnet => "mainnet" })
        .bind(bool_to_int(settings.spot_paper_trading))
        .bind(bool_to_int(settings.leverage_paper_trading))
        .bind(settings.indicators.rsi_period as i64)
        .bind(money_to_text(settings.indicators.rsi_low))
        .bind(money_to_text(settings.indicators.rsi_high))
        .bind(settings.indicators.ema_fast as i64)
        .bind(settings.indicators.ema_slow as i64)
        .bind(settings.indicators.macd_signal as i64)
        .bind(settings.indicators.adx_period as i64)
        .bind(serde_json::to_string(&settings.spot_strategies).unwrap())
        .bind(serde_json::to_string(&settings.leverage_strategies).unwrap())
        .bind(bool_to_int(settings.spot_ai_trading))
        .bind(bool_to_int(settings.leverage_ai_trading))
        .bind(settings.timeframe.as_str())
        .bind(money_to_text(settings.min_confidence))
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn get_position(&self, id: &str) -> Result<Option<Position>, EngineError> {
        let row = sqlx::query("SELECT * FROM positions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        row.as_ref().map(Self::row_to_position).transpose()
    }

    async fn get_open_positions(
        &self,
        user_id: &str,
        trading_mode: Option<TradingMode>,
        is_paper_trade: Option<bool>,
    ) -> Result<Vec<Position>, EngineError> {
        let mut sql = String::from("SELECT * FROM positions WHERE user_id = ? AND status = 'open'");
        if trading_mode.is_some() {
            sql.push_str(" AND trading_mode = ?");
        }
        if is_paper_trade.is_some() {
            sql.push_str(" AND is_paper_trade = ?");
        }
        let mut query = sqlx::query(&sql).bind(user_id);
        if let Some(mode) = trading_mode {
            query = query.bind(mode.as_str());
        }
        if let Some(paper) = is_paper_trade {
            query = query.bind(bool_to_int(paper));
        }
        let rows = query.fetch_all(&self.pool).await.map_err(storage_err)?;
        rows.iter().map(Self::row_to_position).collect()
    }

    async fn create_position(
        &self,
        user_id: &str,
        symbol: &str,
        direction: Direction,
        entry_price: f64,
        quantity: f64,
        stop_loss: Option<f64>,
        take_profit: Option<f64>,
        trading_mode: TradingMode,
        strategy: &str,
        is_paper_trade: bool,
        exchange_order_id: Option<String>,
    ) -> Result<Position, EngineError> {
        if !direction.compatible_with(trading_mode) {
            return Err(EngineError::ValidationError(format!(
                "direction {direction} incompatible with trading mode {trading_mode}"
            )));
        }
        let mut tx = self.pool.begin().await.map_err(storage_err)?;
        let existing: i64 = sqlx::query(
            "SELECT COUNT(*) as n FROM positions WHERE user_id = ? AND symbol = ? AND trading_mode = ? AND status = 'open'",
        )
        .bind(user_id)
        .bind(symbol)
        .bind(trading_mode.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(storage_err)?
        .try_get("n")
        .map_err(storage_err)?;
        if existing > 0 {
            return Err(EngineError::ValidationError(format!(
                "an open {trading_mode} position already exists for {symbol}"
            )));
        }
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now();
        sqlx::query(
            "INSERT INTO positions (id, user_id, symbol, direction, entry_price, current_price, stop_loss, \
             take_profit, quantity, pnl, status, trading_mode, strategy, is_paper_trade, exchange_order_id, \
             created_at, closed_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'open', ?, ?, ?, ?, ?, NULL)",
        )
        .bind(&id)
        .bind(user_id)
        .bind(symbol)
        .bind(direction.as_str())
        .bind(money_to_text(entry_price))
        .bind(money_to_text(entry_price))
        .bind(stop_loss.map(money_to_text))
        .bind(take_profit.map(money_to_text))
        .bind(money_to_text(quantity))
        .bind(money_to_text(0.0))
        .bind(trading_mode.as_str())
        .bind(strategy)
        .bind(bool_to_int(is_paper_trade))
        .bind(&exchange_order_id)
        .bind(created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(storage_err)?;
        tx.commit().await.map_err(storage_err)?;
        Ok(Position {
            id,
            user_id: user_id.to_string(),
            symbol: symbol.to_string(),
            direction,
            entry_price,
            current_price: entry_price,
            stop_loss,
            take_profit,
            quantity,
            pnl: 0.0,
            status: PositionStatus::Open,
            trading_mode,
            strategy: strategy.to_string(),
            is_paper_trade,
            exchange_order_id,
            created_at,
            closed_at: None,
        })
    }

    async fn update_position(&self, id: &str, patch: PositionPatch) -> Result<Position, EngineError> {
        let current = self
            .get_position(id)
            .await?
            .ok_or_else(|| EngineError::StorageError(format!("position {id} not found")))?;
        let current_price = patch.current_price.unwrap_or(current.current_price);
        let pnl = patch.pnl.unwrap_or(current.pnl);
        let stop_loss = patch.stop_loss.or(current.stop_loss);
        let take_profit = patch.take_profit.or(current.take_profit);
        sqlx::query("UPDATE positions SET current_price = ?, pnl = ?, stop_loss = ?, take_profit = ? WHERE id = ?")
            .bind(money_to_text(current_price))
            .bind(money_to_text(pnl))
            .bind(stop_loss.map(money_to_text))
            .bind(take_profit.map(money_to_text))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(Position { current_price, pnl, stop_loss, take_profit, ..current })
    }

    async fn close_position(&self, id: &str, exit_price: f64, pnl: f64) -> Result<Position, EngineError> {
        let current = self
            .get_position(id)
            .await?
            .ok_or_else(|| EngineError::StorageError(format!("position {id} not found")))?;
        if current.status == PositionStatus::Closed {
            return Err(EngineError::AlreadyClosed);
        }
        let closed_at = Utc::now();
        sqlx::query("UPDATE positions SET status = 'closed', current_price = ?, pnl = ?, closed_at = ? WHERE id = ?")
            .bind(money_to_text(exit_price))
            .bind(money_to_text(pnl))
            .bind(closed_at.to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(Position {
            current_price: exit_price,
            pnl,
            status: PositionStatus::Closed,
            closed_at: Some(closed_at),
            ..current
        })
    }

    async fn create_trade(
        &self,
        position: &Position,
        exit_price: f64,
        pnl: f64,
        duration_minutes: i64,
    ) -> Result<Trade, EngineError> {
        let id = Uuid::new_v4().to_string();
        let exit_time = Utc::now();
        sqlx::query(
            "INSERT INTO trades (id, user_id, position_id, symbol, direction, entry_price, exit_price, quantity, \
             pnl, duration_minutes, strategy, trading_mode, is_paper_trade, entry_time, exit_time) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&position.user_id)
        .bind(&position.id)
        .bind(&position.symbol)
        .bind(position.direction.as_str())
        .bind(money_to_text(position.entry_price))
        .bind(money_to_text(exit_price))
        .bind(money_to_text(position.quantity))
        .bind(money_to_text(pnl))
        .bind(duration_minutes)
        .bind(&position.strategy)
        .bind(position.trading_mode.as_str())
        .bind(bool_to_int(position.is_paper_trade))
        .bind(position.created_at.to_rfc3339())
        .bind(exit_time.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(Trade {
            id,
            user_id: position.user_id.clone(),
            position_id: position.id.clone(),
            symbol: position.symbol.clone(),
            direction: position.direction,
            entry_price: position.entry_price,
            exit_price,
            quantity: position.quantity,
            pnl,
            duration_minutes,
            strategy: position.strategy.clone(),
            trading_mode: position.trading_mode,
            is_paper_trade: position.is_paper_trade,
            entry_time: position.created_at,
            exit_time,
        })
    }

    async fn get_trade_history(&self, user_id: &str, is_paper_trade: Option<bool>, limit: i64) -> Result<Vec<Trade>, EngineError> {
        let mut sql = String::from("SELECT * FROM trades WHERE user_id = ?");
        if is_paper_trade.is_some() {
            sql.push_str(" AND is_paper_trade = ?");
        }
        sql.push_str(" ORDER BY exit_time DESC LIMIT ?");
        let mut query = sqlx::query(&sql).bind(user_id);
        if let Some(paper) = is_paper_trade {
            query = query.bind(bool_to_int(paper));
        }
        query = query.bind(limit);
        let rows = query.fetch_all(&self.pool).await.map_err(storage_err)?;
        rows.iter().map(Self::row_to_trade).collect()
    }

    async fn create_bot_log(
        &self,
        user_id: &str,
        level: BotLogLevel,
        message: &str,
        symbol: Option<&str>,
        data: Option<serde_json::Value>,
    ) -> Result<BotLog, EngineError> {
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now();
        let data_text = data.as_ref().map(|d| d.to_string());
        sqlx::query("INSERT INTO bot_logs (id, user_id, level, message, symbol, data, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)")
            .bind(&id)
            .bind(user_id)
            .bind(level.as_str())
            .bind(message)
            .bind(symbol)
            .bind(&data_text)
            .bind(created_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(BotLog {
            id,
            user_id: user_id.to_string(),
            level,
            message: message.to_string(),
            symbol: symbol.map(str::to_string),
            data,
            created_at,
        })
    }

    async fn get_bot_logs(&self, user_id: &str, limit: i64) -> Result<Vec<BotLog>, EngineError> {
        let rows = sqlx::query("SELECT * FROM bot_logs WHERE user_id = ? ORDER BY created_at DESC LIMIT ?")
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        rows.iter().map(Self::row_to_bot_log).collect()
    }

    async fn clear_bot_logs(&self, user_id: &str) -> Result<(), EngineError> {
        sqlx::query("DELETE FROM bot_logs WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn create_system_error(
        &self,
        user_id: &str,
        title: &str,
        source: &str,
        error_code: Option<&str>,
        message: &str,
    ) -> Result<SystemError, EngineError> {
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now();
        sqlx::query(
            "INSERT INTO system_errors (id, user_id, title, source, error_code, message, resolved, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, 0, ?)",
        )
        .bind(&id)
        .bind(user_id)
        .bind(title)
        .bind(source)
        .bind(error_code)
        .bind(message)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(SystemError {
            id,
            user_id: user_id.to_string(),
            title: title.to_string(),
            source: source.to_string(),
            error_code: error_code.map(str::to_string),
            message: message.to_string(),
            resolved: false,
            created_at,
        })
    }

    async fn get_system_errors(&self, user_id: &str, unresolved_only: bool) -> Result<Vec<SystemError>, EngineError> {
        let sql = if unresolved_only {
            "SELECT * FROM system_errors WHERE user_id = ? AND resolved = 0 ORDER BY created_at DESC"
        } else {
            "SELECT * FROM system_errors WHERE user_id = ? ORDER BY created_at DESC"
        };
        let rows = sqlx::query(sql).bind(user_id).fetch_all(&self.pool).await.map_err(storage_err)?;
        rows.iter().map(Self::row_to_system_error).collect()
    }

    async fn resolve_system_error(&self, id: &str) -> Result<(), EngineError> {
        sqlx::query("UPDATE system_errors SET resolved = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn upsert_market_data(&self, data: &MarketDataCache) -> Result<(), EngineError> {
        sqlx::query(
            "INSERT INTO market_data (symbol, price, volume_24h, change_24h, updated_at) VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(symbol) DO UPDATE SET price = excluded.price, volume_24h = excluded.volume_24h, \
             change_24h = excluded.change_24h, updated_at = excluded.updated_at",
        )
        .bind(&data.symbol)
        .bind(money_to_text(data.price))
        .bind(money_to_text(data.volume_24h))
        .bind(money_to_text(data.change_24h))
        .bind(data.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn get_market_data(&self, symbol: &str) -> Result<Option<MarketDataCache>, EngineError> {
        let row = sqlx::query("SELECT * FROM market_data WHERE symbol = ?")
            .bind(symbol)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        row.map(|r| {
            Ok(MarketDataCache {
                symbol: r.try_get("symbol").map_err(storage_err)?,
                price: text_to_money(&r.try_get::<String, _>("price").map_err(storage_err)?),
                volume_24h: text_to_money(&r.try_get::<String, _>("volume_24h").map_err(storage_err)?),
                change_24h: text_to_money(&r.try_get::<String, _>("change_24h").map_err(storage_err)?),
                updated_at: parse_ts(r.try_get::<String, _>("updated_at").map_err(storage_err)?)?,
            })
        })
        .transpose()
    }

    async fn get_trading_stats(&self, user_id: &str, is_paper_trade: Option<bool>) -> Result<TradingStats, EngineError> {
        let trades = self.get_trade_history(user_id, is_paper_trade, i64::MAX).await?;
        let total_trades = trades.len() as i64;
        let winning_trades = trades.iter().filter(|t| t.pnl > 0.0).count() as i64;
        let losing_trades = total_trades - winning_trades;
        let total_pnl: f64 = trades.iter().map(|t| t.pnl).sum();
        let win_rate = if total_trades > 0 { winning_trades as f64 / total_trades as f64 * 100.0 } else { 0.0 };
        Ok(TradingStats { total_trades, winning_trades, losing_trades, total_pnl, win_rate })
    }

    async fn get_trading_summary(&self, user_id: &str) -> Result<TradingSummary, EngineError> {
        let open = self.get_open_positions(user_id, None, None).await?;
        let closed_count: i64 = sqlx::query("SELECT COUNT(*) as n FROM positions WHERE user_id = ? AND status = 'closed'")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?
            .try_get("n")
            .map_err(storage_err)?;
        let trades = self.get_trade_history(user_id, None, i64::MAX).await?;
        let realized_pnl: f64 = trades.iter().map(|t| t.pnl).sum();
        let unrealized_pnl: f64 = open.iter().map(|p| p.pnl).sum();
        Ok(TradingSummary { open_positions: open.len() as i64, closed_positions: closed_count, realized_pnl, unrealized_pnl })
    }

    async fn get_strategy_performance(&self, user_id: &str) -> Result<Vec<StrategyPerformance>, EngineError> {
        let trades = self.get_trade_history(user_id, None, i64::MAX).await?;
        let mut by_strategy: HashMap<String, Vec<&Trade>> = HashMap::new();
        for trade in &trades {
            by_strategy.entry(trade.strategy.clone()).or_default().push(trade);
        }
        let mut out: Vec<StrategyPerformance> = by_strategy
            .into_iter()
            .map(|(strategy, trades)| {
                let n = trades.len() as i64;
                let wins = trades.iter().filter(|t| t.pnl > 0.0).count() as i64;
                let total_pnl: f64 = trades.iter().map(|t| t.pnl).sum();
                StrategyPerformance {
                    strategy,
                    trades: n,
                    win_rate: if n > 0 { wins as f64 / n as f64 * 100.0 } else { 0.0 },
                    total_pnl,
                }
            })
            .collect();
        out.sort_by(|a, b| a.strategy.cmp(&b.strategy));
        Ok(out)
    }

    async fn get_portfolio_data(&self, user_id: &str) -> Result<PortfolioData, EngineError> {
        let summary = self.get_trading_summary(user_id).await?;
        let open = self.get_open_positions(user_id, None, None).await?;
        let total_equity = open.iter().map(|p| p.current_price * p.quantity).sum::<f64>() + summary.realized_pnl;
        Ok(PortfolioData {
            total_equity,
            total_realized_pnl: summary.realized_pnl,
            total_unrealized_pnl: summary.unrealized_pnl,
            open_position_count: open.len() as i64,
        })
    }
}

fn default_toggles() -> HashMap<StrategyKind, bool> {
    StrategyKind::priority_order().into_iter().map(|k| (k, true)).collect()
}

fn row_to_settings(row: &SqliteRow) -> Result<TradingSettings, EngineError> {
    let spot_strategies: String = row.try_get("spot_strategies").map_err(storage_err)?;
    let leverage_strategies: String = row.try_get("leverage_strategies").map_err(storage_err)?;
    let api_key: Option<String> = row.try_get("api_key").map_err(storage_err)?;
    let api_secret: Option<String> = row.try_get("api_secret").map_err(storage_err)?;
    let credentials = match (api_key, api_secret) {
        (Some(k), Some(s)) if !k.is_empty() => Some(crate::config::ExchangeCredentials { api_key: k, api_secret: s }),
        _ => None,
    };
    let timeframe_s: String = row.try_get("timeframe").map_err(storage_err)?;
    Ok(TradingSettings {
        usdt_per_trade: text_to_money(&row.try_get::<String, _>("usdt_per_trade").map_err(storage_err)?),
        risk_per_trade: text_to_money(&row.try_get::<String, _>("risk_per_trade").map_err(storage_err)?),
        stop_loss_pct: text_to_money(&row.try_get::<String, _>("stop_loss_pct").map_err(storage_err)?),
        take_profit_pct: text_to_money(&row.try_get::<String, _>("take_profit_pct").map_err(storage_err)?),
        max_positions: row.try_get("max_positions").map_err(storage_err)?,
        credentials,
        environment: Environment::Mainnet,
        spot_paper_trading: row.try_get::<i64, _>("spot_paper_trading").map_err(storage_err)? != 0,
        leverage_paper_trading: row.try_get::<i64, _>("leverage_paper_trading").map_err(storage_err)? != 0,
        indicators: IndicatorParams {
            rsi_period: row.try_get::<i64, _>("rsi_period").map_err(storage_err)? as u32,
            rsi_low: text_to_money(&row.try_get::<String, _>("rsi_low").map_err(storage_err)?),
            rsi_high: text_to_money(&row.try_get::<String, _>("rsi_high").map_err(storage_err)?),
            ema_fast: row.try_get::<i64, _>("ema_fast").map_err(storage_err)? as u32,
            ema_slow: row.try_get::<i64, _>("ema_slow").map_err(storage_err)? as u32,
            macd_signal: row.try_get::<i64, _>("macd_signal").map_err(storage_err)? as u32,
            adx_period: row.try_get::<i64, _>("adx_period").map_err(storage_err)? as u32,
        },
        spot_strategies: serde_json::from_str(&spot_strategies).unwrap_or_else(|_| default_toggles()),
        leverage_strategies: serde_json::from_str(&leverage_strategies).unwrap_or_else(|_| default_toggles()),
        spot_ai_trading: row.try_get::<i64, _>("spot_ai_trading").map_err(storage_err)? != 0,
        leverage_ai_trading: row.try_get::<i64, _>("leverage_ai_trading").map_err(storage_err)? != 0,
        timeframe: Timeframe::parse(&timeframe_s).unwrap_or_default(),
        min_confidence: text_to_money(&row.try_get::<String, _>("min_confidence").map_err(storage_err)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn settings_created_lazily_with_defaults() {
        let store = memory_store().await;
        let user = store.create_user("alice", "hash").await.unwrap();
        let settings = store.get_trading_settings(&user.id).await.unwrap();
        assert_eq!(settings.max_positions, 3);
        assert!(settings.validate().is_ok());
    }

    #[tokio::test]
    async fn duplicate_open_position_rejected() {
        let store = memory_store().await;
        let user = store.create_user("bob", "hash").await.unwrap();
        store
            .create_position(&user.id, "BTCUSDT", Direction::Up, 50000.0, 0.01, None, None, TradingMode::Spot, "trendFollowing", true, None)
            .await
            .unwrap();
        let second = store
            .create_position(&user.id, "BTCUSDT", Direction::Up, 51000.0, 0.01, None, None, TradingMode::Spot, "breakoutTrading", true, None)
            .await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn close_position_is_idempotent() {
        let store = memory_store().await;
        let user = store.create_user("carol", "hash").await.unwrap();
        let pos = store
            .create_position(&user.id, "ETHUSDT", Direction::Long, 3000.0, 1.0, None, None, TradingMode::Leverage, "pullbackTrading", true, None)
            .await
            .unwrap();
        store.close_position(&pos.id, 3100.0, 100.0).await.unwrap();
        let second = store.close_position(&pos.id, 3200.0, 200.0).await;
        assert!(matches!(second, Err(EngineError::AlreadyClosed)));
        let reloaded = store.get_position(&pos.id).await.unwrap().unwrap();
        assert_eq!(reloaded.pnl, 100.0);
    }

    #[tokio::test]
    async fn direction_mode_mismatch_rejected() {
        let store = memory_store().await;
        let user = store.create_user("dave", "hash").await.unwrap();
        let result = store
            .create_position(&user.id, "BTCUSDT", Direction::Short, 50000.0, 0.01, None, None, TradingMode::Spot, "trendFollowing", true, None)
            .await;
        assert!(result.is_err());
    }
}
