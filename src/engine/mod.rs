// =============================================================================
// Bot Engine — instantiated twice (Spot, Leverage)
// =============================================================================
//
// Drives one full scan → signal → trade cycle per interval for its
// configured mode. Self-scheduling: the next cycle is posted only after the
// current one completes, not on a fixed timer, so a slow cycle never causes
// re-entrant overlap.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tracing::{error, warn};

use crate::advisor::{Advisor, MarketSnapshot, TechnicalSnapshot};
use crate::config::TradingSettings;
use crate::error::EngineError;
use crate::events::{EngineAlert, EngineEvent, EventBus};
use crate::exchange::BybitClient;
use crate::indicators::IndicatorSnapshot;
use crate::market_data::{candle, MarketDataService};
use crate::pnl;
use crate::store::Store;
use crate::strategy::{evaluator, Signal};
use crate::types::{BotLogLevel, BotState, Direction, OrderType, TradingMode};

/// Full-universe scan interval: spec.md §4.7 adopts the 30-minute reading.
const CYCLE_INTERVAL: Duration = Duration::from_secs(30 * 60);
/// How many of the registered USDT pairs are watched each cycle.
const WATCHED_SYMBOL_COUNT: usize = 15;
const MIN_CANDLES: usize = 50;
const CANDLE_FETCH_LIMIT: u32 = 100;

/// Number of consecutive cycle-level failures before the bot degrades rather
/// than stopping outright.
const DEGRADE_THRESHOLD: u32 = 3;

/// Live-position SL/TP check cadence, independent of the scan cycle and of
/// the paper-only Position Monitor's own 30s cadence.
const LIVE_SLTP_INTERVAL: Duration = Duration::from_secs(10);

pub struct BotEngine {
    pub mode: TradingMode,
    user_id: String,
    store: Arc<dyn Store>,
    market_data: Arc<MarketDataService>,
    exchange: Arc<BybitClient>,
    event_bus: Arc<EventBus>,
    advisor: Option<Arc<dyn Advisor>>,
    state: Mutex<BotState>,
    consecutive_failures: Mutex<u32>,
    cancel_tx: watch::Sender<bool>,
    cancel_rx: watch::Receiver<bool>,
}

impl BotEngine {
    pub fn new(
        mode: TradingMode,
        user_id: impl Into<String>,
        store: Arc<dyn Store>,
        market_data: Arc<MarketDataService>,
        exchange: Arc<BybitClient>,
        event_bus: Arc<EventBus>,
        advisor: Option<Arc<dyn Advisor>>,
    ) -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        Self {
            mode,
            user_id: user_id.into(),
            store,
            market_data,
            exchange,
            event_bus,
            advisor,
            state: Mutex::new(BotState::Stopped),
            consecutive_failures: Mutex::new(0),
            cancel_tx,
            cancel_rx,
        }
    }

    pub fn state(&self) -> BotState {
        *self.state.lock()
    }

    /// `start` while not `Stopped` fails with `AlreadyRunning`; live-mode
    /// engines fail fast with `CredentialsMissing` if no exchange key is
    /// configured.
    pub async fn start(self: &Arc<Self>) -> Result<(), EngineError> {
        {
            let mut state = self.state.lock();
            if *state != BotState::Stopped {
                return Err(EngineError::AlreadyRunning);
            }
            *state = BotState::Starting;
        }

        let settings = match self.store.get_trading_settings(&self.user_id).await {
            Ok(s) => s,
            Err(e) => {
                *self.state.lock() = BotState::Stopped;
                return Err(e);
            }
        };

        if !settings.paper_trading_for(self.mode) && !self.exchange.has_credentials() {
            *self.state.lock() = BotState::Stopped;
            return Err(EngineError::CredentialsMissing(self.mode.to_string()));
        }

        self.cancel_tx.send(false).ok();
        *self.consecutive_failures.lock() = 0;
        *self.state.lock() = BotState::Running;
        self.event_bus.publish_event(crate::events::EngineEvent::BotStatusUpdate { trading_mode: self.mode, state: BotState::Running });

        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.run_loop().await });

        let sltp_engine = Arc::clone(self);
        tokio::spawn(async move { sltp_engine.live_sltp_loop().await });

        Ok(())
    }

    /// `stop` while `Stopped` is a no-op.
    pub async fn stop(&self) {
        {
            let mut state = self.state.lock();
            if *state == BotState::Stopped {
                return;
            }
            *state = BotState::Stopping;
        }
        self.cancel_tx.send(true).ok();
    }

    fn is_cancelled(&self) -> bool {
        *self.cancel_rx.borrow()
    }

    async fn run_loop(self: Arc<Self>) {
        loop {
            if self.is_cancelled() {
                break;
            }

            if let Err(e) = self.run_cycle().await {
                error!(mode = %self.mode, error = %e, "scan cycle failed");
                let mut failures = self.consecutive_failures.lock();
                *failures += 1;
                if *failures >= DEGRADE_THRESHOLD && self.state() == BotState::Running {
                    *self.state.lock() = BotState::Degraded;
                    self.event_bus.publish_alert(EngineAlert::new("cycle_failure", format!("{}-engine", self.mode), e.to_string()).with_code(e.code()));
                    self.event_bus.publish_event(crate::events::EngineEvent::BotStatusUpdate { trading_mode: self.mode, state: BotState::Degraded });
                }
            } else {
                let mut failures = self.consecutive_failures.lock();
                if *failures > 0 {
                    *failures = 0;
                    if self.state() == BotState::Degraded {
                        *self.state.lock() = BotState::Running;
                        self.event_bus.publish_event(crate::events::EngineEvent::BotStatusUpdate { trading_mode: self.mode, state: BotState::Running });
                    }
                }
            }

            if self.is_cancelled() {
                break;
            }

            let mut rx = self.cancel_rx.clone();
            tokio::select! {
                _ = tokio::time::sleep(CYCLE_INTERVAL) => {}
                _ = rx.changed() => {}
            }
        }

        *self.state.lock() = BotState::Stopped;
        self.event_bus.publish_event(crate::events::EngineEvent::BotStatusUpdate { trading_mode: self.mode, state: BotState::Stopped });
    }

    /// Ticker-driven SL/TP enforcement for this mode's live positions, run
    /// independently of the scan cycle. Prices accumulate from the shared
    /// event bus's `PriceUpdate` stream as they arrive; every
    /// `LIVE_SLTP_INTERVAL` the cached prices are checked against each open
    /// live position's stop loss / take profit.
    async fn live_sltp_loop(self: Arc<Self>) {
        let mut prices: HashMap<String, f64> = HashMap::new();
        let mut events_rx = self.event_bus.subscribe_events();
        let mut cancel_rx = self.cancel_rx.clone();
        let mut ticker = tokio::time::interval(LIVE_SLTP_INTERVAL);

        loop {
            tokio::select! {
                changed = cancel_rx.changed() => {
                    if changed.is_err() || *cancel_rx.borrow() {
                        break;
                    }
                }
                event = events_rx.recv() => {
                    match event {
                        Ok(EngineEvent::PriceUpdate { symbol, price }) => {
                            prices.insert(symbol, price);
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(_)) => {}
                        Err(RecvError::Closed) => break,
                    }
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.check_live_sltp(&prices).await {
                        warn!(mode = %self.mode, error = %e, "live SL/TP check failed");
                    }
                }
            }
        }
    }

    /// Closes any live (non-paper) position of this mode whose SL/TP has
    /// been crossed by its symbol's latest cached ticker price. Mirrors the
    /// Position Monitor's paper-position close path, but issues the opposing
    /// exchange order first since these are real positions.
    async fn check_live_sltp(&self, prices: &HashMap<String, f64>) -> Result<(), EngineError> {
        let positions = self.store.get_open_positions(&self.user_id, Some(self.mode), Some(false)).await?;

        for position in positions {
            let Some(&current_price) = prices.get(&position.symbol) else { continue };

            let should_close = match (position.direction, position.stop_loss, position.take_profit) {
                (Direction::Long | Direction::Up, Some(sl), Some(tp)) => current_price <= sl || current_price >= tp,
                (Direction::Short, Some(sl), Some(tp)) => current_price >= sl || current_price <= tp,
                _ => false,
            };
            if !should_close {
                continue;
            }

            self.exit_live_position(&position).await?;

            let pnl_value = pnl::compute_pnl(position.direction, position.entry_price, current_price, position.quantity);
            let closed = self.store.close_position(&position.id, current_price, pnl_value).await?;
            let duration_minutes = (closed.closed_at.unwrap_or_else(chrono::Utc::now) - closed.created_at).num_minutes();
            self.store.create_trade(&closed, current_price, pnl_value, duration_minutes).await?;

            let reason = match position.direction {
                Direction::Long | Direction::Up => {
                    if position.stop_loss.map(|sl| current_price <= sl).unwrap_or(false) { "Stop loss" } else { "Take profit" }
                }
                Direction::Short => {
                    if position.stop_loss.map(|sl| current_price >= sl).unwrap_or(false) { "Stop loss" } else { "Take profit" }
                }
            };

            self.event_bus.publish_event(EngineEvent::PositionClosed {
                position_id: closed.id.clone(),
                symbol: closed.symbol.clone(),
                exit_price: current_price,
                pnl: pnl_value,
                reason: reason.to_string(),
            });
            self.log(BotLogLevel::Trade, format!("live auto-closed {} @ {}", closed.symbol, current_price), Some(&closed.symbol)).await;
        }

        Ok(())
    }

    async fn log(&self, level: BotLogLevel, message: impl Into<String>, symbol: Option<&str>) {
        let message = message.into();
        self.event_bus.publish_event(crate::events::EngineEvent::BotLog { trading_mode: self.mode, level, message: message.clone() });
        if let Err(e) = self.store.create_bot_log(&self.user_id, level, &message, symbol, None).await {
            warn!(error = %e, "failed to persist bot log");
        }
    }

    /// One pass of (data fetch → indicators → strategies/advisor → admission
    /// → execution) across the watched symbol universe.
    async fn run_cycle(&self) -> Result<(), EngineError> {
        if self.is_cancelled() {
            return Ok(());
        }

        let settings = self.store.get_trading_settings(&self.user_id).await.map_err(|e| {
            warn!(error = %e, "failed to load settings, aborting cycle");
            e
        })?;

        let for_spot = self.mode == TradingMode::Spot;
        let symbols = self.market_data.get_top_trading_pairs(WATCHED_SYMBOL_COUNT);
        self.log(BotLogLevel::Scan, format!("scanning {} symbols", symbols.len()), None).await;

        let fetched = self.market_data.batch_fetch_ohlcv(&symbols, settings.timeframe, CANDLE_FETCH_LIMIT, for_spot).await;

        'symbols: for (symbol, candles) in fetched {
            if self.is_cancelled() {
                break;
            }
            if candles.len() < MIN_CANDLES {
                continue;
            }

            let closes = candle::closes(&candles);
            let snapshot = IndicatorSnapshot::compute(&closes, &candles, &settings.indicators);
            let current_price = candles.last().map(|c| c.close).unwrap_or(0.0);

            let candidates = if settings.ai_trading_for(self.mode) {
                match &self.advisor {
                    Some(advisor) => {
                        let market_snapshot = MarketSnapshot {
                            symbol: symbol.clone(),
                            current_price,
                            price_change_24h: 0.0,
                            volume_24h: 0.0,
                            high_24h: candles.iter().map(|c| c.high).fold(f64::MIN, f64::max),
                            low_24h: candles.iter().map(|c| c.low).fold(f64::MAX, f64::min),
                            timestamp: chrono::Utc::now(),
                        };
                        let technical_snapshot = TechnicalSnapshot {
                            indicators: (&snapshot).into(),
                            support: closes.iter().cloned().fold(None, |acc: Option<f64>, x| Some(acc.map_or(x, |a| a.min(x)))),
                            resistance: closes.iter().cloned().fold(None, |acc: Option<f64>, x| Some(acc.map_or(x, |a| a.max(x)))),
                        };
                        let response = advisor.advise(&market_snapshot, &technical_snapshot, self.mode).await;
                        crate::advisor::response_to_signal(&symbol, current_price, &response, self.mode, &settings).into_iter().collect::<Vec<_>>()
                    }
                    None => Vec::new(),
                }
            } else {
                evaluator::evaluate(&symbol, current_price, &snapshot, &settings, self.mode)
                    .into_iter()
                    .filter_map(|s| s.for_mode(self.mode))
                    .collect()
            };

            for signal in candidates {
                match self.try_admit(&signal, &settings).await {
                    Ok(true) => continue 'symbols,
                    Ok(false) => continue,
                    Err(e) => {
                        warn!(symbol = %symbol, error = %e, "admission error, skipping symbol");
                        continue 'symbols;
                    }
                }
            }
        }

        Ok(())
    }

    /// Admission gate + execution for a single candidate signal. Returns
    /// `Ok(true)` if a position was opened (caller should stop trying
    /// further signals/strategies for this symbol this cycle).
    ///
    /// `pub` so integration tests can drive admission directly against a
    /// paper-mode engine without faking exchange network calls.
    pub async fn try_admit(&self, signal: &Signal, settings: &TradingSettings) -> Result<bool, EngineError> {
        if signal.confidence < settings.min_confidence {
            return Ok(false);
        }

        let open_positions = self.store.get_open_positions(&self.user_id, Some(self.mode), None).await?;
        if open_positions.len() as i64 >= settings.max_positions {
            self.log(BotLogLevel::Info, format!("admission denied for {}: position cap reached", signal.symbol), Some(&signal.symbol)).await;
            return Ok(false);
        }
        if open_positions.iter().any(|p| p.symbol == signal.symbol) {
            return Ok(false);
        }

        let is_paper = settings.paper_trading_for(self.mode);

        if !is_paper {
            let balance = self.exchange.get_balance("USDT").await?;
            if balance < settings.usdt_per_trade {
                self.log(BotLogLevel::Info, format!("admission denied for {}: insufficient balance", signal.symbol), Some(&signal.symbol)).await;
                return Ok(false);
            }
        }

        let quantity = round6(settings.usdt_per_trade / signal.entry_price);

        let exchange_order_id = if is_paper {
            None
        } else {
            let category = self.mode.category();
            match self
                .exchange
                .place_order(category, &signal.symbol, signal.direction.opening_side(), OrderType::Market, quantity, None)
                .await
            {
                Ok(order) => {
                    if !order.status.is_confirmed_filled() {
                        warn!(symbol = %signal.symbol, status = ?order.status, "order placed but fill not confirmed by exchange response");
                    }
                    Some(order.order_id)
                }
                Err(e) => {
                    self.log(BotLogLevel::Error, format!("order rejected for {}: {e}", signal.symbol), Some(&signal.symbol)).await;
                    return Ok(false);
                }
            }
        };

        let position = self
            .store
            .create_position(
                &self.user_id,
                &signal.symbol,
                signal.direction,
                signal.entry_price,
                quantity,
                Some(signal.stop_loss),
                Some(signal.take_profit),
                self.mode,
                signal.strategy.label(),
                is_paper,
                exchange_order_id,
            )
            .await?;

        self.event_bus.publish_event(crate::events::EngineEvent::PositionUpdate {
            position_id: position.id.clone(),
            symbol: position.symbol.clone(),
            current_price: position.current_price,
            pnl: position.pnl,
        });
        self.log(
            BotLogLevel::Trade,
            format!("opened {} {} @ {}", signal.direction.as_str(), signal.symbol, signal.entry_price),
            Some(&signal.symbol),
        )
        .await;

        Ok(true)
    }
}

impl BotEngine {
    /// Issues the opposing-side exchange order for a live position before
    /// the caller persists its close; a no-op for paper positions.
    pub async fn exit_live_position(&self, position: &crate::store::models::Position) -> Result<(), EngineError> {
        if position.is_paper_trade {
            return Ok(());
        }
        let category = self.mode.category();
        self.exchange
            .place_order(category, &position.symbol, position.direction.closing_side(), OrderType::Market, position.quantity, None)
            .await?;
        Ok(())
    }
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round6_truncates_to_six_decimals() {
        assert_eq!(round6(100.0 / 20000.0), 0.005);
        assert_eq!(round6(200.0 / 1000.0), 0.2);
    }
}
