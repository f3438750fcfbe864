// =============================================================================
// Strategy Evaluator
// =============================================================================
//
// Each strategy is a pure function: indicator snapshot + price + settings in,
// zero or more `Signal`s out. A strategy needing a missing indicator field
// simply does not fire for the cycle — it never errors.

use crate::config::{IndicatorParams, TradingSettings};
use crate::indicators::IndicatorSnapshot;
use crate::types::{Direction, StrategyKind};

use super::Signal;

/// Runs every strategy enabled in `settings` for `mode` and collects every
/// signal at or above `settings.min_confidence`.
pub fn evaluate(
    symbol: &str,
    price: f64,
    snapshot: &IndicatorSnapshot,
    settings: &TradingSettings,
    mode: crate::types::TradingMode,
) -> Vec<Signal> {
    let mut signals = Vec::new();

    for strategy in StrategyKind::priority_order() {
        if !settings.is_strategy_enabled(mode, strategy) {
            continue;
        }
        let candidates = match strategy {
            StrategyKind::TrendFollowing => trend_following(symbol, price, snapshot, settings),
            StrategyKind::MeanReversion => mean_reversion(symbol, price, snapshot, settings),
            StrategyKind::BreakoutTrading => breakout(symbol, price, snapshot, settings),
            StrategyKind::PullbackTrading => pullback(symbol, price, snapshot, settings),
        };
        for signal in candidates {
            if signal.confidence >= settings.min_confidence {
                signals.push(signal);
            }
        }
    }

    signals
}

fn rsi_healthy_band(rsi: f64, params: &IndicatorParams) -> bool {
    rsi > params.rsi_low && rsi < params.rsi_high
}

fn sl_tp_for_direction(price: f64, direction: Direction, settings: &TradingSettings) -> (f64, f64) {
    let sl_frac = settings.stop_loss_pct / 100.0;
    let tp_frac = settings.take_profit_pct / 100.0;
    match direction {
        Direction::Long | Direction::Up => (price * (1.0 - sl_frac), price * (1.0 + tp_frac)),
        Direction::Short => (price * (1.0 + sl_frac), price * (1.0 - tp_frac)),
    }
}

fn trend_following(symbol: &str, price: f64, snap: &IndicatorSnapshot, settings: &TradingSettings) -> Vec<Signal> {
    let (Some(adx), Some(ema_fast), Some(ema_slow), Some(macd)) = (snap.adx, snap.ema_fast, snap.ema_slow, snap.macd) else {
        return Vec::new();
    };
    let params = &settings.indicators;
    let mut out = Vec::new();

    if adx > 25.0 && ema_fast > ema_slow && macd.macd > macd.signal {
        let bonus = if snap.rsi.map(|r| rsi_healthy_band(r, params)).unwrap_or(false) { 10.0 } else { 0.0 };
        let confidence = 60.0 + (adx - 25.0).min(30.0) + bonus;
        let (sl, tp) = sl_tp_for_direction(price, Direction::Long, settings);
        out.push(Signal { symbol: symbol.into(), direction: Direction::Long, confidence, strategy: StrategyKind::TrendFollowing, entry_price: price, stop_loss: sl, take_profit: tp });
    }
    if adx > 25.0 && ema_fast < ema_slow && macd.macd < macd.signal {
        let bonus = if snap.rsi.map(|r| rsi_healthy_band(r, params)).unwrap_or(false) { 10.0 } else { 0.0 };
        let confidence = 60.0 + (adx - 25.0).min(30.0) + bonus;
        let (sl, tp) = sl_tp_for_direction(price, Direction::Short, settings);
        out.push(Signal { symbol: symbol.into(), direction: Direction::Short, confidence, strategy: StrategyKind::TrendFollowing, entry_price: price, stop_loss: sl, take_profit: tp });
    }
    out
}

fn mean_reversion(symbol: &str, price: f64, snap: &IndicatorSnapshot, settings: &TradingSettings) -> Vec<Signal> {
    let (Some(rsi), Some(bb)) = (snap.rsi, &snap.bollinger) else {
        return Vec::new();
    };
    let params = &settings.indicators;
    let mut out = Vec::new();

    if rsi < params.rsi_low && price < bb.lower {
        let confidence = (70.0 + 2.0 * (params.rsi_low - rsi).max(0.0)).min(95.0);
        let (sl, _) = sl_tp_for_direction(price, Direction::Long, settings);
        out.push(Signal { symbol: symbol.into(), direction: Direction::Long, confidence, strategy: StrategyKind::MeanReversion, entry_price: price, stop_loss: sl, take_profit: bb.middle });
    }
    if rsi > params.rsi_high && price > bb.upper {
        let confidence = (70.0 + 2.0 * (rsi - params.rsi_high).max(0.0)).min(95.0);
        let (sl, _) = sl_tp_for_direction(price, Direction::Short, settings);
        out.push(Signal { symbol: symbol.into(), direction: Direction::Short, confidence, strategy: StrategyKind::MeanReversion, entry_price: price, stop_loss: sl, take_profit: bb.middle });
    }
    out
}

fn breakout(symbol: &str, price: f64, snap: &IndicatorSnapshot, settings: &TradingSettings) -> Vec<Signal> {
    let (Some(adx), Some(bb)) = (snap.adx, &snap.bollinger) else {
        return Vec::new();
    };
    let mut out = Vec::new();

    if price > bb.upper && adx > 20.0 {
        let confidence = (75.0 + (adx - 20.0).min(20.0)).min(95.0);
        let (_, tp) = sl_tp_for_direction(price, Direction::Long, settings);
        out.push(Signal { symbol: symbol.into(), direction: Direction::Long, confidence, strategy: StrategyKind::BreakoutTrading, entry_price: price, stop_loss: bb.middle, take_profit: tp });
    }
    if price < bb.lower && adx > 20.0 {
        let confidence = (75.0 + (adx - 20.0).min(20.0)).min(95.0);
        let (_, tp) = sl_tp_for_direction(price, Direction::Short, settings);
        out.push(Signal { symbol: symbol.into(), direction: Direction::Short, confidence, strategy: StrategyKind::BreakoutTrading, entry_price: price, stop_loss: bb.middle, take_profit: tp });
    }
    out
}

fn pullback(symbol: &str, price: f64, snap: &IndicatorSnapshot, settings: &TradingSettings) -> Vec<Signal> {
    let (Some(ema_fast), Some(ema_slow), Some(rsi), Some(macd)) = (snap.ema_fast, snap.ema_slow, snap.rsi, snap.macd) else {
        return Vec::new();
    };
    let mut out = Vec::new();

    if ema_fast > ema_slow && rsi > 40.0 && rsi < 60.0 && macd.histogram > 0.0 {
        let confidence = (65.0 + 0.5 * (60.0 - (rsi - 50.0).abs())).min(90.0);
        let (sl, tp) = sl_tp_for_direction(price, Direction::Long, settings);
        out.push(Signal { symbol: symbol.into(), direction: Direction::Long, confidence, strategy: StrategyKind::PullbackTrading, entry_price: price, stop_loss: sl, take_profit: tp });
    }
    if ema_fast < ema_slow && rsi > 40.0 && rsi < 60.0 && macd.histogram < 0.0 {
        let confidence = (65.0 + 0.5 * (60.0 - (rsi - 50.0).abs())).min(90.0);
        let (sl, tp) = sl_tp_for_direction(price, Direction::Short, settings);
        out.push(Signal { symbol: symbol.into(), direction: Direction::Short, confidence, strategy: StrategyKind::PullbackTrading, entry_price: price, stop_loss: sl, take_profit: tp });
    }
    out
}
