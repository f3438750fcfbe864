// =============================================================================
// AI Advisor
// =============================================================================
//
// Optional, per-bot. When enabled, a bot replaces per-symbol strategy
// evaluation with an advisory call; on any malformed response or timeout the
// advisor degrades to a deterministic rule-based fallback so it can never
// abort the bot's hot path.

pub mod llm_advisor;
pub mod rule_based;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::indicators::IndicatorSnapshot;
use crate::strategy::Signal;
use crate::types::TradingMode;

pub const ADVISOR_TIMEOUT: Duration = Duration::from_secs(8);

/// Market snapshot handed to the advisor alongside the technical snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    pub symbol: String,
    pub current_price: f64,
    pub price_change_24h: f64,
    pub volume_24h: f64,
    pub high_24h: f64,
    pub low_24h: f64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Indicators plus support/resistance computed over the last 50 candles.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalSnapshot {
    pub indicators: IndicatorSnapshotView,
    pub support: Option<f64>,
    pub resistance: Option<f64>,
}

/// Plain-data mirror of `IndicatorSnapshot` suitable for serializing to the
/// advisor; the indicator module's own type is not `Serialize` because it
/// carries nested indicator-specific result structs used only internally.
#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorSnapshotView {
    pub rsi: Option<f64>,
    pub ema_fast: Option<f64>,
    pub ema_slow: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub adx: Option<f64>,
    pub bollinger_upper: Option<f64>,
    pub bollinger_middle: Option<f64>,
    pub bollinger_lower: Option<f64>,
}

impl From<&IndicatorSnapshot> for IndicatorSnapshotView {
    fn from(snap: &IndicatorSnapshot) -> Self {
        Self {
            rsi: snap.rsi,
            ema_fast: snap.ema_fast,
            ema_slow: snap.ema_slow,
            macd: snap.macd.map(|m| m.macd),
            macd_signal: snap.macd.map(|m| m.signal),
            adx: snap.adx,
            bollinger_upper: snap.bollinger.as_ref().map(|b| b.upper),
            bollinger_middle: snap.bollinger.as_ref().map(|b| b.middle),
            bollinger_lower: snap.bollinger.as_ref().map(|b| b.lower),
        }
    }
}

/// The advisor's recommended action. `Hold` never produces a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Structured advisor response, parsed by named fields. A response missing
/// any required field is treated as malformed and never reaches a bot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorResponse {
    pub action: Action,
    pub confidence: f64,
    pub risk: RiskLevel,
    pub entry: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub reasoning: String,
}

/// Implemented by both the LLM-backed advisor and the rule-based fallback so
/// a bot engine can treat them uniformly.
#[async_trait]
pub trait Advisor: Send + Sync {
    async fn advise(&self, market: &MarketSnapshot, technical: &TechnicalSnapshot, mode: TradingMode) -> AdvisorResponse;
}

/// Converts an advisor response into a `Signal`, applying the spot/leverage
/// action mapping: `BUY` → LONG/UP, `SELL` → SHORT for leverage or discarded
/// for spot, `HOLD` → no signal.
pub fn response_to_signal(
    symbol: &str,
    price: f64,
    response: &AdvisorResponse,
    mode: TradingMode,
    settings: &crate::config::TradingSettings,
) -> Option<Signal> {
    use crate::types::Direction;

    let direction = match (response.action, mode) {
        (Action::Buy, TradingMode::Spot) => Direction::Up,
        (Action::Buy, TradingMode::Leverage) => Direction::Long,
        (Action::Sell, TradingMode::Leverage) => Direction::Short,
        (Action::Sell, TradingMode::Spot) => return None,
        (Action::Hold, _) => return None,
    };

    let sl_frac = settings.stop_loss_pct / 100.0;
    let tp_frac = settings.take_profit_pct / 100.0;
    let (default_sl, default_tp) = match direction {
        Direction::Long | Direction::Up => (price * (1.0 - sl_frac), price * (1.0 + tp_frac)),
        Direction::Short => (price * (1.0 + sl_frac), price * (1.0 - tp_frac)),
    };

    Some(Signal {
        symbol: symbol.to_string(),
        direction,
        confidence: response.confidence,
        strategy: crate::types::StrategyKind::TrendFollowing,
        entry_price: response.entry.unwrap_or(price),
        stop_loss: response.stop_loss.unwrap_or(default_sl),
        take_profit: response.take_profit.unwrap_or(default_tp),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> crate::config::TradingSettings {
        crate::config::TradingSettings::default()
    }

    #[test]
    fn buy_maps_to_up_for_spot() {
        let response = AdvisorResponse {
            action: Action::Buy,
            confidence: 80.0,
            risk: RiskLevel::Low,
            entry: None,
            stop_loss: None,
            take_profit: None,
            reasoning: "test".into(),
        };
        let signal = response_to_signal("BTCUSDT", 100.0, &response, TradingMode::Spot, &settings()).unwrap();
        assert_eq!(signal.direction, crate::types::Direction::Up);
    }

    #[test]
    fn sell_is_discarded_for_spot() {
        let response = AdvisorResponse {
            action: Action::Sell,
            confidence: 80.0,
            risk: RiskLevel::Low,
            entry: None,
            stop_loss: None,
            take_profit: None,
            reasoning: "test".into(),
        };
        assert!(response_to_signal("BTCUSDT", 100.0, &response, TradingMode::Spot, &settings()).is_none());
    }

    #[test]
    fn hold_never_produces_a_signal() {
        let response = AdvisorResponse {
            action: Action::Hold,
            confidence: 0.0,
            risk: RiskLevel::Low,
            entry: None,
            stop_loss: None,
            take_profit: None,
            reasoning: "test".into(),
        };
        assert!(response_to_signal("BTCUSDT", 100.0, &response, TradingMode::Leverage, &settings()).is_none());
    }
}
