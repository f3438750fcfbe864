// =============================================================================
// Trading settings — typed configuration parsed once at the Store boundary
// =============================================================================
//
// The source threaded a dynamic settings object through every layer. Here it
// is a single typed record with enumerated fields for strategy toggles,
// timeframe and environment, validated once when it leaves the Store
// (`TradingSettings::validate`) rather than re-checked ad hoc downstream.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::types::{Environment, StrategyKind, Timeframe};

fn default_usdt_per_trade() -> f64 {
    50.0
}
fn default_risk_per_trade() -> f64 {
    1.0
}
fn default_stop_loss_pct() -> f64 {
    1.5
}
fn default_take_profit_pct() -> f64 {
    3.0
}
fn default_max_positions() -> i64 {
    3
}
fn default_min_confidence() -> f64 {
    60.0
}
fn default_rsi_period() -> u32 {
    14
}
fn default_rsi_low() -> f64 {
    30.0
}
fn default_rsi_high() -> f64 {
    70.0
}
fn default_ema_fast() -> u32 {
    9
}
fn default_ema_slow() -> u32 {
    21
}
fn default_macd_signal() -> u32 {
    9
}
fn default_adx_period() -> u32 {
    14
}

fn default_strategy_toggles() -> HashMap<StrategyKind, bool> {
    StrategyKind::priority_order()
        .into_iter()
        .map(|kind| (kind, true))
        .collect()
}

/// Exchange API credentials. Optional: a user with none set can still run in
/// paper mode; authenticated operations fail with `CredentialsMissing`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeCredentials {
    pub api_key: String,
    pub api_secret: String,
}

impl std::fmt::Display for ExchangeCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ExchangeCredentials(<redacted>)")
    }
}

/// Indicator computation parameters, shared by both bots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorParams {
    #[serde(default = "default_rsi_period")]
    pub rsi_period: u32,
    #[serde(default = "default_rsi_low")]
    pub rsi_low: f64,
    #[serde(default = "default_rsi_high")]
    pub rsi_high: f64,
    #[serde(default = "default_ema_fast")]
    pub ema_fast: u32,
    #[serde(default = "default_ema_slow")]
    pub ema_slow: u32,
    #[serde(default = "default_macd_signal")]
    pub macd_signal: u32,
    #[serde(default = "default_adx_period")]
    pub adx_period: u32,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            rsi_period: default_rsi_period(),
            rsi_low: default_rsi_low(),
            rsi_high: default_rsi_high(),
            ema_fast: default_ema_fast(),
            ema_slow: default_ema_slow(),
            macd_signal: default_macd_signal(),
            adx_period: default_adx_period(),
        }
    }
}

/// One user's trading configuration. Created lazily with defaults on first
/// read by the Store; every monetary/percentage field is a plain `f64` here
/// and rendered to a canonical decimal string only at the storage boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradingSettings {
    #[serde(default = "default_usdt_per_trade")]
    pub usdt_per_trade: f64,
    #[serde(default = "default_risk_per_trade")]
    pub risk_per_trade: f64,
    #[serde(default = "default_stop_loss_pct")]
    pub stop_loss_pct: f64,
    #[serde(default = "default_take_profit_pct")]
    pub take_profit_pct: f64,
    #[serde(default = "default_max_positions")]
    pub max_positions: i64,
    #[serde(default)]
    pub credentials: Option<ExchangeCredentials>,
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub spot_paper_trading: bool,
    #[serde(default)]
    pub leverage_paper_trading: bool,
    #[serde(default)]
    pub indicators: IndicatorParams,
    #[serde(default = "default_strategy_toggles")]
    pub spot_strategies: HashMap<StrategyKind, bool>,
    #[serde(default = "default_strategy_toggles")]
    pub leverage_strategies: HashMap<StrategyKind, bool>,
    #[serde(default)]
    pub spot_ai_trading: bool,
    #[serde(default)]
    pub leverage_ai_trading: bool,
    #[serde(default)]
    pub timeframe: Timeframe,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
}

impl Default for TradingSettings {
    fn default() -> Self {
        Self {
            usdt_per_trade: default_usdt_per_trade(),
            risk_per_trade: default_risk_per_trade(),
            stop_loss_pct: default_stop_loss_pct(),
            take_profit_pct: default_take_profit_pct(),
            max_positions: default_max_positions(),
            credentials: None,
            environment: Environment::default(),
            spot_paper_trading: true,
            leverage_paper_trading: true,
            indicators: IndicatorParams::default(),
            spot_strategies: default_strategy_toggles(),
            leverage_strategies: default_strategy_toggles(),
            spot_ai_trading: false,
            leverage_ai_trading: false,
            timeframe: Timeframe::default(),
            min_confidence: default_min_confidence(),
        }
    }
}

impl TradingSettings {
    /// Checks the invariants named in the data model: `emaFast < emaSlow`,
    /// `rsiLow < rsiHigh`, `minConfidence in [0,100]`.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.indicators.ema_fast >= self.indicators.ema_slow {
            return Err(EngineError::ValidationError(format!(
                "emaFast ({}) must be less than emaSlow ({})",
                self.indicators.ema_fast, self.indicators.ema_slow
            )));
        }
        if self.indicators.rsi_low >= self.indicators.rsi_high {
            return Err(EngineError::ValidationError(format!(
                "rsiLow ({}) must be less than rsiHigh ({})",
                self.indicators.rsi_low, self.indicators.rsi_high
            )));
        }
        if !(0.0..=100.0).contains(&self.min_confidence) {
            return Err(EngineError::ValidationError(format!(
                "minConfidence ({}) must be in [0,100]",
                self.min_confidence
            )));
        }
        if self.max_positions < 0 {
            return Err(EngineError::ValidationError("maxPositions must be non-negative".into()));
        }
        Ok(())
    }

    pub fn paper_trading_for(&self, mode: crate::types::TradingMode) -> bool {
        match mode {
            crate::types::TradingMode::Spot => self.spot_paper_trading,
            crate::types::TradingMode::Leverage => self.leverage_paper_trading,
        }
    }

    pub fn ai_trading_for(&self, mode: crate::types::TradingMode) -> bool {
        match mode {
            crate::types::TradingMode::Spot => self.spot_ai_trading,
            crate::types::TradingMode::Leverage => self.leverage_ai_trading,
        }
    }

    pub fn strategies_for(&self, mode: crate::types::TradingMode) -> &HashMap<StrategyKind, bool> {
        match mode {
            crate::types::TradingMode::Spot => &self.spot_strategies,
            crate::types::TradingMode::Leverage => &self.leverage_strategies,
        }
    }

    pub fn is_strategy_enabled(&self, mode: crate::types::TradingMode, strategy: StrategyKind) -> bool {
        self.strategies_for(mode).get(&strategy).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TradingMode;

    #[test]
    fn defaults_validate() {
        assert!(TradingSettings::default().validate().is_ok());
    }

    #[test]
    fn ema_inversion_rejected() {
        let mut settings = TradingSettings::default();
        settings.indicators.ema_fast = 30;
        settings.indicators.ema_slow = 10;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rsi_inversion_rejected() {
        let mut settings = TradingSettings::default();
        settings.indicators.rsi_low = 80.0;
        settings.indicators.rsi_high = 20.0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn min_confidence_out_of_range_rejected() {
        let mut settings = TradingSettings::default();
        settings.min_confidence = 150.0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn empty_json_parses_to_defaults() {
        let settings: TradingSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.max_positions, default_max_positions());
        assert!(settings.is_strategy_enabled(TradingMode::Spot, StrategyKind::TrendFollowing));
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let settings: TradingSettings = serde_json::from_str(r#"{"maxPositions": 7}"#).unwrap();
        assert_eq!(settings.max_positions, 7);
        assert_eq!(settings.usdt_per_trade, default_usdt_per_trade());
    }
}
