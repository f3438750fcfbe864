// =============================================================================
// Shared types used across the Aurora dual-mode trading engine
// =============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// Balance snapshot for a single asset from the exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceInfo {
    pub asset: String,
    #[serde(default)]
    pub free: f64,
    #[serde(default)]
    pub locked: f64,
}

/// Which of the two bots a piece of state or an event belongs to.
///
/// Spot is long-only (buy/sell); Leverage trades linear perpetuals and can go
/// long or short. Keeping this as a type-level tag (rather than a string, as
/// the source does) lets position construction reject invalid
/// direction/mode combinations in one place instead of scattering checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradingMode {
    Spot,
    Leverage,
}

impl fmt::Display for TradingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spot => write!(f, "spot"),
            Self::Leverage => write!(f, "leverage"),
        }
    }
}

impl TradingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spot => "spot",
            Self::Leverage => "leverage",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "spot" => Some(Self::Spot),
            "leverage" => Some(Self::Leverage),
            _ => None,
        }
    }

    /// The Bybit v5 `category` used for REST calls in this mode.
    pub fn category(&self) -> Category {
        match self {
            Self::Spot => Category::Spot,
            Self::Leverage => Category::Linear,
        }
    }
}

/// Position direction. `Up` is the spot long-only sentinel; `Long`/`Short`
/// only ever occur for leverage positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Long,
    Short,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "UP"),
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
        }
    }
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "UP",
            Self::Long => "LONG",
            Self::Short => "SHORT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "UP" => Some(Self::Up),
            "LONG" => Some(Self::Long),
            "SHORT" => Some(Self::Short),
            _ => None,
        }
    }

    /// Returns `true` when `direction` is a legal combination with `mode`.
    /// UP only ever pairs with Spot; LONG/SHORT only ever pair with Leverage.
    pub fn compatible_with(&self, mode: TradingMode) -> bool {
        matches!(
            (self, mode),
            (Direction::Up, TradingMode::Spot)
                | (Direction::Long | Direction::Short, TradingMode::Leverage)
        )
    }

    /// The Bybit order side that opens a position in this direction.
    pub fn opening_side(&self) -> OrderSide {
        match self {
            Direction::Up | Direction::Long => OrderSide::Buy,
            Direction::Short => OrderSide::Sell,
        }
    }

    /// The order side that closes a position opened in this direction.
    pub fn closing_side(&self) -> OrderSide {
        self.opening_side().opposite()
    }
}

/// Bybit v5 `category` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Spot,
    Linear,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spot => write!(f, "spot"),
            Self::Linear => write!(f, "linear"),
        }
    }
}

/// Bybit v5 order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "Buy",
            Self::Sell => "Sell",
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Bybit v5 order type. Only `Market` is used by the engine's own execution
/// path; `Limit` is retained for completeness of the exchange client surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Market => "Market",
            Self::Limit => "Limit",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Deployment environment. Only `Mainnet` is supported per spec; kept as an
/// enum (rather than a bool) so a future environment is additive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Mainnet,
}

impl Default for Environment {
    fn default() -> Self {
        Self::Mainnet
    }
}

/// Candle timeframe. Only these five are configurable per settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    H1,
    H4,
}

impl Timeframe {
    pub fn as_bybit_interval(&self) -> &'static str {
        match self {
            Self::M1 => "1",
            Self::M5 => "5",
            Self::M15 => "15",
            Self::H1 => "60",
            Self::H4 => "240",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::M1 => "1m",
            Self::M5 => "5m",
            Self::M15 => "15m",
            Self::H1 => "1h",
            Self::H4 => "4h",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "1m" => Some(Self::M1),
            "5m" => Some(Self::M5),
            "15m" => Some(Self::M15),
            "1h" => Some(Self::H1),
            "4h" => Some(Self::H4),
            _ => None,
        }
    }
}

impl Default for Timeframe {
    fn default() -> Self {
        Self::M15
    }
}

/// The four independently-toggleable strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StrategyKind {
    TrendFollowing,
    MeanReversion,
    BreakoutTrading,
    PullbackTrading,
}

impl StrategyKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::TrendFollowing => "Trend Following",
            Self::MeanReversion => "Mean Reversion",
            Self::BreakoutTrading => "Breakout",
            Self::PullbackTrading => "Pullback",
        }
    }

    /// Admission order when multiple strategies fire on the same symbol in
    /// the same cycle (spec.md §4.7 tie-break rule).
    pub fn priority_order() -> [StrategyKind; 4] {
        [
            Self::TrendFollowing,
            Self::MeanReversion,
            Self::BreakoutTrading,
            Self::PullbackTrading,
        ]
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Position / trade status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    Open,
    Closed,
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// BotLog severity / category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BotLogLevel {
    Info,
    Analysis,
    Signal,
    Trade,
    Order,
    Monitor,
    Scan,
    Success,
    Warn,
    Error,
    Config,
    Ai,
}

impl BotLogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Analysis => "ANALYSIS",
            Self::Signal => "SIGNAL",
            Self::Trade => "TRADE",
            Self::Order => "ORDER",
            Self::Monitor => "MONITOR",
            Self::Scan => "SCAN",
            Self::Success => "SUCCESS",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Config => "CONFIG",
            Self::Ai => "AI",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "INFO" => Self::Info,
            "ANALYSIS" => Self::Analysis,
            "SIGNAL" => Self::Signal,
            "TRADE" => Self::Trade,
            "ORDER" => Self::Order,
            "MONITOR" => Self::Monitor,
            "SCAN" => Self::Scan,
            "SUCCESS" => Self::Success,
            "WARN" => Self::Warn,
            "ERROR" => Self::Error,
            "CONFIG" => Self::Config,
            "AI" => Self::Ai,
            _ => return None,
        })
    }
}

impl fmt::Display for BotLogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Bot lifecycle state (spec.md §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BotState {
    Stopped,
    Starting,
    Running,
    Degraded,
    Stopping,
}

impl fmt::Display for BotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "Stopped"),
            Self::Starting => write!(f, "Starting"),
            Self::Running => write!(f, "Running"),
            Self::Degraded => write!(f, "Degraded"),
            Self::Stopping => write!(f, "Stopping"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_compatibility() {
        assert!(Direction::Up.compatible_with(TradingMode::Spot));
        assert!(!Direction::Up.compatible_with(TradingMode::Leverage));
        assert!(Direction::Long.compatible_with(TradingMode::Leverage));
        assert!(Direction::Short.compatible_with(TradingMode::Leverage));
        assert!(!Direction::Long.compatible_with(TradingMode::Spot));
        assert!(!Direction::Short.compatible_with(TradingMode::Spot));
    }

    #[test]
    fn opening_and_closing_sides() {
        assert_eq!(Direction::Up.opening_side(), OrderSide::Buy);
        assert_eq!(Direction::Up.closing_side(), OrderSide::Sell);
        assert_eq!(Direction::Short.opening_side(), OrderSide::Sell);
        assert_eq!(Direction::Short.closing_side(), OrderSide::Buy);
    }

    #[test]
    fn timeframe_roundtrip() {
        for tf in [Timeframe::M1, Timeframe::M5, Timeframe::M15, Timeframe::H1, Timeframe::H4] {
            assert_eq!(Timeframe::parse(tf.as_str()), Some(tf));
        }
    }

    #[test]
    fn strategy_priority_order_matches_spec() {
        let order = StrategyKind::priority_order();
        assert_eq!(order[0], StrategyKind::TrendFollowing);
        assert_eq!(order[1], StrategyKind::MeanReversion);
        assert_eq!(order[2], StrategyKind::BreakoutTrading);
        assert_eq!(order[3], StrategyKind::PullbackTrading);
    }
}
