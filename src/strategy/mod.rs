// =============================================================================
// Strategy evaluation
// =============================================================================

pub mod evaluator;

use crate::types::{Direction, StrategyKind, TradingMode};

/// A single strategy's trade proposal for one symbol on one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub symbol: String,
    pub direction: Direction,
    pub confidence: f64,
    pub strategy: StrategyKind,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

impl Signal {
    /// Applies the spot-bot relabeling rule: only LONG signals survive, and
    /// are relabeled `UP` (spot has no SHORT direction). Leverage signals
    /// pass through unchanged.
    pub fn for_mode(self, mode: TradingMode) -> Option<Self> {
        match mode {
            TradingMode::Leverage => Some(self),
            TradingMode::Spot => {
                if self.direction == Direction::Long {
                    Some(Self { direction: Direction::Up, ..self })
                } else {
                    None
                }
            }
        }
    }
}
