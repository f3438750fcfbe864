// =============================================================================
// Centralized P&L arithmetic
// =============================================================================
//
// Both the Bot Engine (to preview a proposal's risk) and the Position
// Monitor (to mark open positions to market and to realize a close) need the
// same formula. The source computed this inline in two different places with
// a `side == "BUY" ? 1 : -1` sign flip; kept here as one pure function so
// both call sites can never drift.

use crate::types::Direction;

/// Unrealized or realized P&L for a position in `direction`, given entry and
/// current (or exit) price and quantity.
///
/// `UP`/`LONG` profit when price rises; `SHORT` profits when price falls.
pub fn compute_pnl(direction: Direction, entry_price: f64, current_price: f64, quantity: f64) -> f64 {
    match direction {
        Direction::Up | Direction::Long => (current_price - entry_price) * quantity,
        Direction::Short => (entry_price - current_price) * quantity,
    }
}

/// P&L expressed as a percentage of the entry notional.
pub fn compute_pnl_pct(direction: Direction, entry_price: f64, current_price: f64) -> f64 {
    if entry_price == 0.0 {
        return 0.0;
    }
    match direction {
        Direction::Up | Direction::Long => (current_price - entry_price) / entry_price * 100.0,
        Direction::Short => (entry_price - current_price) / entry_price * 100.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_profits_on_rise() {
        let pnl = compute_pnl(Direction::Long, 50000.0, 53010.0, 0.002);
        assert!((pnl - 6.02).abs() < 1e-9);
    }

    #[test]
    fn up_is_same_formula_as_long() {
        let up = compute_pnl(Direction::Up, 100.0, 110.0, 1.0);
        let long = compute_pnl(Direction::Long, 100.0, 110.0, 1.0);
        assert_eq!(up, long);
    }

    #[test]
    fn short_profits_on_fall() {
        let pnl = compute_pnl(Direction::Short, 50000.0, 49000.0, 0.1);
        assert!((pnl - 100.0).abs() < 1e-9);
    }

    #[test]
    fn flat_price_yields_zero_pnl() {
        assert_eq!(compute_pnl(Direction::Long, 50000.0, 50000.0, 1.0), 0.0);
        assert_eq!(compute_pnl(Direction::Short, 50000.0, 50000.0, 1.0), 0.0);
    }

    #[test]
    fn pct_matches_direction() {
        assert!((compute_pnl_pct(Direction::Long, 100.0, 110.0) - 10.0).abs() < 1e-9);
        assert!((compute_pnl_pct(Direction::Short, 100.0, 90.0) - 10.0).abs() < 1e-9);
    }
}
