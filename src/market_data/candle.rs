// =============================================================================
// OHLCV candle
// =============================================================================
//
// Transient: held only within a scan cycle, never persisted individually.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub close_time: i64,
}

impl Candle {
    pub fn new(open_time: i64, open: f64, high: f64, low: f64, close: f64, volume: f64, close_time: i64) -> Self {
        Self { open_time, open, high, low, close, volume, close_time }
    }

    /// All six numeric fields must be finite for the candle to be usable;
    /// malformed entries from the exchange are dropped at the fetch boundary.
    pub fn is_valid(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume].iter().all(|v| v.is_finite())
    }
}

pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_candle_is_invalid() {
        let candle = Candle::new(0, 1.0, 2.0, 0.5, f64::NAN, 10.0, 60_000);
        assert!(!candle.is_valid());
    }

    #[test]
    fn finite_candle_is_valid() {
        let candle = Candle::new(0, 1.0, 2.0, 0.5, 1.5, 10.0, 60_000);
        assert!(candle.is_valid());
    }
}
