// =============================================================================
// Moving Average Convergence Divergence (MACD)
// =============================================================================
//
// MACD line = EMA(close, fast) - EMA(close, slow)
// Signal line = EMA(MACD line, signal)
// Histogram = MACD line - Signal line

use super::ema::ema_series;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdResult {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Compute the most recent MACD snapshot from a closes series.
///
/// Returns `None` when there isn't enough data to seed both EMAs and then
/// run the signal EMA over the resulting MACD series (`len >= slow + signal`
/// closes, roughly).
pub fn calculate_macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Option<MacdResult> {
    if fast == 0 || slow == 0 || signal == 0 || fast >= slow {
        return None;
    }

    let ema_fast = ema_series(closes, fast);
    let ema_slow = ema_series(closes, slow);
    if ema_fast.is_empty() || ema_slow.is_empty() {
        return None;
    }

    // ema_fast starts at index fast-1, ema_slow starts at index slow-1;
    // align both series to the slow series' start before subtracting.
    let offset = slow - fast;
    if ema_fast.len() <= offset {
        return None;
    }
    let macd_line: Vec<f64> = ema_fast[offset..]
        .iter()
        .zip(ema_slow.iter())
        .map(|(f, s)| f - s)
        .collect();

    if macd_line.len() < signal {
        return None;
    }

    let signal_line = ema_series(&macd_line, signal);
    let macd = *macd_line.last()?;
    let sig = *signal_line.last()?;
    let histogram = macd - sig;

    if !histogram.is_finite() {
        return None;
    }

    Some(MacdResult { macd, signal: sig, histogram })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_data_returns_none() {
        let closes = vec![1.0, 2.0, 3.0];
        assert!(calculate_macd(&closes, 12, 26, 9).is_none());
    }

    #[test]
    fn ascending_series_has_positive_histogram_eventually() {
        let closes: Vec<f64> = (1..=200).map(|x| x as f64).collect();
        let result = calculate_macd(&closes, 12, 26, 9).unwrap();
        // A steadily rising series: fast EMA pulls ahead of slow EMA.
        assert!(result.macd > 0.0);
    }

    #[test]
    fn fast_must_be_less_than_slow() {
        let closes: Vec<f64> = (1..=200).map(|x| x as f64).collect();
        assert!(calculate_macd(&closes, 26, 12, 9).is_none());
    }

    #[test]
    fn flat_series_has_zero_histogram() {
        let closes = vec![100.0; 200];
        let result = calculate_macd(&closes, 12, 26, 9).unwrap();
        assert!(result.macd.abs() < 1e-9);
        assert!(result.histogram.abs() < 1e-9);
    }
}
