// =============================================================================
// Simple Moving Average (SMA)
// =============================================================================

/// Compute the SMA series for the given `closes` and `period`.
///
/// Each output element is the mean of the trailing `period` closes ending at
/// that index; the first `period - 1` closes produce no output.
pub fn calculate_sma(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period {
        return Vec::new();
    }

    closes
        .windows(period)
        .map(|w| w.iter().sum::<f64>() / period as f64)
        .collect()
}

/// The most recent SMA value, or `None` if there isn't enough data.
pub fn current_sma(closes: &[f64], period: usize) -> Option<f64> {
    calculate_sma(closes, period).last().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_data_is_empty() {
        assert!(calculate_sma(&[1.0, 2.0], 20).is_empty());
    }

    #[test]
    fn period_zero_is_empty() {
        assert!(calculate_sma(&[1.0, 2.0, 3.0], 0).is_empty());
    }

    #[test]
    fn known_average() {
        let closes = vec![2.0, 4.0, 6.0, 8.0];
        let sma = calculate_sma(&closes, 2);
        assert_eq!(sma, vec![3.0, 5.0, 7.0]);
    }

    #[test]
    fn current_sma_matches_last_window() {
        let closes: Vec<f64> = (1..=25).map(|x| x as f64).collect();
        let value = current_sma(&closes, 20).unwrap();
        let expected: f64 = closes[5..25].iter().sum::<f64>() / 20.0;
        assert!((value - expected).abs() < 1e-9);
    }
}
