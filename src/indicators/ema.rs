// Exponential Moving Average: weights recent closes more heavily than a
// simple average, seeded with the plain SMA of the first `period` closes.
//
//   multiplier = 2 / (period + 1)
//   ema_t = close_t * multiplier + ema_{t-1} * (1 - multiplier)

/// EMA series over `closes` for the given look-back `period`. The first
/// output corresponds to the close at index `period - 1` (the SMA seed);
/// empty when `period` is zero or `closes` is shorter than `period`.
pub fn ema_series(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period {
        return Vec::new();
    }

    let multiplier = 2.0 / (period + 1) as f64;
    let seed: f64 = closes[..period].iter().sum::<f64>() / period as f64;
    if !seed.is_finite() {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(closes.len() - period + 1);
    out.push(seed);

    let mut prev = seed;
    for &close in &closes[period..] {
        let ema = close * multiplier + prev * (1.0 - multiplier);
        if !ema.is_finite() {
            break;
        }
        out.push(ema);
        prev = ema;
    }

    out
}

/// Most recent EMA value, or `None` on insufficient/degenerate input.
pub fn latest_ema(closes: &[f64], period: usize) -> Option<f64> {
    ema_series(closes, period).last().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_empty_series() {
        assert!(ema_series(&[], 5).is_empty());
    }

    #[test]
    fn zero_period_yields_empty_series() {
        assert!(ema_series(&[1.0, 2.0, 3.0], 0).is_empty());
    }

    #[test]
    fn too_few_closes_yields_empty_series() {
        assert!(ema_series(&[1.0, 2.0], 5).is_empty());
    }

    #[test]
    fn period_equal_to_length_is_just_the_sma() {
        let ema = ema_series(&[2.0, 4.0, 6.0], 3);
        assert_eq!(ema.len(), 1);
        assert!((ema[0] - 4.0).abs() < 1e-10);
    }

    #[test]
    fn matches_hand_rolled_recurrence() {
        let closes: Vec<f64> = (1..=10).map(|x| x as f64).collect();
        let ema = ema_series(&closes, 5);
        assert_eq!(ema.len(), 6);

        let mult = 2.0 / 6.0;
        let mut expected = 3.0; // SMA seed of [1,2,3,4,5]
        let mut expected_series = vec![expected];
        for &c in &closes[5..] {
            expected = c * mult + expected * (1.0 - mult);
            expected_series.push(expected);
        }
        for (got, want) in ema.iter().zip(expected_series.iter()) {
            assert!((got - want).abs() < 1e-10, "got {got}, expected {want}");
        }
    }

    #[test]
    fn nan_in_input_truncates_series_at_the_seed() {
        let closes = vec![1.0, 2.0, 3.0, f64::NAN, 5.0];
        assert_eq!(ema_series(&closes, 3).len(), 1);
    }

    #[test]
    fn latest_ema_matches_series_tail() {
        let closes: Vec<f64> = (1..=10).map(|x| x as f64).collect();
        assert_eq!(latest_ema(&closes, 5), ema_series(&closes, 5).last().copied());
    }
}
