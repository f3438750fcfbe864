// Relative Strength Index, Wilder's smoothing.
//
// avg_gain/avg_loss are seeded with a plain average of the first `period`
// deltas, then updated bar-by-bar with Wilder's recurrence:
//   avg = (avg * (period - 1) + sample) / period
// RSI = 100 - 100 / (1 + avg_gain / avg_loss), clamped to 100 when there are
// no losses to divide by.
//
// Strategies read the raw value and compare it against their own configured
// `rsi_low`/`rsi_high` bands rather than a fixed 70/30 split, so this module
// hands back a bare series with no overbought/oversold labeling baked in.

/// One RSI value per close starting at index `period` (the first `period`
/// closes only seed the initial averages and produce no output of their own).
///
/// Empty when `period` is zero or there are fewer than `period + 1` closes.
/// A non-finite intermediate value truncates the series at that point rather
/// than propagating NaN downstream.
pub fn rsi_series(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period + 1 {
        return Vec::new();
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let period_f = period as f64;

    let (seed_gain, seed_loss) = deltas[..period].iter().fold((0.0_f64, 0.0_f64), |(gain, loss), &d| {
        if d > 0.0 { (gain + d, loss) } else { (gain, loss + d.abs()) }
    });
    let mut avg_gain = seed_gain / period_f;
    let mut avg_loss = seed_loss / period_f;

    let Some(first) = rsi_from_wilder_averages(avg_gain, avg_loss) else {
        return Vec::new();
    };

    let mut out = Vec::with_capacity(deltas.len() - period + 1);
    out.push(first);

    for &delta in &deltas[period..] {
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);
        avg_gain = (avg_gain * (period_f - 1.0) + gain) / period_f;
        avg_loss = (avg_loss * (period_f - 1.0) + loss) / period_f;

        match rsi_from_wilder_averages(avg_gain, avg_loss) {
            Some(value) => out.push(value),
            None => break,
        }
    }

    out
}

/// The most recent RSI reading, or `None` on insufficient/degenerate input.
pub fn latest_rsi(closes: &[f64], period: usize) -> Option<f64> {
    rsi_series(closes, period).last().copied()
}

fn rsi_from_wilder_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    let rsi = if avg_gain == 0.0 && avg_loss == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    };
    rsi.is_finite().then_some(rsi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_empty_series() {
        assert!(rsi_series(&[], 14).is_empty());
    }

    #[test]
    fn zero_period_yields_empty_series() {
        assert!(rsi_series(&[1.0, 2.0, 3.0], 0).is_empty());
    }

    #[test]
    fn too_few_closes_yields_empty_series() {
        let closes: Vec<f64> = (1..=14).map(|x| x as f64).collect();
        assert!(rsi_series(&closes, 14).is_empty());
    }

    #[test]
    fn strictly_ascending_closes_saturate_at_100() {
        let closes: Vec<f64> = (1..=30).map(|x| x as f64).collect();
        let series = rsi_series(&closes, 14);
        assert!(!series.is_empty());
        assert!(series.iter().all(|&v| (v - 100.0).abs() < 1e-10));
    }

    #[test]
    fn strictly_descending_closes_bottom_out_at_0() {
        let closes: Vec<f64> = (1..=30).rev().map(|x| x as f64).collect();
        let series = rsi_series(&closes, 14);
        assert!(!series.is_empty());
        assert!(series.iter().all(|&v| v.abs() < 1e-10));
    }

    #[test]
    fn flat_closes_sit_at_50() {
        let closes = vec![100.0; 30];
        let series = rsi_series(&closes, 14);
        assert!(series.iter().all(|&v| (v - 50.0).abs() < 1e-10));
    }

    #[test]
    fn stays_within_0_to_100_on_mixed_data() {
        let closes = vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08, 45.89, 46.03, 44.18, 44.22, 44.57,
            43.42, 42.66, 43.13,
        ];
        for &v in &rsi_series(&closes, 14) {
            assert!((0.0..=100.0).contains(&v), "RSI {v} out of range");
        }
    }

    #[test]
    fn latest_rsi_matches_series_tail() {
        let closes: Vec<f64> = (1..=30).map(|x| x as f64).collect();
        let series = rsi_series(&closes, 14);
        assert_eq!(latest_rsi(&closes, 14), series.last().copied());
    }

    #[test]
    fn latest_rsi_none_on_bad_input() {
        assert!(latest_rsi(&[], 14).is_none());
    }
}
