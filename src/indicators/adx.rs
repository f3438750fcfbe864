// Average Directional Index: trend strength, independent of direction.
//
//   1. per-bar true range and directional movement (+DM, -DM)
//   2. Wilder-smooth all three over `period` bars
//   3. DX = |+DI - -DI| / (+DI + -DI) * 100, from the smoothed values
//   4. ADX = Wilder-smoothed average of DX over another `period` bars
//
// ADX above ~25 reads as trending, below ~20 as ranging/choppy.

use crate::market_data::Candle;

struct DirectionalMovement {
    plus_dm: f64,
    minus_dm: f64,
    true_range: f64,
}

fn directional_movement(prev: &Candle, curr: &Candle) -> DirectionalMovement {
    let true_range = (curr.high - curr.low)
        .max((curr.high - prev.close).abs())
        .max((curr.low - prev.close).abs());

    let up_move = curr.high - prev.high;
    let down_move = prev.low - curr.low;

    let plus_dm = if up_move > down_move && up_move > 0.0 { up_move } else { 0.0 };
    let minus_dm = if down_move > up_move && down_move > 0.0 { down_move } else { 0.0 };

    DirectionalMovement { plus_dm, minus_dm, true_range }
}

/// Directional index from already-smoothed +DM/-DM/TR sums.
///
/// `None` when smoothed TR is zero (no price range to divide by).
fn directional_index(smoothed_plus_dm: f64, smoothed_minus_dm: f64, smoothed_tr: f64) -> Option<f64> {
    if smoothed_tr == 0.0 {
        return None;
    }

    let plus_di = smoothed_plus_dm / smoothed_tr * 100.0;
    let minus_di = smoothed_minus_dm / smoothed_tr * 100.0;
    let di_sum = plus_di + minus_di;
    if di_sum == 0.0 {
        return Some(0.0);
    }

    let dx = (plus_di - minus_di).abs() / di_sum * 100.0;
    dx.is_finite().then_some(dx)
}

/// Most recent ADX reading over `candles`, or `None` when there are fewer
/// than `2 * period + 1` candles (enough bars to seed the DM/TR smoothing
/// and then seed the ADX average itself from the resulting DX series) or
/// any intermediate value goes non-finite.
pub fn latest_adx(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < 2 * period + 1 {
        return None;
    }
    let period_f = period as f64;

    let moves: Vec<DirectionalMovement> = candles.windows(2).map(|w| directional_movement(&w[0], &w[1])).collect();

    let mut smoothed_plus_dm: f64 = moves[..period].iter().map(|m| m.plus_dm).sum();
    let mut smoothed_minus_dm: f64 = moves[..period].iter().map(|m| m.minus_dm).sum();
    let mut smoothed_tr: f64 = moves[..period].iter().map(|m| m.true_range).sum();

    let mut dx_values = Vec::with_capacity(moves.len() - period + 1);
    dx_values.push(directional_index(smoothed_plus_dm, smoothed_minus_dm, smoothed_tr)?);

    for m in &moves[period..] {
        smoothed_plus_dm = smoothed_plus_dm - smoothed_plus_dm / period_f + m.plus_dm;
        smoothed_minus_dm = smoothed_minus_dm - smoothed_minus_dm / period_f + m.minus_dm;
        smoothed_tr = smoothed_tr - smoothed_tr / period_f + m.true_range;
        dx_values.push(directional_index(smoothed_plus_dm, smoothed_minus_dm, smoothed_tr)?);
    }

    if dx_values.len() < period {
        return None;
    }

    let seed: f64 = dx_values[..period].iter().sum::<f64>() / period_f;
    let mut adx = seed;
    for &dx in &dx_values[period..] {
        adx = (adx * (period_f - 1.0) + dx) / period_f;
        if !adx.is_finite() {
            return None;
        }
    }

    adx.is_finite().then_some(adx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle { open_time: 0, open, high, low, close, volume: 1.0, close_time: 0 }
    }

    #[test]
    fn zero_period_is_none() {
        let candles = vec![candle(1.0, 2.0, 0.5, 1.5); 50];
        assert!(latest_adx(&candles, 0).is_none());
    }

    #[test]
    fn too_few_candles_is_none() {
        let candles = vec![candle(1.0, 2.0, 0.5, 1.5); 10];
        assert!(latest_adx(&candles, 14).is_none());
    }

    #[test]
    fn strong_uptrend_reads_above_25() {
        let candles: Vec<Candle> = (0..60)
            .map(|i| {
                let base = 100.0 + i as f64 * 2.0;
                candle(base, base + 1.5, base - 0.5, base + 1.0)
            })
            .collect();

        let adx = latest_adx(&candles, 14).expect("enough candles for a reading");
        assert!(adx > 25.0, "expected ADX > 25 for a strong trend, got {adx}");
    }

    #[test]
    fn flat_market_reads_near_zero() {
        let candles = vec![candle(100.0, 101.0, 99.0, 100.0); 60];
        let adx = latest_adx(&candles, 14).expect("enough candles for a reading");
        assert!(adx < 1.0, "expected ADX near 0 for a flat market, got {adx}");
    }

    #[test]
    fn stays_within_0_to_100() {
        let candles: Vec<Candle> = (0..100)
            .map(|i| {
                let base = 50.0 + (i as f64 * 0.3).sin() * 10.0;
                candle(base - 0.5, base + 1.0, base - 1.0, base + 0.5)
            })
            .collect();
        if let Some(value) = latest_adx(&candles, 14) {
            assert!((0.0..=100.0).contains(&value), "ADX {value} out of range");
        }
    }

    #[test]
    fn exact_minimum_candle_count_still_produces_a_reading() {
        let period = 5;
        let min = 2 * period + 1;
        let candles: Vec<Candle> = (0..min)
            .map(|i| {
                let base = 100.0 + i as f64;
                candle(base, base + 1.0, base - 0.5, base + 0.5)
            })
            .collect();
        assert!(latest_adx(&candles, period).is_some());
        assert!(latest_adx(&candles[..min - 1], period).is_none());
    }
}
