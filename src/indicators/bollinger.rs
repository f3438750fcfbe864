/// Upper/middle/lower Bollinger bands and normalized band width for one
/// closes window: middle is the SMA, upper/lower sit `num_std` standard
/// deviations off it, `width` is `(upper - lower) / middle * 100`.
#[derive(Debug, Clone)]
pub struct BollingerResult {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    pub width: f64,
}

/// `None` when `closes` is shorter than `period` or the middle band is zero.
pub fn bollinger_bands(closes: &[f64], period: usize, num_std: f64) -> Option<BollingerResult> {
    if period == 0 || closes.len() < period {
        return None;
    }

    let window = &closes[closes.len() - period..];
    let middle = window.iter().sum::<f64>() / period as f64;
    if middle == 0.0 {
        return None;
    }

    let variance = window.iter().map(|x| (x - middle).powi(2)).sum::<f64>() / period as f64;
    let std_dev = variance.sqrt();
    let upper = middle + num_std * std_dev;
    let lower = middle - num_std * std_dev;
    let width = (upper - lower) / middle * 100.0;

    width.is_finite().then_some(BollingerResult { upper, middle, lower, width })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_straddle_the_middle() {
        let closes: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        let bb = bollinger_bands(&closes, 20, 2.0).unwrap();
        assert!(bb.upper > bb.middle);
        assert!(bb.lower < bb.middle);
        assert!(bb.width > 0.0);
    }

    #[test]
    fn too_few_closes_is_none() {
        assert!(bollinger_bands(&[1.0, 2.0, 3.0], 20, 2.0).is_none());
    }

    #[test]
    fn flat_closes_have_zero_width() {
        let closes = vec![100.0; 20];
        let bb = bollinger_bands(&closes, 20, 2.0).unwrap();
        assert!(bb.width.abs() < 1e-10);
    }
}
