// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the core technical indicators used
// by the trading engine. Every public function returns `Option<T>` or an empty
// `Vec` on insufficient data so callers are forced to handle that case instead
// of indexing a partially-computed series.

pub mod adx;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;

/// All indicator readings computed on a symbol's last closed candle. `None`
/// fields mean that indicator was undefined for the available data; the
/// strategy evaluator treats any strategy needing a missing field as
/// non-firing for the cycle rather than erroring.
#[derive(Debug, Clone, Default)]
pub struct IndicatorSnapshot {
    pub rsi: Option<f64>,
    pub ema_fast: Option<f64>,
    pub ema_slow: Option<f64>,
    pub macd: Option<macd::MacdResult>,
    pub adx: Option<f64>,
    pub bollinger: Option<bollinger::BollingerResult>,
    pub sma: Option<f64>,
}

impl IndicatorSnapshot {
    pub fn compute(
        closes: &[f64],
        candles: &[crate::market_data::Candle],
        params: &crate::config::IndicatorParams,
    ) -> Self {
        Self {
            rsi: rsi::latest_rsi(closes, params.rsi_period as usize),
            ema_fast: ema::latest_ema(closes, params.ema_fast as usize),
            ema_slow: ema::latest_ema(closes, params.ema_slow as usize),
            macd: macd::calculate_macd(
                closes,
                params.ema_fast as usize,
                params.ema_slow as usize,
                params.macd_signal as usize,
            ),
            adx: adx::latest_adx(candles, params.adx_period as usize),
            bollinger: bollinger::bollinger_bands(closes, 20, 2.0),
            sma: sma::current_sma(closes, 20),
        }
    }
}
