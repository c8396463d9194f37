//! Feature provider
//!
//! Turns a candle window into a [`FeatureSet`]: the indicator values at the
//! last three candles of the window. Computation is a pure function of the
//! input window, so live and replayed evaluation see identical features for
//! identical history.

pub mod series;

use crate::feed::Candle;

/// Shortest window any strategy evaluates (slow SMA lookback)
pub const MIN_WINDOW: usize = 60;

/// Indicator lookbacks
#[derive(Debug, Clone)]
pub struct IndicatorParams {
    pub sma_fast: usize,
    pub sma_slow: usize,
    pub rsi: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub bb_period: usize,
    pub bb_k: f64,
    pub stoch_k: usize,
    pub stoch_d: usize,
    pub williams: usize,
    pub volume_sma: usize,
    pub adx: usize,
    pub psar_step: f64,
    pub psar_max: f64,
    pub cmf: usize,
    pub mfi: usize,
    pub roc: usize,
    pub obv_sma: usize,
    pub atr: usize,
    pub cci: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            sma_fast: 25,
            sma_slow: 60,
            rsi: 28,
            macd_fast: 14,
            macd_slow: 30,
            macd_signal: 12,
            bb_period: 20,
            bb_k: 2.0,
            stoch_k: 14,
            stoch_d: 3,
            williams: 14,
            volume_sma: 35,
            adx: 14,
            psar_step: 0.02,
            psar_max: 0.2,
            cmf: 20,
            mfi: 14,
            roc: 12,
            obv_sma: 20,
            atr: 14,
            cci: 20,
        }
    }
}

/// Indicator values at one candle. Undefined values are already replaced by
/// neutral placeholders, so every field is finite.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FeatureRow {
    pub close: f64,
    pub volume: f64,
    pub sma_fast: f64,
    pub sma_slow: f64,
    pub rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_hist: f64,
    pub bb_upper: f64,
    pub bb_middle: f64,
    pub bb_lower: f64,
    /// (upper - lower) / middle
    pub bb_bandwidth: f64,
    pub stoch_k: f64,
    pub stoch_d: f64,
    pub williams_r: f64,
    pub volume_sma: f64,
    pub adx: f64,
    pub plus_di: f64,
    pub minus_di: f64,
    pub psar: f64,
    pub cmf: f64,
    pub mfi: f64,
    pub roc: f64,
    pub obv: f64,
    pub obv_sma: f64,
    pub atr: f64,
    pub cci: f64,
}

/// Features for the trailing window ending at one candle
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSet {
    /// Row at the window's last candle
    pub current: FeatureRow,
    /// Row one candle earlier
    pub previous: FeatureRow,
    /// Row two candles earlier
    pub earlier: FeatureRow,
    /// Number of candles the set was computed from
    pub window_len: usize,
}

impl FeatureSet {
    /// Whether the window was long enough for every lookback
    pub fn is_warm(&self) -> bool {
        self.window_len >= MIN_WINDOW
    }
}

/// All series computed over one window
struct Series {
    close: Vec<f64>,
    volume: Vec<f64>,
    sma_fast: Vec<f64>,
    sma_slow: Vec<f64>,
    rsi: Vec<f64>,
    macd: Vec<f64>,
    macd_signal: Vec<f64>,
    macd_hist: Vec<f64>,
    bb_upper: Vec<f64>,
    bb_middle: Vec<f64>,
    bb_lower: Vec<f64>,
    stoch_k: Vec<f64>,
    stoch_d: Vec<f64>,
    williams_r: Vec<f64>,
    volume_sma: Vec<f64>,
    adx: Vec<f64>,
    plus_di: Vec<f64>,
    minus_di: Vec<f64>,
    psar: Vec<f64>,
    cmf: Vec<f64>,
    mfi: Vec<f64>,
    roc: Vec<f64>,
    obv: Vec<f64>,
    obv_sma: Vec<f64>,
    atr: Vec<f64>,
    cci: Vec<f64>,
}

fn or_neutral(value: f64, neutral: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        neutral
    }
}

impl Series {
    fn row(&self, i: usize) -> FeatureRow {
        let close = or_neutral(self.close[i], 0.0);
        let bb_upper = or_neutral(self.bb_upper[i], close);
        let bb_middle = or_neutral(self.bb_middle[i], close);
        let bb_lower = or_neutral(self.bb_lower[i], close);
        let bb_bandwidth = if bb_middle != 0.0 {
            (bb_upper - bb_lower) / bb_middle
        } else {
            0.0
        };

        FeatureRow {
            close,
            volume: or_neutral(self.volume[i], 0.0),
            sma_fast: or_neutral(self.sma_fast[i], close),
            sma_slow: or_neutral(self.sma_slow[i], close),
            rsi: or_neutral(self.rsi[i], 50.0),
            macd: or_neutral(self.macd[i], 0.0),
            macd_signal: or_neutral(self.macd_signal[i], 0.0),
            macd_hist: or_neutral(self.macd_hist[i], 0.0),
            bb_upper,
            bb_middle,
            bb_lower,
            bb_bandwidth,
            stoch_k: or_neutral(self.stoch_k[i], 50.0),
            stoch_d: or_neutral(self.stoch_d[i], 50.0),
            williams_r: or_neutral(self.williams_r[i], -50.0),
            volume_sma: or_neutral(self.volume_sma[i], 0.0),
            adx: or_neutral(self.adx[i], 0.0),
            plus_di: or_neutral(self.plus_di[i], 0.0),
            minus_di: or_neutral(self.minus_di[i], 0.0),
            psar: or_neutral(self.psar[i], close),
            cmf: or_neutral(self.cmf[i], 0.0),
            mfi: or_neutral(self.mfi[i], 50.0),
            roc: or_neutral(self.roc[i], 0.0),
            obv: or_neutral(self.obv[i], 0.0),
            obv_sma: or_neutral(self.obv_sma[i], 0.0),
            atr: or_neutral(self.atr[i], 0.0),
            cci: or_neutral(self.cci[i], 0.0),
        }
    }
}

/// Computes feature sets from candle windows
#[derive(Debug, Clone, Default)]
pub struct FeatureProvider {
    params: IndicatorParams,
}

impl FeatureProvider {
    pub fn new(params: IndicatorParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &IndicatorParams {
        &self.params
    }

    /// Compute the feature set for the window ending at `candles.last()`.
    ///
    /// The window must already be normalized. An empty window yields an
    /// all-neutral set.
    pub fn compute(&self, candles: &[Candle]) -> FeatureSet {
        if candles.is_empty() {
            let neutral = FeatureRow {
                rsi: 50.0,
                stoch_k: 50.0,
                stoch_d: 50.0,
                mfi: 50.0,
                williams_r: -50.0,
                ..FeatureRow::default()
            };
            return FeatureSet {
                current: neutral,
                previous: neutral,
                earlier: neutral,
                window_len: 0,
            };
        }

        let series = self.series(candles);
        let last = candles.len() - 1;
        FeatureSet {
            current: series.row(last),
            previous: series.row(last.saturating_sub(1)),
            earlier: series.row(last.saturating_sub(2)),
            window_len: candles.len(),
        }
    }

    fn series(&self, candles: &[Candle]) -> Series {
        let p = &self.params;
        let high: Vec<f64> = candles.iter().map(Candle::high_f64).collect();
        let low: Vec<f64> = candles.iter().map(Candle::low_f64).collect();
        let close: Vec<f64> = candles.iter().map(Candle::close_f64).collect();
        let volume: Vec<f64> = candles.iter().map(Candle::volume_f64).collect();

        let (macd, macd_signal, macd_hist) =
            series::macd(&close, p.macd_fast, p.macd_slow, p.macd_signal);
        let (bb_upper, bb_middle, bb_lower) = series::bollinger(&close, p.bb_period, p.bb_k);
        let (stoch_k, stoch_d) = series::stochastic(&high, &low, &close, p.stoch_k, p.stoch_d);
        let (adx, plus_di, minus_di) = series::adx(&high, &low, &close, p.adx);
        let obv = series::on_balance_volume(&close, &volume);

        Series {
            sma_fast: series::sma(&close, p.sma_fast),
            sma_slow: series::sma(&close, p.sma_slow),
            rsi: series::rsi(&close, p.rsi),
            macd,
            macd_signal,
            macd_hist,
            bb_upper,
            bb_middle,
            bb_lower,
            stoch_k,
            stoch_d,
            williams_r: series::williams_r(&high, &low, &close, p.williams),
            volume_sma: series::sma(&volume, p.volume_sma),
            adx,
            plus_di,
            minus_di,
            psar: series::parabolic_sar(&high, &low, &close, p.psar_step, p.psar_max),
            cmf: series::chaikin_money_flow(&high, &low, &close, &volume, p.cmf),
            mfi: series::money_flow_index(&high, &low, &close, &volume, p.mfi),
            roc: series::rate_of_change(&close, p.roc),
            obv_sma: series::sma(&obv, p.obv_sma),
            obv,
            atr: series::atr(&high, &low, &close, p.atr),
            cci: series::commodity_channel_index(&high, &low, &close, p.cci),
            close,
            volume,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::prelude::FromPrimitive;
    use rust_decimal::Decimal;

    /// Candles from (close, volume) pairs with a fixed 0.5% high/low spread
    pub(crate) fn candles_from(points: &[(f64, f64)]) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        points
            .iter()
            .enumerate()
            .map(|(i, &(close, volume))| {
                let d = |v: f64| Decimal::from_f64(v).unwrap().round_dp(8);
                Candle::new(
                    start + Duration::minutes(15 * i as i64),
                    d(close),
                    d(close * 1.005),
                    d(close * 0.995),
                    d(close),
                    d(volume),
                )
            })
            .collect()
    }

    pub(crate) fn flat_candles(n: usize) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let p = Decimal::from(100);
                Candle::new(
                    start + Duration::minutes(15 * i as i64),
                    p,
                    p,
                    p,
                    p,
                    Decimal::from(10),
                )
            })
            .collect()
    }

    #[test]
    fn test_empty_window_is_neutral() {
        let set = FeatureProvider::default().compute(&[]);
        assert_eq!(set.current.rsi, 50.0);
        assert_eq!(set.current.williams_r, -50.0);
        assert!(!set.is_warm());
    }

    #[test]
    fn test_short_window_uses_placeholders() {
        let set = FeatureProvider::default().compute(&flat_candles(3));
        assert_eq!(set.window_len, 3);
        assert_eq!(set.current.rsi, 50.0);
        assert_eq!(set.current.stoch_k, 50.0);
        assert_eq!(set.current.sma_slow, 100.0);
        assert_eq!(set.current.bb_lower, 100.0);
    }

    #[test]
    fn test_all_fields_finite() {
        let points: Vec<(f64, f64)> = (0..150)
            .map(|i| (100.0 + (i as f64 * 0.3).sin() * 5.0, 10.0 + (i % 7) as f64))
            .collect();
        let set = FeatureProvider::default().compute(&candles_from(&points));
        let r = set.current;
        for v in [
            r.sma_fast, r.sma_slow, r.rsi, r.macd, r.macd_signal, r.bb_upper, r.bb_lower,
            r.stoch_k, r.williams_r, r.adx, r.psar, r.cmf, r.mfi, r.roc, r.obv_sma, r.atr, r.cci,
        ] {
            assert!(v.is_finite());
        }
        assert!(set.is_warm());
    }

    #[test]
    fn test_compute_is_pure() {
        let points: Vec<(f64, f64)> = (0..80).map(|i| (50.0 + i as f64, 5.0)).collect();
        let candles = candles_from(&points);
        let provider = FeatureProvider::default();
        assert_eq!(provider.compute(&candles), provider.compute(&candles));
    }
}
