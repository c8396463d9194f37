//! Rolling indicator series
//!
//! Every function returns a vector aligned with its input. Positions
//! without enough history, or where the math degenerates (zero range,
//! zero volume), hold `f64::NAN`; the feature layer swaps those for
//! neutral values.

const NAN: f64 = f64::NAN;

fn window(values: &[f64], end: usize, period: usize) -> &[f64] {
    &values[end + 1 - period..=end]
}

/// Simple moving average
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![NAN; values.len()];
    if period == 0 {
        return out;
    }
    for i in period.saturating_sub(1)..values.len() {
        out[i] = window(values, i, period).iter().sum::<f64>() / period as f64;
    }
    out
}

/// Rolling sum
pub fn rolling_sum(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![NAN; values.len()];
    if period == 0 {
        return out;
    }
    for i in period.saturating_sub(1)..values.len() {
        out[i] = window(values, i, period).iter().sum();
    }
    out
}

/// Rolling maximum
pub fn rolling_max(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![NAN; values.len()];
    if period == 0 {
        return out;
    }
    for i in period.saturating_sub(1)..values.len() {
        out[i] = window(values, i, period)
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
    }
    out
}

/// Rolling minimum
pub fn rolling_min(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![NAN; values.len()];
    if period == 0 {
        return out;
    }
    for i in period.saturating_sub(1)..values.len() {
        out[i] = window(values, i, period)
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min);
    }
    out
}

/// Exponential smoothing seeded with the SMA of the first `period`
/// finite values. Leading NaNs are skipped.
fn smooth(values: &[f64], period: usize, alpha: f64) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![NAN; n];
    if period == 0 {
        return out;
    }
    let Some(start) = values.iter().position(|v| v.is_finite()) else {
        return out;
    };
    if n < start + period {
        return out;
    }

    let seed_end = start + period - 1;
    let mut prev = values[start..=seed_end].iter().sum::<f64>() / period as f64;
    out[seed_end] = prev;

    for i in seed_end + 1..n {
        let v = values[i];
        if v.is_finite() {
            prev += alpha * (v - prev);
            out[i] = prev;
        }
    }
    out
}

/// Exponential moving average (alpha = 2 / (period + 1))
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    smooth(values, period, 2.0 / (period as f64 + 1.0))
}

/// Wilder smoothing (alpha = 1 / period)
pub fn wilder(values: &[f64], period: usize) -> Vec<f64> {
    smooth(values, period.max(1), 1.0 / period.max(1) as f64)
}

/// 100 - 100 / (1 + up / down), with flat input mapped to the midpoint
fn ratio_index(up: f64, down: f64) -> f64 {
    if !up.is_finite() || !down.is_finite() {
        return NAN;
    }
    if down == 0.0 {
        return if up == 0.0 { 50.0 } else { 100.0 };
    }
    100.0 - 100.0 / (1.0 + up / down)
}

/// Wilder RSI
pub fn rsi(closes: &[f64], period: usize) -> Vec<f64> {
    let n = closes.len();
    let mut gains = vec![NAN; n];
    let mut losses = vec![NAN; n];
    for i in 1..n {
        let delta = closes[i] - closes[i - 1];
        gains[i] = delta.max(0.0);
        losses[i] = (-delta).max(0.0);
    }

    let avg_gain = wilder(&gains, period);
    let avg_loss = wilder(&losses, period);
    avg_gain
        .iter()
        .zip(&avg_loss)
        .map(|(&g, &l)| ratio_index(g, l))
        .collect()
}

/// MACD line, signal line and histogram
pub fn macd(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let fast_ema = ema(closes, fast);
    let slow_ema = ema(closes, slow);
    let line: Vec<f64> = fast_ema.iter().zip(&slow_ema).map(|(f, s)| f - s).collect();
    let signal_line = ema(&line, signal);
    let hist = line.iter().zip(&signal_line).map(|(m, s)| m - s).collect();
    (line, signal_line, hist)
}

/// Bollinger bands (upper, middle, lower) with population deviation
pub fn bollinger(closes: &[f64], period: usize, k: f64) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let n = closes.len();
    let middle = sma(closes, period);
    let mut upper = vec![NAN; n];
    let mut lower = vec![NAN; n];
    for i in period.saturating_sub(1)..n {
        if period == 0 || !middle[i].is_finite() {
            continue;
        }
        let mean = middle[i];
        let var = window(closes, i, period)
            .iter()
            .map(|c| (c - mean).powi(2))
            .sum::<f64>()
            / period as f64;
        let sd = var.sqrt();
        upper[i] = mean + k * sd;
        lower[i] = mean - k * sd;
    }
    (upper, middle, lower)
}

/// Stochastic oscillator %K and %D
pub fn stochastic(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    k_period: usize,
    d_period: usize,
) -> (Vec<f64>, Vec<f64>) {
    let hh = rolling_max(highs, k_period);
    let ll = rolling_min(lows, k_period);
    let k: Vec<f64> = (0..closes.len())
        .map(|i| {
            let range = hh[i] - ll[i];
            if range > 0.0 {
                100.0 * (closes[i] - ll[i]) / range
            } else {
                NAN
            }
        })
        .collect();
    let d = sma(&k, d_period);
    (k, d)
}

/// Williams %R in [-100, 0]
pub fn williams_r(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Vec<f64> {
    let hh = rolling_max(highs, period);
    let ll = rolling_min(lows, period);
    (0..closes.len())
        .map(|i| {
            let range = hh[i] - ll[i];
            if range > 0.0 {
                -100.0 * (hh[i] - closes[i]) / range
            } else {
                NAN
            }
        })
        .collect()
}

/// True range
pub fn true_range(highs: &[f64], lows: &[f64], closes: &[f64]) -> Vec<f64> {
    (0..closes.len())
        .map(|i| {
            let hl = highs[i] - lows[i];
            if i == 0 {
                return hl;
            }
            let prev = closes[i - 1];
            hl.max((highs[i] - prev).abs()).max((lows[i] - prev).abs())
        })
        .collect()
}

/// Average true range (Wilder)
pub fn atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Vec<f64> {
    wilder(&true_range(highs, lows, closes), period)
}

/// ADX, +DI and -DI (Wilder)
pub fn adx(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    period: usize,
) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let n = closes.len();
    let mut plus_dm = vec![NAN; n];
    let mut minus_dm = vec![NAN; n];
    let mut tr = vec![NAN; n];
    let full_tr = true_range(highs, lows, closes);
    for i in 1..n {
        let up = highs[i] - highs[i - 1];
        let down = lows[i - 1] - lows[i];
        plus_dm[i] = if up > down && up > 0.0 { up } else { 0.0 };
        minus_dm[i] = if down > up && down > 0.0 { down } else { 0.0 };
        tr[i] = full_tr[i];
    }

    let s_plus = wilder(&plus_dm, period);
    let s_minus = wilder(&minus_dm, period);
    let s_tr = wilder(&tr, period);

    let mut plus_di = vec![NAN; n];
    let mut minus_di = vec![NAN; n];
    let mut dx = vec![NAN; n];
    for i in 0..n {
        if s_tr[i] > 0.0 {
            plus_di[i] = 100.0 * s_plus[i] / s_tr[i];
            minus_di[i] = 100.0 * s_minus[i] / s_tr[i];
            let sum = plus_di[i] + minus_di[i];
            dx[i] = if sum > 0.0 {
                100.0 * (plus_di[i] - minus_di[i]).abs() / sum
            } else {
                0.0
            };
        }
    }
    (wilder(&dx, period), plus_di, minus_di)
}

/// Parabolic SAR
pub fn parabolic_sar(highs: &[f64], lows: &[f64], closes: &[f64], step: f64, max: f64) -> Vec<f64> {
    let n = closes.len();
    let mut out = vec![NAN; n];
    if n < 2 || highs.iter().chain(lows).chain(closes).any(|v| !v.is_finite()) {
        return out;
    }

    let mut is_long = closes[1] >= closes[0];
    let mut af = step;
    let (mut sar, mut ep) = if is_long {
        (lows[0], highs[1])
    } else {
        (highs[0], lows[1])
    };
    out[1] = sar;

    for i in 2..n {
        let mut next = sar + af * (ep - sar);
        if is_long {
            next = next.min(lows[i - 1]).min(lows[i - 2]);
            if lows[i] < next {
                is_long = false;
                next = ep;
                ep = lows[i];
                af = step;
            } else if highs[i] > ep {
                ep = highs[i];
                af = (af + step).min(max);
            }
        } else {
            next = next.max(highs[i - 1]).max(highs[i - 2]);
            if highs[i] > next {
                is_long = true;
                next = ep;
                ep = highs[i];
                af = step;
            } else if lows[i] < ep {
                ep = lows[i];
                af = (af + step).min(max);
            }
        }
        sar = next;
        out[i] = sar;
    }
    out
}

/// Chaikin money flow
pub fn chaikin_money_flow(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    volumes: &[f64],
    period: usize,
) -> Vec<f64> {
    let mfv: Vec<f64> = (0..closes.len())
        .map(|i| {
            let range = highs[i] - lows[i];
            if range > 0.0 {
                ((closes[i] - lows[i]) - (highs[i] - closes[i])) / range * volumes[i]
            } else {
                0.0
            }
        })
        .collect();
    let mfv_sum = rolling_sum(&mfv, period);
    let vol_sum = rolling_sum(volumes, period);
    mfv_sum
        .iter()
        .zip(&vol_sum)
        .map(|(&m, &v)| if v > 0.0 { m / v } else { NAN })
        .collect()
}

fn typical_price(highs: &[f64], lows: &[f64], closes: &[f64]) -> Vec<f64> {
    (0..closes.len())
        .map(|i| (highs[i] + lows[i] + closes[i]) / 3.0)
        .collect()
}

/// Money flow index
pub fn money_flow_index(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    volumes: &[f64],
    period: usize,
) -> Vec<f64> {
    let n = closes.len();
    let tp = typical_price(highs, lows, closes);
    let mut pos = vec![NAN; n];
    let mut neg = vec![NAN; n];
    for i in 1..n {
        let flow = tp[i] * volumes[i];
        pos[i] = if tp[i] > tp[i - 1] { flow } else { 0.0 };
        neg[i] = if tp[i] < tp[i - 1] { flow } else { 0.0 };
    }
    let pos_sum = rolling_sum(&pos, period);
    let neg_sum = rolling_sum(&neg, period);
    pos_sum
        .iter()
        .zip(&neg_sum)
        .map(|(&p, &q)| ratio_index(p, q))
        .collect()
}

/// Rate of change in percent
pub fn rate_of_change(closes: &[f64], period: usize) -> Vec<f64> {
    (0..closes.len())
        .map(|i| {
            if i < period || closes[i - period] == 0.0 {
                NAN
            } else {
                (closes[i] / closes[i - period] - 1.0) * 100.0
            }
        })
        .collect()
}

/// On-balance volume
pub fn on_balance_volume(closes: &[f64], volumes: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(closes.len());
    let mut total = 0.0;
    for i in 0..closes.len() {
        if i > 0 {
            if closes[i] > closes[i - 1] {
                total += volumes[i];
            } else if closes[i] < closes[i - 1] {
                total -= volumes[i];
            }
        }
        out.push(total);
    }
    out
}

/// Commodity channel index
pub fn commodity_channel_index(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    period: usize,
) -> Vec<f64> {
    let tp = typical_price(highs, lows, closes);
    let tp_sma = sma(&tp, period);
    (0..closes.len())
        .map(|i| {
            if period == 0 || i + 1 < period {
                return NAN;
            }
            let mean = tp_sma[i];
            let mean_dev = window(&tp, i, period)
                .iter()
                .map(|v| (v - mean).abs())
                .sum::<f64>()
                / period as f64;
            if mean_dev > 0.0 {
                (tp[i] - mean) / (0.015 * mean_dev)
            } else {
                NAN
            }
        })
        .collect()
}
