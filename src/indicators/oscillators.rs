// =============================================================================
// Momentum oscillators
// =============================================================================
//
// Stochastic, Williams %R, Ultimate, APO/PPO, Awesome, TSI, MACD, CCI, BOP,
// DPO, KST, Coppock, Mass Index, Aroon and the Vertical Horizontal Filter.
//
// Window conventions differ between indicators and are noted on each function;
// they mirror the reference definitions each indicator is usually quoted with.

use serde::Serialize;
use tracing::debug;

use super::ema::ema;
use super::moving_average::ma;
use super::util::{
    check_lengths, check_period, diff, ewm_mean, nan_mean, nan_vec, partial_mean, partial_sum, require,
    rolling, rolling_max, rolling_min, safe_div, shift, span_alpha, zip_with,
};
use crate::error::{AnalysisError, Result};
use crate::types::MaType;

// -----------------------------------------------------------------------------
// Range oscillators
// -----------------------------------------------------------------------------

/// Raw stochastic %K over full windows. A flat window yields `NaN`.
pub fn stochastic_oscillator(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    period: usize,
) -> Result<Vec<f64>> {
    check_lengths(&[high, low, close])?;
    require(close, "period", period)?;

    let hh = rolling_max(high, period);
    let ll = rolling_min(low, period);
    Ok((0..close.len())
        .map(|i| {
            let range = hh[i] - ll[i];
            if range == 0.0 {
                f64::NAN
            } else {
                ((close[i] - ll[i]) / range * 100.0).clamp(0.0, 100.0)
            }
        })
        .collect())
}

/// Williams %R in [-100, 0]. A flat window yields 0.
pub fn williams_r(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Result<Vec<f64>> {
    check_lengths(&[high, low, close])?;
    require(close, "period", period)?;

    let hh = rolling_max(high, period);
    let ll = rolling_min(low, period);
    Ok((0..close.len())
        .map(|i| {
            if hh[i].is_nan() {
                f64::NAN
            } else {
                safe_div(-100.0 * (hh[i] - close[i]), hh[i] - ll[i], 0.0)
            }
        })
        .collect())
}

/// Ultimate Oscillator over three horizons. First value at the longest one.
pub fn ultimate_oscillator(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    short: usize,
    medium: usize,
    long: usize,
) -> Result<Vec<f64>> {
    let n = check_lengths(&[high, low, close])?;
    for (name, p) in [("short", short), ("medium", medium), ("long", long)] {
        check_period(name, p)?;
    }
    let longest = short.max(medium).max(long);
    require(close, "long", longest)?;

    let mut bp = vec![0.0; n];
    let mut tr = vec![0.0; n];
    for i in 1..n {
        let true_low = low[i].min(close[i - 1]);
        bp[i] = close[i] - true_low;
        tr[i] = high[i].max(close[i - 1]) - true_low;
    }

    let average = |i: usize, p: usize| {
        let range = i + 1 - p..=i;
        let b: f64 = bp[range.clone()].iter().sum();
        let t: f64 = tr[range].iter().sum();
        safe_div(b, t, 0.0)
    };

    let mut out = nan_vec(n);
    for i in longest..n {
        out[i] = 100.0 * (4.0 * average(i, short) + 2.0 * average(i, medium) + average(i, long))
            / 7.0;
    }
    Ok(out)
}

// -----------------------------------------------------------------------------
// Moving-average spreads
// -----------------------------------------------------------------------------

/// Periods given in the wrong order are swapped.
fn ordered_periods(fast: usize, slow: usize) -> (usize, usize) {
    if slow < fast {
        (slow, fast)
    } else {
        (fast, slow)
    }
}

/// Absolute Price Oscillator: `MA_fast - MA_slow`.
pub fn absolute_price_oscillator(
    data: &[f64],
    fast: usize,
    slow: usize,
    ma_type: MaType,
) -> Result<Vec<f64>> {
    let (fast, slow) = ordered_periods(fast, slow);
    let f = ma(data, fast, ma_type)?;
    let s = ma(data, slow, ma_type)?;
    Ok(zip_with(&f, &s, |a, b| a - b))
}

/// Percentage Price Oscillator: APO as a percentage of the slow MA.
pub fn percentage_price_oscillator(
    data: &[f64],
    fast: usize,
    slow: usize,
    ma_type: MaType,
) -> Result<Vec<f64>> {
    let (fast, slow) = ordered_periods(fast, slow);
    let f = ma(data, fast, ma_type)?;
    let s = ma(data, slow, ma_type)?;
    Ok(zip_with(&f, &s, |a, b| {
        if a.is_nan() || b.is_nan() {
            f64::NAN
        } else {
            safe_div(100.0 * (a - b), b, 0.0)
        }
    }))
}

/// Awesome Oscillator: partial SMA(short) - SMA(long) of the median price.
pub fn awesome_oscillator(
    high: &[f64],
    low: &[f64],
    short: usize,
    long: usize,
) -> Result<Vec<f64>> {
    check_lengths(&[high, low])?;
    require(high, "short", short)?;
    require(high, "long", long)?;
    let median = zip_with(high, low, |h, l| (h + l) / 2.0);
    Ok(zip_with(
        &partial_mean(&median, short),
        &partial_mean(&median, long),
        |a, b| a - b,
    ))
}

/// True Strength Index with span-based, adjusted exponential smoothing.
pub fn true_strength_index(data: &[f64], long: usize, short: usize) -> Result<Vec<f64>> {
    require(data, "long", long)?;
    require(data, "short", short)?;

    let m = diff(data, 1);
    let abs_m: Vec<f64> = m.iter().map(|v| v.abs()).collect();
    let smooth = |x: &[f64]| {
        let once = ewm_mean(x, span_alpha(long), true, 0);
        ewm_mean(&once, span_alpha(short), true, 0)
    };
    let num = smooth(&m);
    let den = smooth(&abs_m);
    Ok(zip_with(&num, &den, |a, b| {
        if a.is_nan() || b.is_nan() {
            f64::NAN
        } else {
            safe_div(100.0 * a, b, 0.0)
        }
    }))
}

#[derive(Debug, Clone, Serialize)]
pub struct Macd {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

/// Moving Average Convergence/Divergence.
pub fn macd(data: &[f64], fast: usize, slow: usize, signal: usize) -> Result<Macd> {
    if fast >= slow {
        return Err(AnalysisError::InvalidArgument(format!(
            "macd fast period ({fast}) must be shorter than slow period ({slow})"
        )));
    }
    debug!(fast, slow, signal, "computing MACD");

    let line = zip_with(&ema(data, fast)?, &ema(data, slow)?, |a, b| a - b);
    let signal_line = ema(&line, signal)?;
    let histogram = zip_with(&line, &signal_line, |a, b| a - b);
    Ok(Macd {
        macd: line,
        signal: signal_line,
        histogram,
    })
}

// -----------------------------------------------------------------------------
// Price-relative oscillators
// -----------------------------------------------------------------------------

/// Commodity Channel Index with the customary 0.015 constant.
pub fn commodity_channel_index(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    period: usize,
) -> Result<Vec<f64>> {
    let n = check_lengths(&[high, low, close])?;
    require(close, "period", period)?;

    let tp: Vec<f64> = (0..n).map(|i| (high[i] + low[i] + close[i]) / 3.0).collect();
    Ok(rolling(&tp, period, |w| {
        let mean = w.iter().sum::<f64>() / period as f64;
        let mean_dev = w.iter().map(|v| (v - mean).abs()).sum::<f64>() / period as f64;
        let last = w[w.len() - 1];
        safe_div(last - mean, 0.015 * mean_dev, 0.0)
    }))
}

/// Balance of Power: `(close - open) / (high - low)`.
pub fn balance_of_power(open: &[f64], high: &[f64], low: &[f64], close: &[f64]) -> Result<Vec<f64>> {
    let n = check_lengths(&[open, high, low, close])?;
    Ok((0..n)
        .map(|i| safe_div(close[i] - open[i], high[i] - low[i], 0.0))
        .collect())
}

/// Detrended Price Oscillator. The leading bars with no lagged price use the
/// series mean in its place.
pub fn detrended_price_oscillator(data: &[f64], period: usize) -> Result<Vec<f64>> {
    require(data, "period", period)?;
    let lag = period / 2 + 1;
    let mean = nan_mean(data);
    let mut lagged = shift(data, lag);
    for v in lagged.iter_mut().take(lag) {
        *v = mean;
    }
    Ok(zip_with(&lagged, &partial_mean(data, period), |a, b| a - b))
}

/// Rate-of-change periods and their smoothing windows for KST.
#[derive(Debug, Clone, Copy)]
pub struct KstParams {
    pub roc: [usize; 4],
    pub smoothing: [usize; 4],
    pub signal: usize,
}

impl Default for KstParams {
    fn default() -> Self {
        Self {
            roc: [10, 15, 20, 30],
            smoothing: [10, 10, 10, 15],
            signal: 9,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct KnowSureThing {
    pub kst: Vec<f64>,
    pub signal: Vec<f64>,
}

/// Know Sure Thing: weighted sum of four smoothed ROCs plus an SMA signal.
pub fn know_sure_thing(data: &[f64], params: &KstParams) -> Result<KnowSureThing> {
    for (&r, &s) in params.roc.iter().zip(&params.smoothing) {
        require(data, "roc", r)?;
        check_period("smoothing", s)?;
    }
    check_period("signal", params.signal)?;

    let mut kst = vec![0.0; data.len()];
    for (w, (&r, &s)) in params.roc.iter().zip(&params.smoothing).enumerate() {
        let roc = zip_with(&diff(data, r), &shift(data, r), |d, b| d / b);
        let smoothed = partial_mean(&roc, s);
        let weight = (w + 1) as f64;
        for (k, v) in kst.iter_mut().zip(&smoothed) {
            *k += weight * v;
        }
    }
    for k in kst.iter_mut() {
        *k *= 100.0;
    }

    let signal = rolling(&kst, params.signal, |w| w.iter().sum::<f64>() / w.len() as f64);
    Ok(KnowSureThing { kst, signal })
}

/// Coppock Curve: exponentially smoothed sum of two long-horizon ROCs.
pub fn coppock_curve(data: &[f64], period: usize) -> Result<Vec<f64>> {
    require(data, "period", period)?;
    let fast_lag = 11 * period / 10;
    let slow_lag = 14 * period / 10;
    if fast_lag < 2 {
        return Err(AnalysisError::InvalidPeriod {
            name: "period",
            value: period,
        });
    }
    let (fast_lag, slow_lag) = (fast_lag - 1, slow_lag - 1);

    let roc = |lag: usize| zip_with(&diff(data, lag), &shift(data, lag), |d, b| d / b);
    let total = zip_with(&roc(fast_lag), &roc(slow_lag), |a, b| a + b);
    Ok(ewm_mean(&total, span_alpha(period), true, period))
}

/// Mass Index: partial sum of the single/double EMA ratio of the bar range.
pub fn mass_index(high: &[f64], low: &[f64], short: usize, long: usize) -> Result<Vec<f64>> {
    check_lengths(&[high, low])?;
    require(high, "long", long)?;
    let range = zip_with(high, low, |h, l| h - l);
    let single = ema(&range, short)?;
    let double = ema(&single, short)?;
    let ratio = zip_with(&single, &double, |a, b| a / b);
    Ok(partial_sum(&ratio, long))
}

#[derive(Debug, Clone, Serialize)]
pub struct Aroon {
    pub down: Vec<f64>,
    pub up: Vec<f64>,
    pub oscillator: Vec<f64>,
}

/// Aroon up/down over `period + 1` bars. First value at `period`.
pub fn aroon(high: &[f64], low: &[f64], period: usize) -> Result<Aroon> {
    let n = check_lengths(&[high, low])?;
    require(high, "period", period)?;

    let mut out = Aroon {
        down: nan_vec(n),
        up: nan_vec(n),
        oscillator: nan_vec(n),
    };
    let p = period as f64;

    for i in period..n {
        let start = i - period;
        let mut hi_idx = start;
        let mut lo_idx = start;
        for j in start..=i {
            // Later bars win ties.
            if high[j] >= high[hi_idx] {
                hi_idx = j;
            }
            if low[j] <= low[lo_idx] {
                lo_idx = j;
            }
        }
        let up = 100.0 * (p - (i - hi_idx) as f64) / p;
        let down = 100.0 * (p - (i - lo_idx) as f64) / p;
        out.up[i] = up;
        out.down[i] = down;
        out.oscillator[i] = up - down;
    }
    Ok(out)
}

/// Vertical Horizontal Filter: trend vs. congestion over `period` changes.
pub fn vertical_horizontal_filter(data: &[f64], period: usize) -> Result<Vec<f64>> {
    require(data, "period", period)?;
    let mut out = nan_vec(data.len());
    for i in period..data.len() {
        let window = &data[i - period..=i];
        let hi = window.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let lo = window.iter().copied().fold(f64::INFINITY, f64::min);
        let path: f64 = window.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
        out[i] = safe_div((hi - lo).abs(), path, 0.0);
    }
    Ok(out)
}
