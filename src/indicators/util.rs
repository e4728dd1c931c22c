// =============================================================================
// Shared indicator plumbing — validation, alignment and rolling windows
// =============================================================================
//
// Every indicator returns a series aligned with its input: element `i` of the
// output belongs to bar `i`, and bars inside the lookback are `NaN`.
//
// Two rolling flavours exist:
//   * full windows   — `NaN` until `period` values have been seen.
//   * partial windows — the statistic is taken over whatever finite values the
//     window currently holds (pandas `min_periods=0`); used by the channel and
//     volume indicators that start producing values from the very first bar.

use crate::error::{AnalysisError, Result};

/// Validate a single-series input against a period.
pub fn require(data: &[f64], name: &'static str, period: usize) -> Result<()> {
    if data.is_empty() {
        return Err(AnalysisError::EmptyInput);
    }
    check_period(name, period)?;
    if period > data.len() {
        return Err(AnalysisError::InsufficientData {
            period,
            len: data.len(),
        });
    }
    Ok(())
}

/// Reject a zero period.
pub fn check_period(name: &'static str, period: usize) -> Result<()> {
    if period == 0 {
        return Err(AnalysisError::InvalidPeriod { name, value: period });
    }
    Ok(())
}

/// Ensure every parallel input has the same length and is non-empty. Returns
/// the common length.
pub fn check_lengths(series: &[&[f64]]) -> Result<usize> {
    let expected = series.first().map_or(0, |s| s.len());
    for s in series {
        if s.len() != expected {
            return Err(AnalysisError::LengthMismatch {
                expected,
                found: s.len(),
            });
        }
    }
    if expected == 0 {
        return Err(AnalysisError::EmptyInput);
    }
    Ok(expected)
}

pub fn nan_vec(len: usize) -> Vec<f64> {
    vec![f64::NAN; len]
}

/// Index of the first finite value, if any.
pub fn first_valid(data: &[f64]) -> Option<usize> {
    data.iter().position(|v| v.is_finite())
}

/// Run `f` on the part of `data` after its leading `NaN`s and re-align the
/// result to the full length. Used to chain smoothers (EMA of EMA, ...).
pub fn after_warmup<F>(data: &[f64], f: F) -> Result<Vec<f64>>
where
    F: FnOnce(&[f64]) -> Result<Vec<f64>>,
{
    let start = first_valid(data).ok_or(AnalysisError::EmptyInput)?;
    let tail = f(&data[start..])?;
    let mut out = nan_vec(start);
    out.extend(tail);
    Ok(out)
}

/// Element-wise combination of two aligned series; `NaN` propagates.
pub fn zip_with<F>(a: &[f64], b: &[f64], f: F) -> Vec<f64>
where
    F: Fn(f64, f64) -> f64,
{
    a.iter().zip(b).map(|(&x, &y)| f(x, y)).collect()
}

/// Division that yields `fallback` for a zero denominator.
pub fn safe_div(num: f64, den: f64, fallback: f64) -> f64 {
    if den == 0.0 {
        fallback
    } else {
        num / den
    }
}

/// `x[t] - x[t - lag]`, `NaN` for the first `lag` elements.
pub fn diff(data: &[f64], lag: usize) -> Vec<f64> {
    let mut out = nan_vec(data.len());
    for i in lag..data.len() {
        out[i] = data[i] - data[i - lag];
    }
    out
}

/// `x[t - lag]`, `NaN` for the first `lag` elements.
pub fn shift(data: &[f64], lag: usize) -> Vec<f64> {
    let mut out = nan_vec(data.len());
    for i in lag..data.len() {
        out[i] = data[i - lag];
    }
    out
}

// -----------------------------------------------------------------------------
// Full-window rolling statistics
// -----------------------------------------------------------------------------

/// Apply `f` to each complete window of `period` values.
pub fn rolling<F>(data: &[f64], period: usize, f: F) -> Vec<f64>
where
    F: Fn(&[f64]) -> f64,
{
    let mut out = nan_vec(data.len());
    if period == 0 || period > data.len() {
        return out;
    }
    for end in period..=data.len() {
        out[end - 1] = f(&data[end - period..end]);
    }
    out
}

pub fn rolling_sum(data: &[f64], period: usize) -> Vec<f64> {
    rolling(data, period, |w| w.iter().sum())
}

pub fn rolling_max(data: &[f64], period: usize) -> Vec<f64> {
    rolling(data, period, |w| w.iter().copied().fold(f64::NEG_INFINITY, f64::max))
}

pub fn rolling_min(data: &[f64], period: usize) -> Vec<f64> {
    rolling(data, period, |w| w.iter().copied().fold(f64::INFINITY, f64::min))
}

// -----------------------------------------------------------------------------
// Partial-window rolling statistics
// -----------------------------------------------------------------------------

/// Apply `f` to the finite values of each trailing window of at most `period`
/// elements. Windows without a single finite value yield `NaN`.
pub fn rolling_partial<F>(data: &[f64], period: usize, f: F) -> Vec<f64>
where
    F: Fn(&[f64]) -> f64,
{
    let mut out = nan_vec(data.len());
    let mut buf = Vec::with_capacity(period);
    for i in 0..data.len() {
        let start = (i + 1).saturating_sub(period);
        buf.clear();
        buf.extend(data[start..=i].iter().copied().filter(|v| v.is_finite()));
        if !buf.is_empty() {
            out[i] = f(&buf);
        }
    }
    out
}

pub fn partial_mean(data: &[f64], period: usize) -> Vec<f64> {
    rolling_partial(data, period, |w| w.iter().sum::<f64>() / w.len() as f64)
}

pub fn partial_sum(data: &[f64], period: usize) -> Vec<f64> {
    rolling_partial(data, period, |w| w.iter().sum())
}

pub fn partial_max(data: &[f64], period: usize) -> Vec<f64> {
    rolling_partial(data, period, |w| {
        w.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    })
}

pub fn partial_min(data: &[f64], period: usize) -> Vec<f64> {
    rolling_partial(data, period, |w| w.iter().copied().fold(f64::INFINITY, f64::min))
}

// -----------------------------------------------------------------------------
// NaN-skipping descriptive statistics
// -----------------------------------------------------------------------------

pub fn finite(data: &[f64]) -> Vec<f64> {
    data.iter().copied().filter(|v| v.is_finite()).collect()
}

pub fn nan_mean(data: &[f64]) -> f64 {
    let vals = finite(data);
    if vals.is_empty() {
        return f64::NAN;
    }
    vals.iter().sum::<f64>() / vals.len() as f64
}

/// Standard deviation over finite values with `ddof` delta degrees of freedom.
pub fn nan_std(data: &[f64], ddof: usize) -> f64 {
    nan_var(data, ddof).sqrt()
}

pub fn nan_var(data: &[f64], ddof: usize) -> f64 {
    let vals = finite(data);
    if vals.len() <= ddof {
        return f64::NAN;
    }
    let mean = vals.iter().sum::<f64>() / vals.len() as f64;
    vals.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (vals.len() - ddof) as f64
}

/// Linear-interpolated percentile (`q` in 0..=100) of the finite values.
pub fn percentile(data: &[f64], q: f64) -> f64 {
    let mut vals = finite(data);
    if vals.is_empty() {
        return f64::NAN;
    }
    vals.sort_by(|a, b| a.total_cmp(b));
    let rank = (q / 100.0) * (vals.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    vals[lo] + (vals[hi] - vals[lo]) * frac
}

// -----------------------------------------------------------------------------
// Exponentially weighted mean (pandas `ewm(...).mean()` semantics)
// -----------------------------------------------------------------------------

/// Exponentially weighted mean with smoothing factor `alpha`.
///
/// With `adjust == true` each output is the normalised weighted sum
/// `Σ (1-α)^i x_{t-i} / Σ (1-α)^i`; otherwise the recursive form
/// `y_t = (1-α) y_{t-1} + α x_t` is used. `NaN` observations are skipped but
/// still age the weights. Outputs are `NaN` until `min_periods` finite values
/// have been seen.
pub fn ewm_mean(data: &[f64], alpha: f64, adjust: bool, min_periods: usize) -> Vec<f64> {
    let mut out = nan_vec(data.len());
    if data.is_empty() {
        return out;
    }
    let min_periods = min_periods.max(1);
    let old_wt_factor = 1.0 - alpha;
    let new_wt = if adjust { 1.0 } else { alpha };

    let mut weighted_avg = data[0];
    let mut nobs = usize::from(data[0].is_finite());
    let mut old_wt = 1.0;
    if nobs >= min_periods {
        out[0] = weighted_avg;
    }

    for i in 1..data.len() {
        let cur = data[i];
        let is_obs = cur.is_finite();
        nobs += usize::from(is_obs);

        if weighted_avg.is_finite() {
            old_wt *= old_wt_factor;
            if is_obs {
                if weighted_avg != cur {
                    weighted_avg = (old_wt * weighted_avg + new_wt * cur) / (old_wt + new_wt);
                }
                if adjust {
                    old_wt += new_wt;
                } else {
                    old_wt = 1.0;
                }
            }
        } else if is_obs {
            weighted_avg = cur;
        }

        if nobs >= min_periods {
            out[i] = weighted_avg;
        }
    }
    out
}

/// `alpha` for a span-parameterised EWM: `2 / (span + 1)`.
pub fn span_alpha(span: usize) -> f64 {
    2.0 / (span as f64 + 1.0)
}

#[cfg(test)]
pub(crate) fn assert_close(a: f64, b: f64) {
    assert!((a - b).abs() < 1e-9, "got {a}, expected {b}");
}
