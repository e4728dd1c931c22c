// =============================================================================
// Exponential Moving Average (EMA) and its lag-reduced variants
// =============================================================================
//
// EMA gives more weight to recent prices, making it more responsive to new
// information than the Simple Moving Average (SMA).
//
// Formula:
//   multiplier = 2 / (period + 1)
//   EMA_t      = close_t * multiplier + EMA_{t-1} * (1 - multiplier)
//
// The very first EMA value is seeded with the SMA of the first `period` values
// and sits at index `period - 1`.
//
// DEMA = 2*EMA - EMA(EMA)                 lookback 2*(period-1)
// TEMA = 3*EMA - 3*EMA(EMA) + EMA(EMA(EMA)) lookback 3*(period-1)
// =============================================================================

use tracing::debug;

use super::util::{after_warmup, nan_vec, require, zip_with};
use crate::error::Result;

/// Compute the EMA series for `data` and look-back `period`.
///
/// Leading `NaN`s (from an upstream indicator) are skipped, so EMAs can be
/// chained. If a non-finite value shows up mid-series the remainder of the
/// output stays `NaN`; downstream consumers should not trust a broken series.
pub fn ema(data: &[f64], period: usize) -> Result<Vec<f64>> {
    debug!(period, len = data.len(), "computing EMA");
    after_warmup(data, |tail| ema_core(tail, period))
}

fn ema_core(data: &[f64], period: usize) -> Result<Vec<f64>> {
    require(data, "period", period)?;

    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut out = nan_vec(data.len());

    // Seed: SMA of the first `period` values.
    let seed: f64 = data[..period].iter().sum::<f64>() / period as f64;
    if !seed.is_finite() {
        return Ok(out);
    }
    out[period - 1] = seed;

    let mut prev = seed;
    for (i, &value) in data.iter().enumerate().skip(period) {
        let next = value * multiplier + prev * (1.0 - multiplier);
        if !next.is_finite() {
            break;
        }
        out[i] = next;
        prev = next;
    }
    Ok(out)
}

/// Double Exponential Moving Average.
pub fn dema(data: &[f64], period: usize) -> Result<Vec<f64>> {
    let e1 = ema(data, period)?;
    let e2 = ema(&e1, period)?;
    Ok(zip_with(&e1, &e2, |a, b| 2.0 * a - b))
}

/// Triple Exponential Moving Average.
pub fn tema(data: &[f64], period: usize) -> Result<Vec<f64>> {
    let e1 = ema(data, period)?;
    let e2 = ema(&e1, period)?;
    let e3 = ema(&e2, period)?;
    Ok(e1
        .iter()
        .zip(&e2)
        .zip(&e3)
        .map(|((a, b), c)| 3.0 * a - 3.0 * b + c)
        .collect())
}

/// Return the most recent EMA value, if one could be computed.
pub fn current_ema(data: &[f64], period: usize) -> Option<f64> {
    ema(data, period)
        .ok()?
        .last()
        .copied()
        .filter(|v| v.is_finite())
}
