// =============================================================================
// Price transforms
// =============================================================================

use super::util::check_lengths;
use crate::error::Result;

/// `(open + high + low + close) / 4`
pub fn average_price(open: &[f64], high: &[f64], low: &[f64], close: &[f64]) -> Result<Vec<f64>> {
    let n = check_lengths(&[open, high, low, close])?;
    Ok((0..n)
        .map(|i| (open[i] + high[i] + low[i] + close[i]) / 4.0)
        .collect())
}

/// `(high + low) / 2`
pub fn median_price(high: &[f64], low: &[f64]) -> Result<Vec<f64>> {
    let n = check_lengths(&[high, low])?;
    Ok((0..n).map(|i| (high[i] + low[i]) / 2.0).collect())
}

/// `(high + low + close) / 3`
pub fn typical_price(high: &[f64], low: &[f64], close: &[f64]) -> Result<Vec<f64>> {
    let n = check_lengths(&[high, low, close])?;
    Ok((0..n).map(|i| (high[i] + low[i] + close[i]) / 3.0).collect())
}

/// `(high + low + 2 * close) / 4`
pub fn weighted_close_price(high: &[f64], low: &[f64], close: &[f64]) -> Result<Vec<f64>> {
    let n = check_lengths(&[high, low, close])?;
    Ok((0..n)
        .map(|i| (high[i] + low[i] + 2.0 * close[i]) / 4.0)
        .collect())
}
