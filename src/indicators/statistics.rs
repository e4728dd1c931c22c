// =============================================================================
// Statistical functions
// =============================================================================
//
// Whole-series statistics (sample std/variance, skewness, kurtosis) skip NaN.
// Rolling statistics use full windows of `period` values.
//
// The linear-regression family fits y = b + m*x by ordinary least squares on
// x = 0..period-1 inside each window:
//   LINEARREG           = b + m*(period - 1)   (fitted value at the last bar)
//   LINEARREG_SLOPE     = m
//   LINEARREG_INTERCEPT = b
//   LINEARREG_ANGLE     = atan(m) in degrees
//   TSF                 = b + m*period         (one-bar-ahead forecast)

use super::util::{check_lengths, finite, nan_var, nan_vec, require, rolling};
use crate::error::{AnalysisError, Result};

/// Sample standard deviation (n - 1).
pub fn standard_deviation(data: &[f64]) -> Result<f64> {
    Ok(variance(data)?.sqrt())
}

/// Sample variance (n - 1).
pub fn variance(data: &[f64]) -> Result<f64> {
    if data.is_empty() {
        return Err(AnalysisError::EmptyInput);
    }
    Ok(nan_var(data, 1))
}

/// Rolling population standard deviation multiplied by `nbdev`.
pub fn moving_standard_deviation(data: &[f64], period: usize, nbdev: f64) -> Result<Vec<f64>> {
    require(data, "period", period)?;
    Ok(rolling(data, period, |w| population_variance(w).sqrt() * nbdev))
}

/// Rolling population variance.
pub fn moving_variance(data: &[f64], period: usize) -> Result<Vec<f64>> {
    require(data, "period", period)?;
    Ok(rolling(data, period, population_variance))
}

fn population_variance(w: &[f64]) -> f64 {
    let n = w.len() as f64;
    let mean = w.iter().sum::<f64>() / n;
    w.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}

/// Rolling Pearson correlation between two series. A window with zero
/// variance on either side yields 0.
pub fn correlation_coefficient(a: &[f64], b: &[f64], period: usize) -> Result<Vec<f64>> {
    let n = check_lengths(&[a, b])?;
    require(a, "period", period)?;

    let mut out = nan_vec(n);
    let p = period as f64;
    for end in period..=n {
        let (wa, wb) = (&a[end - period..end], &b[end - period..end]);
        let mean_a = wa.iter().sum::<f64>() / p;
        let mean_b = wb.iter().sum::<f64>() / p;
        let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
        for (x, y) in wa.iter().zip(wb) {
            let (dx, dy) = (x - mean_a, y - mean_b);
            cov += dx * dy;
            var_a += dx * dx;
            var_b += dy * dy;
        }
        let denom = (var_a * var_b).sqrt();
        out[end - 1] = if denom == 0.0 { 0.0 } else { cov / denom };
    }
    Ok(out)
}

/// Slope and intercept of each rolling OLS window.
fn rolling_ols(data: &[f64], period: usize) -> Result<Vec<Option<(f64, f64)>>> {
    require(data, "period", period)?;
    if period < 2 {
        return Err(AnalysisError::InvalidPeriod {
            name: "period",
            value: period,
        });
    }

    let p = period as f64;
    let sum_x = p * (p - 1.0) / 2.0;
    let sum_xx = (p - 1.0) * p * (2.0 * p - 1.0) / 6.0;
    let divisor = p * sum_xx - sum_x * sum_x;

    let mut out = vec![None; data.len()];
    for end in period..=data.len() {
        let w = &data[end - period..end];
        let sum_y: f64 = w.iter().sum();
        let sum_xy: f64 = w.iter().enumerate().map(|(i, y)| i as f64 * y).sum();
        let slope = (p * sum_xy - sum_x * sum_y) / divisor;
        let intercept = (sum_y - slope * sum_x) / p;
        if slope.is_finite() && intercept.is_finite() {
            out[end - 1] = Some((slope, intercept));
        }
    }
    Ok(out)
}

fn map_ols<F>(data: &[f64], period: usize, f: F) -> Result<Vec<f64>>
where
    F: Fn(f64, f64) -> f64,
{
    Ok(rolling_ols(data, period)?
        .into_iter()
        .map(|fit| fit.map_or(f64::NAN, |(m, b)| f(m, b)))
        .collect())
}

pub fn linear_regression(data: &[f64], period: usize) -> Result<Vec<f64>> {
    let last_x = (period as f64) - 1.0;
    map_ols(data, period, |m, b| b + m * last_x)
}

pub fn linear_regression_slope(data: &[f64], period: usize) -> Result<Vec<f64>> {
    map_ols(data, period, |m, _| m)
}

pub fn linear_regression_intercept(data: &[f64], period: usize) -> Result<Vec<f64>> {
    map_ols(data, period, |_, b| b)
}

/// Regression slope expressed as an angle in degrees.
pub fn linear_regression_angle(data: &[f64], period: usize) -> Result<Vec<f64>> {
    map_ols(data, period, |m, _| m.atan().to_degrees())
}

/// Time Series Forecast: the regression line projected one bar ahead.
pub fn time_series_forecast(data: &[f64], period: usize) -> Result<Vec<f64>> {
    let next_x = period as f64;
    map_ols(data, period, |m, b| b + m * next_x)
}

/// Central moment sums over the finite values: (n, Σd², Σd³, Σd⁴).
fn moment_sums(data: &[f64]) -> (usize, f64, f64, f64) {
    let vals = finite(data);
    let n = vals.len();
    if n == 0 {
        return (0, 0.0, 0.0, 0.0);
    }
    let mean = vals.iter().sum::<f64>() / n as f64;
    vals.iter().fold((n, 0.0, 0.0, 0.0), |(n, m2, m3, m4), v| {
        let d = v - mean;
        (n, m2 + d * d, m3 + d * d * d, m4 + d * d * d * d)
    })
}

/// Bias-corrected sample skewness (G1). Needs three finite values; `NaN`
/// on zero variance.
pub fn skewness(data: &[f64]) -> Result<f64> {
    let (n, m2, m3, _) = moment_sums(data);
    if n < 3 {
        return Err(AnalysisError::InsufficientData { period: 3, len: n });
    }
    if m2 == 0.0 {
        return Ok(f64::NAN);
    }
    let nf = n as f64;
    let g1 = (m3 / nf) / (m2 / nf).powf(1.5);
    Ok((nf * (nf - 1.0)).sqrt() / (nf - 2.0) * g1)
}

/// Bias-corrected excess kurtosis (G2). Needs four finite values; `NaN` on
/// zero variance.
pub fn kurtosis(data: &[f64]) -> Result<f64> {
    let (n, m2, _, m4) = moment_sums(data);
    if n < 4 {
        return Err(AnalysisError::InsufficientData { period: 4, len: n });
    }
    if m2 == 0.0 {
        return Ok(f64::NAN);
    }
    let nf = n as f64;
    let numer = nf * (nf + 1.0) * (nf - 1.0) * m4;
    let denom = (nf - 2.0) * (nf - 3.0) * m2 * m2;
    let adj = 3.0 * (nf - 1.0).powi(2) / ((nf - 2.0) * (nf - 3.0));
    Ok(numer / denom - adj)
}
