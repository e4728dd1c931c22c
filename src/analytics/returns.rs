// =============================================================================
// Return series and return aggregates
// =============================================================================
//
// Price-based functions take a raw price series; return-based functions take
// simple periodic returns (0.01 == 1%). `NaN` observations, such as the first
// element of `daily_returns`, are skipped by every aggregate.

use tracing::debug;

use crate::error::{AnalysisError, Result};
use crate::indicators::util::{finite, nan_mean, nan_std};
use crate::types::ReturnsPeriod;

/// Accepted observation count for the annual metrics (one trading year).
pub const ANNUAL_TRADING_DAYS: std::ops::RangeInclusive<usize> = 250..=257;

pub(crate) fn check_annual_length(data: &[f64]) -> Result<()> {
    if ANNUAL_TRADING_DAYS.contains(&data.len()) {
        Ok(())
    } else {
        Err(AnalysisError::AnnualDataLength { len: data.len() })
    }
}

fn check_not_empty(data: &[f64]) -> Result<()> {
    if data.is_empty() {
        Err(AnalysisError::EmptyInput)
    } else {
        Ok(())
    }
}

/// One-period percentage change, `NaN` at index 0.
pub fn daily_returns(prices: &[f64]) -> Result<Vec<f64>> {
    check_not_empty(prices)?;
    let mut out = Vec::with_capacity(prices.len());
    out.push(f64::NAN);
    out.extend(prices.windows(2).map(|w| w[1] / w[0] - 1.0));
    Ok(out)
}

/// One-period log change in percent, `NaN` at index 0.
pub fn daily_log_returns(prices: &[f64]) -> Result<Vec<f64>> {
    check_not_empty(prices)?;
    let mut out = Vec::with_capacity(prices.len());
    out.push(f64::NAN);
    out.extend(prices.windows(2).map(|w| 100.0 * (w[1].ln() - w[0].ln())));
    Ok(out)
}

/// Compounded return up to each observation. Missing returns count as 0.
pub fn cumulative_returns(returns: &[f64]) -> Vec<f64> {
    let mut wealth = 1.0;
    returns
        .iter()
        .map(|&r| {
            if r.is_finite() {
                wealth *= 1.0 + r;
            }
            wealth - 1.0
        })
        .collect()
}

/// Total compounded return over the whole series.
pub fn cumulative_return(returns: &[f64]) -> f64 {
    cumulative_returns(returns).last().copied().unwrap_or(0.0)
}

/// Mean percentage change scaled by the number of prices, in percent.
pub fn returns(prices: &[f64]) -> Result<f64> {
    let dr = daily_returns(prices)?;
    debug!(len = prices.len(), "computing returns");
    Ok(nan_mean(&dr) * prices.len() as f64 * 100.0)
}

/// Mean daily return times the number of trading days, for one year of prices.
pub fn annual_return(prices: &[f64]) -> Result<f64> {
    check_annual_length(prices)?;
    let dr = daily_returns(prices)?;
    Ok(nan_mean(&dr) * prices.len() as f64)
}

/// Compound annual growth rate of a return series:
/// `(1 + cumulative)^(annualization / n) - 1`.
pub fn annualized_return(
    returns: &[f64],
    period: ReturnsPeriod,
    annualization: Option<f64>,
) -> Result<f64> {
    check_not_empty(returns)?;
    let ann = period.resolve(annualization);
    let years = returns.len() as f64 / ann;
    Ok((1.0 + cumulative_return(returns)).powf(1.0 / years) - 1.0)
}

/// Sample standard deviation scaled by `sqrt(n)`.
pub fn volatility(returns: &[f64]) -> Result<f64> {
    check_not_empty(returns)?;
    Ok(nan_std(returns, 1) * (returns.len() as f64).sqrt())
}

/// Population standard deviation of daily changes scaled by `sqrt(n)`, for
/// one year of prices.
pub fn annual_volatility(prices: &[f64]) -> Result<f64> {
    check_annual_length(prices)?;
    let dr = daily_returns(prices)?;
    Ok(nan_std(&dr, 0) * (prices.len() as f64).sqrt())
}

/// Growth rate in percent between two values `years` apart.
pub fn cagr(start_value: f64, end_value: f64, years: f64) -> Result<f64> {
    if !(start_value.is_finite() && start_value > 0.0) {
        return Err(AnalysisError::InvalidArgument(format!(
            "start value must be positive, got {start_value}"
        )));
    }
    if !(years.is_finite() && years > 0.0) {
        return Err(AnalysisError::InvalidArgument(format!(
            "period in years must be positive, got {years}"
        )));
    }
    if !(end_value.is_finite() && end_value >= 0.0) {
        return Err(AnalysisError::InvalidArgument(format!(
            "end value must be non-negative, got {end_value}"
        )));
    }
    Ok(((end_value / start_value).powf(1.0 / years) - 1.0) * 100.0)
}

/// Subtract a constant (e.g. a risk-free rate) from every return.
pub fn adjusted_returns(returns: &[f64], factor: f64) -> Vec<f64> {
    if factor == 0.0 {
        return returns.to_vec();
    }
    returns.iter().map(|r| r - factor).collect()
}

/// Returns with the missing observations dropped.
pub(crate) fn clean(returns: &[f64]) -> Vec<f64> {
    finite(returns)
}
