// =============================================================================
// Risk-adjusted performance metrics
// =============================================================================
//
// Ratios follow the usual conventions for periodic simple returns:
// population statistics unless noted, missing observations skipped, and
// `NaN` where the metric is undefined (no losses, no drawdown, too few
// observations). Only malformed inputs are errors.

use tracing::debug;

use super::returns::{annualized_return, check_annual_length, clean, daily_returns};
use crate::error::{AnalysisError, Result};
use crate::indicators::util::{check_lengths, nan_mean, nan_std, percentile};
use crate::types::ReturnsPeriod;

/// Worst peak-to-trough decline of the compounded wealth curve, as a
/// non-positive fraction. The starting wealth counts as the first peak.
pub fn max_drawdown(returns: &[f64]) -> f64 {
    let mut wealth = 1.0_f64;
    let mut peak = 1.0_f64;
    let mut worst = 0.0_f64;
    for &r in returns.iter().filter(|r| r.is_finite()) {
        wealth *= 1.0 + r;
        peak = peak.max(wealth);
        worst = worst.min(wealth / peak - 1.0);
    }
    worst
}

/// `sqrt(n) * mean / std` with the population standard deviation.
pub fn sharpe_ratio(returns: &[f64]) -> Result<f64> {
    if returns.is_empty() {
        return Err(AnalysisError::EmptyInput);
    }
    let n = returns.len() as f64;
    Ok(n.sqrt() * nan_mean(returns) / nan_std(returns, 0))
}

/// Sharpe ratio of the daily changes of one year of prices.
pub fn annual_sharpe_ratio(prices: &[f64]) -> Result<f64> {
    check_annual_length(prices)?;
    let dr = daily_returns(prices)?;
    let n = prices.len() as f64;
    Ok(n.sqrt() * nan_mean(&dr) / nan_std(&dr, 0))
}

/// Annualized root-mean-square of the shortfall below `required_return`.
pub fn downside_risk(
    returns: &[f64],
    required_return: f64,
    period: ReturnsPeriod,
    annualization: Option<f64>,
) -> f64 {
    let ann = period.resolve(annualization);
    let shortfall: Vec<f64> = returns
        .iter()
        .map(|r| (r - required_return).min(0.0).powi(2))
        .collect();
    nan_mean(&shortfall).sqrt() * ann.sqrt()
}

/// Annualized mean excess return over downside risk. `NaN` for fewer than
/// two observations, `+inf` when nothing falls below the requirement.
pub fn sortino_ratio(
    returns: &[f64],
    required_return: f64,
    period: ReturnsPeriod,
    annualization: Option<f64>,
) -> f64 {
    if returns.len() < 2 {
        return f64::NAN;
    }
    let ann = period.resolve(annualization);
    let excess: Vec<f64> = returns.iter().map(|r| r - required_return).collect();
    let mean_annual = nan_mean(&excess) * ann;
    mean_annual / downside_risk(returns, required_return, period, annualization)
}

/// Annualized return over the absolute max drawdown. `NaN` without drawdown.
pub fn calmar_ratio(
    returns: &[f64],
    period: ReturnsPeriod,
    annualization: Option<f64>,
) -> Result<f64> {
    let dd = max_drawdown(returns);
    if dd >= 0.0 {
        return Ok(f64::NAN);
    }
    let ratio = annualized_return(returns, period, annualization)? / dd.abs();
    Ok(if ratio.is_finite() { ratio } else { f64::NAN })
}

/// Probability-weighted gains over losses around a threshold derived from an
/// annual `required_return`. `NaN` when nothing falls below the threshold.
pub fn omega_ratio(
    returns: &[f64],
    risk_free: f64,
    required_return: f64,
    annualization: f64,
) -> f64 {
    if returns.len() < 2 || required_return <= -1.0 {
        return f64::NAN;
    }
    let threshold = if annualization == 1.0 {
        required_return
    } else {
        (1.0 + required_return).powf(1.0 / annualization) - 1.0
    };

    let (gains, losses) = returns
        .iter()
        .filter(|r| r.is_finite())
        .map(|r| r - risk_free - threshold)
        .fold((0.0, 0.0), |(g, l), d| {
            if d > 0.0 {
                (g + d, l)
            } else {
                (g, l - d)
            }
        });

    if losses > 0.0 {
        gains / losses
    } else {
        f64::NAN
    }
}

/// `|p95| / |p5|` of the return distribution.
pub fn tail_ratio(returns: &[f64]) -> f64 {
    let values = clean(returns);
    if values.is_empty() {
        return f64::NAN;
    }
    percentile(&values, 95.0).abs() / percentile(&values, 5.0).abs()
}

fn excess_pairs(returns: &[f64], benchmark: &[f64], risk_free: f64) -> Result<Vec<(f64, f64)>> {
    check_lengths(&[returns, benchmark])?;
    Ok(returns
        .iter()
        .zip(benchmark)
        .filter(|(r, b)| r.is_finite() && b.is_finite())
        .map(|(r, b)| (r - risk_free, b - risk_free))
        .collect())
}

/// Sensitivity of excess returns to excess benchmark returns
/// (population covariance over benchmark variance).
pub fn beta(returns: &[f64], benchmark: &[f64], risk_free: f64) -> Result<f64> {
    let pairs = excess_pairs(returns, benchmark, risk_free)?;
    Ok(beta_of(&pairs))
}

fn beta_of(pairs: &[(f64, f64)]) -> f64 {
    if pairs.len() < 2 {
        return f64::NAN;
    }
    let n = pairs.len() as f64;
    let mean_b = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let cov = pairs.iter().map(|(r, b)| (b - mean_b) * r).sum::<f64>() / n;
    let var = pairs.iter().map(|(_, b)| (b - mean_b).powi(2)).sum::<f64>() / n;
    if var < 1e-30 {
        f64::NAN
    } else {
        cov / var
    }
}

/// Annualized Jensen's alpha: `(1 + mean(excess_r - beta * excess_b))^ann - 1`.
pub fn alpha(
    returns: &[f64],
    benchmark: &[f64],
    risk_free: f64,
    period: ReturnsPeriod,
    annualization: Option<f64>,
) -> Result<f64> {
    let pairs = excess_pairs(returns, benchmark, risk_free)?;
    let b = beta_of(&pairs);
    if pairs.is_empty() || b.is_nan() {
        return Ok(f64::NAN);
    }
    let ann = period.resolve(annualization);
    let residual = pairs.iter().map(|(r, m)| r - b * m).sum::<f64>() / pairs.len() as f64;
    Ok((1.0 + residual).powf(ann) - 1.0)
}

/// Excess return over the benchmark per unit of (sample) volatility, both
/// scaled by the series length.
pub fn information_ratio(returns: &[f64], benchmark: &[f64]) -> Result<f64> {
    let n = check_lengths(&[returns, benchmark])? as f64;
    let diff = (nan_mean(returns) - nan_mean(benchmark)) * n;
    Ok(diff / (nan_std(returns, 1) * n.sqrt()))
}

/// Historical value at risk: the `100 - confidence` percentile of returns.
pub fn value_at_risk(returns: &[f64], confidence: f64) -> Result<f64> {
    if !(confidence > 0.0 && confidence < 100.0) {
        return Err(AnalysisError::InvalidArgument(format!(
            "confidence level must lie in (0, 100), got {confidence}"
        )));
    }
    if clean(returns).is_empty() {
        return Err(AnalysisError::EmptyInput);
    }
    debug!(confidence, len = returns.len(), "computing value at risk");
    Ok(percentile(returns, 100.0 - confidence))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::util::assert_close;

    const R: [f64; 6] = [0.02, -0.01, 0.03, -0.02, 0.01, 0.0];

    #[test]
    fn drawdown_tracks_running_peak() {
        // wealth: 1.1, 0.99, 1.188 -> worst 0.99 / 1.1 - 1
        assert_close(max_drawdown(&[0.1, -0.1, 0.2]), 0.99 / 1.1 - 1.0);
        // first return below the starting wealth counts too
        assert_close(max_drawdown(&[-0.5, 0.1]), -0.5);
        assert_eq!(max_drawdown(&[0.1, 0.1]), 0.0);
        assert_eq!(max_drawdown(&[]), 0.0);
    }

    #[test]
    fn sharpe_uses_population_std() {
        let r = [0.01, 0.03];
        // mean 0.02, population std 0.01
        assert_close(sharpe_ratio(&r).unwrap(), 2f64.sqrt() * 2.0);
        assert!(sharpe_ratio(&[]).is_err());
    }

    #[test]
    fn downside_and_sortino() {
        // shortfalls: -0.01, -0.02 -> mean square (0.0001 + 0.0004) / 6
        let expected_dr = (0.0005f64 / 6.0).sqrt() * 252f64.sqrt();
        assert_close(downside_risk(&R, 0.0, ReturnsPeriod::Daily, None), expected_dr);

        let mean = R.iter().sum::<f64>() / 6.0;
        assert_close(
            sortino_ratio(&R, 0.0, ReturnsPeriod::Daily, None),
            mean * 252.0 / expected_dr,
        );
        assert!(sortino_ratio(&[0.01], 0.0, ReturnsPeriod::Daily, None).is_nan());
        assert_eq!(
            sortino_ratio(&[0.01, 0.02], 0.0, ReturnsPeriod::Daily, None),
            f64::INFINITY
        );
    }

    #[test]
    fn calmar_needs_a_drawdown() {
        assert!(calmar_ratio(&[0.01, 0.02], ReturnsPeriod::Daily, None)
            .unwrap()
            .is_nan());
        let r = [0.1, -0.1, 0.2];
        let expected = annualized_return(&r, ReturnsPeriod::Yearly, None).unwrap()
            / max_drawdown(&r).abs();
        assert_close(calmar_ratio(&r, ReturnsPeriod::Yearly, None).unwrap(), expected);
    }

    #[test]
    fn omega_splits_gains_and_losses() {
        // annualization 1 keeps the threshold at 0
        assert_close(omega_ratio(&R, 0.0, 0.0, 1.0), 0.06 / 0.03);
        assert!(omega_ratio(&[0.01, 0.02], 0.0, 0.0, 252.0).is_nan());
        assert!(omega_ratio(&R, 0.0, -1.5, 252.0).is_nan());
    }

    #[test]
    fn tail_ratio_of_symmetric_returns_is_one() {
        let r: Vec<f64> = (-50..=50).map(|i| i as f64 / 1000.0).collect();
        assert_close(tail_ratio(&r), 1.0);
        assert!(tail_ratio(&[]).is_nan());
    }

    #[test]
    fn beta_and_alpha() {
        let bench = [0.01, -0.02, 0.015, 0.0, -0.01];
        let r: Vec<f64> = bench.iter().map(|b| 2.0 * b + 0.001).collect();
        assert_close(beta(&r, &bench, 0.0).unwrap(), 2.0);
        let a = alpha(&r, &bench, 0.0, ReturnsPeriod::Daily, None).unwrap();
        assert_close(a, 1.001f64.powf(252.0) - 1.0);
        assert!(beta(&r, &bench[..3], 0.0).is_err());
        assert!(beta(&[0.1, 0.2], &[0.05, 0.05], 0.0).unwrap().is_nan());
    }

    #[test]
    fn information_ratio_matches_definition() {
        let r = [0.02, 0.0, 0.01];
        let b = [0.01, 0.0, 0.0];
        let n = 3.0f64;
        let diff = (0.01 - 0.01 / 3.0) * n;
        let std = (((0.01f64).powi(2) * 2.0) / 2.0).sqrt();
        assert_close(information_ratio(&r, &b).unwrap(), diff / (std * n.sqrt()));
    }

    #[test]
    fn var_picks_lower_percentile() {
        let r: Vec<f64> = (0..101).map(|i| i as f64 / 100.0 - 0.5).collect();
        assert_close(value_at_risk(&r, 95.0).unwrap(), -0.45);
        assert!(value_at_risk(&r, 0.0).is_err());
        assert!(value_at_risk(&r, 100.0).is_err());
        assert!(value_at_risk(&[], 95.0).is_err());
    }
}
