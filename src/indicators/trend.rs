// =============================================================================
// Trend-following studies: Parabolic SAR, Vortex, moving volatility
// =============================================================================

use serde::Serialize;
use tracing::debug;

use super::atr::bar_true_range;
use super::util::{check_lengths, nan_std, nan_vec, require, rolling, safe_div};
use crate::error::{AnalysisError, Result};

/// Wilder's Parabolic Stop-and-Reverse.
///
/// The first bar only seeds the state; the initial direction is short when
/// bar 1 shows a positive -DM and long otherwise. Each bar outputs the SAR
/// that was in force while it traded.
pub fn parabolic_sar(
    high: &[f64],
    low: &[f64],
    acceleration: f64,
    maximum: f64,
) -> Result<Vec<f64>> {
    let n = check_lengths(&[high, low])?;
    if acceleration.is_nan() || acceleration <= 0.0 || maximum < acceleration {
        return Err(AnalysisError::InvalidArgument(format!(
            "invalid SAR acceleration {acceleration} / maximum {maximum}"
        )));
    }
    debug!(acceleration, maximum, len = n, "computing Parabolic SAR");

    let mut out = nan_vec(n);
    if n < 2 {
        return Ok(out);
    }

    let up_move = high[1] - high[0];
    let down_move = low[0] - low[1];
    let mut is_long = !(down_move > up_move && down_move > 0.0);

    let mut af = acceleration;
    let (mut ep, mut sar) = if is_long {
        (high[1], low[0])
    } else {
        (low[1], high[0])
    };
    let (mut new_low, mut new_high) = (low[1], high[1]);

    for i in 1..n {
        let (prev_low, prev_high) = (new_low, new_high);
        new_low = low[i];
        new_high = high[i];

        if is_long {
            if new_low <= sar {
                // Reverse to short.
                is_long = false;
                sar = ep.max(prev_high).max(new_high);
                out[i] = sar;
                af = acceleration;
                ep = new_low;
                sar = (sar + af * (ep - sar)).max(prev_high).max(new_high);
            } else {
                out[i] = sar;
                if new_high > ep {
                    ep = new_high;
                    af = (af + acceleration).min(maximum);
                }
                sar = (sar + af * (ep - sar)).min(prev_low).min(new_low);
            }
        } else if new_high >= sar {
            // Reverse to long.
            is_long = true;
            sar = ep.min(prev_low).min(new_low);
            out[i] = sar;
            af = acceleration;
            ep = new_high;
            sar = (sar + af * (ep - sar)).min(prev_low).min(new_low);
        } else {
            out[i] = sar;
            if new_low < ep {
                ep = new_low;
                af = (af + acceleration).min(maximum);
            }
            sar = (sar + af * (ep - sar)).max(prev_high).max(new_high);
        }
    }
    Ok(out)
}

#[derive(Debug, Clone, Serialize)]
pub struct Vortex {
    pub positive: Vec<f64>,
    pub negative: Vec<f64>,
}

/// Vortex Indicator over `period` bar transitions. First value at `period`.
pub fn vortex_indicator(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    period: usize,
) -> Result<Vortex> {
    let n = check_lengths(&[high, low, close])?;
    require(close, "period", period)?;

    let mut vm_plus = vec![0.0; n];
    let mut vm_minus = vec![0.0; n];
    let mut tr = vec![0.0; n];
    for i in 1..n {
        vm_plus[i] = (high[i] - low[i - 1]).abs();
        vm_minus[i] = (low[i] - high[i - 1]).abs();
        tr[i] = bar_true_range(high[i], low[i], close[i - 1]);
    }

    let mut out = Vortex {
        positive: nan_vec(n),
        negative: nan_vec(n),
    };
    for i in period..n {
        let range = i + 1 - period..=i;
        let tr_sum: f64 = tr[range.clone()].iter().sum();
        out.positive[i] = safe_div(vm_plus[range.clone()].iter().sum(), tr_sum, 0.0);
        out.negative[i] = safe_div(vm_minus[range].iter().sum(), tr_sum, 0.0);
    }
    Ok(out)
}

/// Rolling sample standard deviation of returns scaled by `sqrt(period)`.
pub fn moving_volatility(returns: &[f64], period: usize) -> Result<Vec<f64>> {
    require(returns, "period", period)?;
    let scale = (period as f64).sqrt();
    Ok(rolling(returns, period, |w| nan_std(w, 1) * scale))
}
