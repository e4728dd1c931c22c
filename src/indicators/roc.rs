// =============================================================================
// Rate of Change (ROC) — Momentum Indicators
// =============================================================================
//
// ROC measures the percentage change in price over a look-back period:
//   ROC     = ((close - close_n) / close_n) * 100
//   ROCP    =  (close - close_n) / close_n
//   ROCR    =   close / close_n
//   ROCR100 =  (close / close_n) * 100
//
// Positive ROC indicates upward momentum; negative indicates downward.
// A zero base price yields 0 rather than an infinity.

use serde::Serialize;

use super::ema::ema;
use super::util::{nan_vec, require};
use crate::error::Result;

/// The four ROC flavours, aligned with the input (first value at `period`).
#[derive(Debug, Clone, Serialize)]
pub struct RateOfChange {
    pub roc: Vec<f64>,
    pub rocp: Vec<f64>,
    pub rocr: Vec<f64>,
    pub rocr100: Vec<f64>,
}

/// Calculate every Rate of Change flavour for `closes` and `period`.
pub fn rate_of_change(closes: &[f64], period: usize) -> Result<RateOfChange> {
    require(closes, "period", period)?;

    let n = closes.len();
    let mut out = RateOfChange {
        roc: nan_vec(n),
        rocp: nan_vec(n),
        rocr: nan_vec(n),
        rocr100: nan_vec(n),
    };

    for i in period..n {
        let prev = closes[i - period];
        if prev == 0.0 {
            out.roc[i] = 0.0;
            out.rocp[i] = 0.0;
            out.rocr[i] = 0.0;
            out.rocr100[i] = 0.0;
            continue;
        }
        let ratio = closes[i] / prev;
        out.rocp[i] = (closes[i] - prev) / prev;
        out.roc[i] = out.rocp[i] * 100.0;
        out.rocr[i] = ratio;
        out.rocr100[i] = ratio * 100.0;
    }
    Ok(out)
}

/// Return the most recent ROC (percent) value.
pub fn current_roc(closes: &[f64], period: usize) -> Option<f64> {
    let series = rate_of_change(closes, period).ok()?.roc;
    series.last().copied().filter(|v| v.is_finite())
}

/// Momentum: `close - close_n`.
pub fn momentum(closes: &[f64], period: usize) -> Result<Vec<f64>> {
    require(closes, "period", period)?;
    Ok(super::util::diff(closes, period))
}

/// TRIX: one-bar percent change of a triple-smoothed EMA.
pub fn trix(closes: &[f64], period: usize) -> Result<Vec<f64>> {
    let e1 = ema(closes, period)?;
    let e2 = ema(&e1, period)?;
    let e3 = ema(&e2, period)?;

    let mut out = nan_vec(closes.len());
    for i in 1..e3.len() {
        let (prev, cur) = (e3[i - 1], e3[i]);
        if prev.is_nan() || cur.is_nan() {
            continue;
        }
        out[i] = if prev == 0.0 { 0.0 } else { (cur - prev) / prev * 100.0 };
    }
    Ok(out)
}
