// =============================================================================
// Relative Strength Index (RSI) family
// =============================================================================
//
// RSI measures the speed and magnitude of recent price changes to evaluate
// whether an asset is overbought or oversold.
//
// Step 1 — Compute price changes (deltas) from consecutive closes.
// Step 2 — Split deltas into gains and losses and smooth each with an EMA of
//          `period`, seeded with the SMA of the first `period` deltas.
// Step 3 — RSI = 100 * avg_gain / (avg_gain + avg_loss)
//
// Stochastic RSI runs a stochastic oscillator over the RSI line; the Chande
// Momentum Oscillator uses the same gain/loss split with Wilder's smoothing.
//
// Thresholds:  RSI >= 70 => OVERBOUGHT,  RSI <= 30 => OVERSOLD.
// =============================================================================

use serde::Serialize;
use tracing::debug;

use super::moving_average::ma;
use super::util::{after_warmup, nan_vec, require, rolling_max, rolling_min};
use crate::error::Result;
use crate::types::MaType;

/// Compute the full RSI series for `data` and `period`.
///
/// The first value sits at index `period` (the first `period` deltas seed the
/// averages). If both averages are zero (flat market) RSI is 50.
pub fn rsi(data: &[f64], period: usize) -> Result<Vec<f64>> {
    require(data, "period", period)?;
    debug!(period, len = data.len(), "computing RSI");

    let mut out = nan_vec(data.len());
    if data.len() <= period {
        return Ok(out);
    }

    let (gains, losses): (Vec<f64>, Vec<f64>) = data
        .windows(2)
        .map(|w| {
            let d = w[1] - w[0];
            (d.max(0.0), (-d).max(0.0))
        })
        .unzip();

    let period_f = period as f64;
    let k = 2.0 / (period_f + 1.0);
    let mut avg_gain = gains[..period].iter().sum::<f64>() / period_f;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period_f;

    match rsi_from_averages(avg_gain, avg_loss) {
        Some(v) => out[period] = v,
        None => return Ok(out),
    }

    for i in period..gains.len() {
        avg_gain = gains[i] * k + avg_gain * (1.0 - k);
        avg_loss = losses[i] * k + avg_loss * (1.0 - k);
        match rsi_from_averages(avg_gain, avg_loss) {
            Some(v) => out[i + 1] = v,
            None => break,
        }
    }
    Ok(out)
}

/// Convenience function: return the most recent RSI value together with a
/// human-readable label.
pub fn current_rsi(data: &[f64], period: usize) -> Option<(f64, &'static str)> {
    let series = rsi(data, period).ok()?;
    let value = series.last().copied().filter(|v| v.is_finite())?;

    let label = if value >= 70.0 {
        "OVERBOUGHT"
    } else if value <= 30.0 {
        "OVERSOLD"
    } else {
        "NEUTRAL"
    };

    Some((value, label))
}

/// Stochastic RSI output.
#[derive(Debug, Clone, Serialize)]
pub struct StochasticRsi {
    pub fast_k: Vec<f64>,
    pub fast_d: Vec<f64>,
}

/// Stochastic oscillator applied to the RSI line.
///
/// `%K = 100 * (rsi - min) / (max - min)` over `fastk_period` RSI values
/// (0 when the range collapses); `%D = MA(%K, fastd_period)`.
pub fn stochastic_rsi(
    data: &[f64],
    period: usize,
    fastk_period: usize,
    fastd_period: usize,
    fastd_ma: MaType,
) -> Result<StochasticRsi> {
    require(data, "period", period)?;
    require(data, "fastk_period", fastk_period)?;
    require(data, "fastd_period", fastd_period)?;

    let rsi_line = rsi(data, period)?;
    let fast_k = after_warmup(&rsi_line, |tail| {
        require(tail, "fastk_period", fastk_period)?;
        let hi = rolling_max(tail, fastk_period);
        let lo = rolling_min(tail, fastk_period);
        Ok(tail
            .iter()
            .zip(hi.iter().zip(&lo))
            .map(|(&v, (&h, &l))| {
                if h.is_nan() {
                    f64::NAN
                } else if h == l {
                    0.0
                } else {
                    ((v - l) / (h - l) * 100.0).clamp(0.0, 100.0)
                }
            })
            .collect())
    })?;
    let fast_d = ma(&fast_k, fastd_period, fastd_ma)?;

    Ok(StochasticRsi { fast_k, fast_d })
}

/// Chande Momentum Oscillator: `100 * (up - down) / (up + down)` with
/// Wilder-smoothed up/down moves. First value at index `period`.
pub fn chande_momentum_oscillator(data: &[f64], period: usize) -> Result<Vec<f64>> {
    require(data, "period", period)?;
    let mut out = nan_vec(data.len());
    if data.len() <= period {
        return Ok(out);
    }

    let period_f = period as f64;
    let deltas: Vec<f64> = data.windows(2).map(|w| w[1] - w[0]).collect();
    let mut up = deltas[..period].iter().map(|d| d.max(0.0)).sum::<f64>() / period_f;
    let mut down = deltas[..period].iter().map(|d| (-d).max(0.0)).sum::<f64>() / period_f;

    let cmo = |u: f64, d: f64| if u + d == 0.0 { 0.0 } else { 100.0 * (u - d) / (u + d) };
    out[period] = cmo(up, down);

    for (i, &d) in deltas.iter().enumerate().skip(period) {
        up = (up * (period_f - 1.0) + d.max(0.0)) / period_f;
        down = (down * (period_f - 1.0) + (-d).max(0.0)) / period_f;
        out[i + 1] = cmo(up, down);
    }
    Ok(out)
}

// =============================================================================
// Internal helpers
// =============================================================================

/// Convert average gain / average loss into an RSI value in [0, 100].
///
/// - If both averages are zero, RSI is 50.0 (no movement).
/// - Returns `None` when the result is non-finite.
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    let rsi = if avg_gain == 0.0 && avg_loss == 0.0 {
        50.0
    } else {
        100.0 * avg_gain / (avg_gain + avg_loss)
    };
    rsi.is_finite().then_some(rsi)
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::util::assert_close;

    fn finite_tail(v: &[f64]) -> Vec<f64> {
        v.iter().copied().filter(|x| x.is_finite()).collect()
    }

    // ---- rsi -------------------------------------------------------------

    #[test]
    fn rsi_empty_input() {
        assert!(rsi(&[], 14).is_err());
    }

    #[test]
    fn rsi_period_zero() {
        assert!(rsi(&[1.0, 2.0, 3.0], 0).is_err());
    }

    #[test]
    fn rsi_exactly_period_points_is_all_nan() {
        let closes: Vec<f64> = (1..=14).map(|x| x as f64).collect();
        let out = rsi(&closes, 14).unwrap();
        assert!(out.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn rsi_all_gains() {
        let closes: Vec<f64> = (1..=30).map(|x| x as f64).collect();
        let out = rsi(&closes, 14).unwrap();
        assert!(out[13].is_nan());
        for v in finite_tail(&out) {
            assert_close(v, 100.0);
        }
    }

    #[test]
    fn rsi_all_losses() {
        let closes: Vec<f64> = (1..=30).rev().map(|x| x as f64).collect();
        for v in finite_tail(&rsi(&closes, 14).unwrap()) {
            assert!(v.abs() < 1e-10, "expected 0.0, got {v}");
        }
    }

    #[test]
    fn rsi_flat_market() {
        let out = rsi(&[100.0; 30], 14).unwrap();
        for v in finite_tail(&out) {
            assert_close(v, 50.0);
        }
    }

    #[test]
    fn rsi_range_check() {
        let closes = vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08, 45.89,
            46.03, 44.18, 44.22, 44.57, 43.42, 42.66, 43.13,
        ];
        let out = rsi(&closes, 14).unwrap();
        assert_eq!(finite_tail(&out).len(), 4);
        for v in finite_tail(&out) {
            assert!((0.0..=100.0).contains(&v), "RSI {v} out of range");
        }
    }

    // ---- current_rsi -----------------------------------------------------

    #[test]
    fn current_rsi_labels() {
        let up: Vec<f64> = (1..=30).map(|x| x as f64).collect();
        assert_eq!(current_rsi(&up, 14).unwrap().1, "OVERBOUGHT");

        let down: Vec<f64> = (1..=30).rev().map(|x| x as f64).collect();
        assert_eq!(current_rsi(&down, 14).unwrap().1, "OVERSOLD");

        let (val, label) = current_rsi(&[100.0; 30], 14).unwrap();
        assert_close(val, 50.0);
        assert_eq!(label, "NEUTRAL");
    }

    #[test]
    fn current_rsi_none_on_bad_input() {
        assert!(current_rsi(&[], 14).is_none());
    }

    // ---- stochastic rsi --------------------------------------------------

    #[test]
    fn stochastic_rsi_bounds() {
        let closes: Vec<f64> = (0..80).map(|i| 50.0 + (i as f64 * 0.4).sin() * 5.0).collect();
        let out = stochastic_rsi(&closes, 14, 5, 3, MaType::Sma).unwrap();
        assert_eq!(out.fast_k.len(), closes.len());
        // RSI valid from 14, %K from 18, %D from 20.
        assert!(out.fast_k[17].is_nan());
        assert!(out.fast_k[18].is_finite());
        assert!(out.fast_d[19].is_nan());
        assert!(out.fast_d[20].is_finite());
        for v in finite_tail(&out.fast_k) {
            assert!((0.0..=100.0).contains(&v));
        }
    }

    // ---- cmo -------------------------------------------------------------

    #[test]
    fn cmo_extremes() {
        let up: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        let out = chande_momentum_oscillator(&up, 5).unwrap();
        assert!(out[4].is_nan());
        assert_close(out[5], 100.0);
        assert_close(out[19], 100.0);

        let flat = chande_momentum_oscillator(&[3.0; 10], 5).unwrap();
        assert_close(flat[9], 0.0);
    }
}
