// =============================================================================
// Directional Movement System (+DM, -DM, +DI, -DI, DX, ADX, ADXR)
// =============================================================================
//
// ADX quantifies trend **strength** regardless of direction.
//
// Calculation pipeline:
//   1. Compute +DM (positive directional movement) and -DM per bar.
//   2. Compute True Range (TR) per bar.
//   3. Apply Wilder's smoothing (period) to +DM, -DM, and TR. The running sums
//      are seeded with the first `period - 1` transitions and updated as
//      `s = s - s / period + value`.
//   4. Derive +DI = smoothed(+DM) / smoothed(TR) * 100
//            -DI = smoothed(-DM) / smoothed(TR) * 100
//   5. DX  = |+DI - -DI| / (+DI + -DI) * 100
//   6. ADX = Wilder's smoothed average of DX over `period` bars.
//   7. ADXR = (ADX_t + ADX_{t - (period - 1)}) / 2
//
// First valid indices: DM period-1, DI/DX period, ADX 2*period-1,
// ADXR 3*period-2.
//
// Interpretation:
//   ADX > 25  => trending market
//   ADX < 20  => ranging / choppy market
// =============================================================================

use tracing::debug;

use super::atr::bar_true_range;
use super::util::{check_lengths, nan_vec, require};
use crate::error::{AnalysisError, Result};
use crate::market_data::{Bars, Candle};

/// Raw per-transition movement. Index 0 is unused (no previous bar).
struct RawMovement {
    plus_dm: Vec<f64>,
    minus_dm: Vec<f64>,
    tr: Vec<f64>,
}

fn raw_movement(high: &[f64], low: &[f64], close: Option<&[f64]>) -> RawMovement {
    let n = high.len();
    let mut plus_dm = vec![0.0; n];
    let mut minus_dm = vec![0.0; n];
    let mut tr = vec![0.0; n];

    for i in 1..n {
        let up_move = high[i] - high[i - 1];
        let down_move = low[i - 1] - low[i];

        if up_move > down_move && up_move > 0.0 {
            plus_dm[i] = up_move;
        }
        if down_move > up_move && down_move > 0.0 {
            minus_dm[i] = down_move;
        }
        if let Some(close) = close {
            tr[i] = bar_true_range(high[i], low[i], close[i - 1]);
        }
    }

    RawMovement {
        plus_dm,
        minus_dm,
        tr,
    }
}

fn check_directional_period(period: usize) -> Result<()> {
    if period < 2 {
        return Err(AnalysisError::InvalidPeriod {
            name: "period",
            value: period,
        });
    }
    Ok(())
}

/// Wilder running sum of `values[1..]`, aligned; first output at
/// `period - 1`.
fn wilder_sum(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = nan_vec(n);
    if n < period {
        return out;
    }
    let period_f = period as f64;
    let mut sum: f64 = values[1..period].iter().sum();
    out[period - 1] = sum;
    for i in period..n {
        sum = sum - sum / period_f + values[i];
        out[i] = sum;
    }
    out
}

/// Plus Directional Movement (Wilder-smoothed).
pub fn plus_dm(high: &[f64], low: &[f64], period: usize) -> Result<Vec<f64>> {
    check_lengths(&[high, low])?;
    require(high, "period", period)?;
    check_directional_period(period)?;
    Ok(wilder_sum(&raw_movement(high, low, None).plus_dm, period))
}

/// Minus Directional Movement (Wilder-smoothed).
pub fn minus_dm(high: &[f64], low: &[f64], period: usize) -> Result<Vec<f64>> {
    check_lengths(&[high, low])?;
    require(high, "period", period)?;
    check_directional_period(period)?;
    Ok(wilder_sum(&raw_movement(high, low, None).minus_dm, period))
}

/// +DI and -DI series; first value at index `period`.
fn directional_indicators(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    period: usize,
) -> Result<(Vec<f64>, Vec<f64>)> {
    let n = check_lengths(&[high, low, close])?;
    require(close, "period", period)?;
    check_directional_period(period)?;

    let raw = raw_movement(high, low, Some(close));
    let mut plus_di = nan_vec(n);
    let mut minus_di = nan_vec(n);
    if n <= period {
        return Ok((plus_di, minus_di));
    }

    let period_f = period as f64;
    let mut s_plus: f64 = raw.plus_dm[1..period].iter().sum();
    let mut s_minus: f64 = raw.minus_dm[1..period].iter().sum();
    let mut s_tr: f64 = raw.tr[1..period].iter().sum();

    for i in period..n {
        s_plus = s_plus - s_plus / period_f + raw.plus_dm[i];
        s_minus = s_minus - s_minus / period_f + raw.minus_dm[i];
        s_tr = s_tr - s_tr / period_f + raw.tr[i];

        if s_tr == 0.0 {
            plus_di[i] = 0.0;
            minus_di[i] = 0.0;
        } else {
            plus_di[i] = 100.0 * s_plus / s_tr;
            minus_di[i] = 100.0 * s_minus / s_tr;
        }
    }
    Ok((plus_di, minus_di))
}

/// Plus Directional Indicator.
pub fn plus_di(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Result<Vec<f64>> {
    Ok(directional_indicators(high, low, close, period)?.0)
}

/// Minus Directional Indicator.
pub fn minus_di(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Result<Vec<f64>> {
    Ok(directional_indicators(high, low, close, period)?.1)
}

/// Directional Movement Index (DX).
pub fn dx(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Result<Vec<f64>> {
    let (plus, minus) = directional_indicators(high, low, close, period)?;
    Ok(plus
        .iter()
        .zip(&minus)
        .map(|(&p, &m)| if p.is_nan() { f64::NAN } else { compute_dx(p, m) })
        .collect())
}

/// Average Directional Movement Index.
pub fn adx(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Result<Vec<f64>> {
    debug!(period, len = close.len(), "computing ADX");
    let dx_line = dx(high, low, close, period)?;
    let n = dx_line.len();
    let mut out = nan_vec(n);

    let first = 2 * period - 1;
    if n <= first {
        return Ok(out);
    }

    // Seed ADX with SMA of first `period` DX values.
    let period_f = period as f64;
    let mut value = dx_line[period..=first].iter().sum::<f64>() / period_f;
    if !value.is_finite() {
        return Ok(out);
    }
    out[first] = value;

    for i in first + 1..n {
        value = (value * (period_f - 1.0) + dx_line[i]) / period_f;
        if !value.is_finite() {
            break;
        }
        out[i] = value;
    }
    Ok(out)
}

/// Average Directional Movement Index Rating.
pub fn adxr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Result<Vec<f64>> {
    let adx_line = adx(high, low, close, period)?;
    let lag = period - 1;
    let mut out = nan_vec(adx_line.len());
    for i in lag..adx_line.len() {
        let (now, then) = (adx_line[i], adx_line[i - lag]);
        if now.is_finite() && then.is_finite() {
            out[i] = (now + then) / 2.0;
        }
    }
    Ok(out)
}

/// Most recent ADX value from a slice of OHLCV candles.
pub fn latest_adx(candles: &[Candle], period: usize) -> Option<f64> {
    let bars = Bars::from_candles(candles);
    let series = adx(&bars.high, &bars.low, &bars.close, period).ok()?;
    series.last().copied().filter(|v| v.is_finite())
}

// =============================================================================
// Internal helpers
// =============================================================================

/// DX from +DI / -DI; zero when there is no directional movement at all.
fn compute_dx(plus_di: f64, minus_di: f64) -> f64 {
    let di_sum = plus_di + minus_di;
    if di_sum == 0.0 {
        return 0.0;
    }
    ((plus_di - minus_di).abs() / di_sum) * 100.0
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::util::assert_close;

    fn candle(open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle::new(0, open, high, low, close, 1.0, 0)
    }

    fn uptrend(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let base = 100.0 + i as f64 * 2.0;
                candle(base, base + 1.5, base - 0.5, base + 1.0)
            })
            .collect()
    }

    #[test]
    fn adx_period_too_small() {
        let candles = uptrend(50);
        assert!(latest_adx(&candles, 0).is_none());
        assert!(latest_adx(&candles, 1).is_none());
    }

    #[test]
    fn adx_insufficient_data() {
        let candles = vec![candle(1.0, 2.0, 0.5, 1.5); 10];
        assert!(latest_adx(&candles, 14).is_none());
    }

    #[test]
    fn adx_strong_uptrend() {
        let value = latest_adx(&uptrend(60), 14).unwrap();
        assert!(value > 25.0, "expected ADX > 25 for strong trend, got {value}");
    }

    #[test]
    fn adx_flat_market() {
        let candles = vec![candle(100.0, 101.0, 99.0, 100.0); 60];
        let value = latest_adx(&candles, 14).unwrap();
        assert!(value < 1.0, "expected ADX near 0 for flat market, got {value}");
    }

    #[test]
    fn adx_result_range() {
        let candles: Vec<Candle> = (0..100)
            .map(|i| {
                let base = 50.0 + (i as f64 * 0.3).sin() * 10.0;
                candle(base - 0.5, base + 1.0, base - 1.0, base + 0.5)
            })
            .collect();
        let bars = Bars::from_candles(&candles);
        for v in adx(&bars.high, &bars.low, &bars.close, 14).unwrap() {
            if v.is_finite() {
                assert!((0.0..=100.0).contains(&v), "ADX {v} out of [0,100] range");
            }
        }
    }

    #[test]
    fn adx_minimum_candles_exact() {
        // First ADX sits at index 2*period - 1, so 2*period candles suffice.
        let period = 5;
        let candles = uptrend(2 * period);
        assert!(latest_adx(&candles, period).is_some());
        assert!(latest_adx(&candles[..2 * period - 1], period).is_none());
    }

    #[test]
    fn dm_lookbacks_and_values() {
        let high = [10.0, 11.0, 12.0, 13.0, 14.0];
        let low = [9.0, 10.0, 11.0, 12.0, 13.0];
        let pdm = plus_dm(&high, &low, 3).unwrap();
        assert!(pdm[1].is_nan());
        // Seed = sum of two +1 moves.
        assert_close(pdm[2], 2.0);
        // 2 - 2/3 + 1
        assert_close(pdm[3], 2.0 - 2.0 / 3.0 + 1.0);

        let mdm = minus_dm(&high, &low, 3).unwrap();
        assert_close(mdm[4], 0.0);
    }

    #[test]
    fn di_lines_in_uptrend() {
        let bars = Bars::from_candles(&uptrend(40));
        let p = plus_di(&bars.high, &bars.low, &bars.close, 14).unwrap();
        let m = minus_di(&bars.high, &bars.low, &bars.close, 14).unwrap();
        assert!(p[13].is_nan());
        assert!(p[14] > 0.0);
        assert_close(m[39], 0.0);

        let d = dx(&bars.high, &bars.low, &bars.close, 14).unwrap();
        assert_close(d[39], 100.0);
    }

    #[test]
    fn adxr_lookback() {
        let bars = Bars::from_candles(&uptrend(60));
        let r = adxr(&bars.high, &bars.low, &bars.close, 5).unwrap();
        // ADX first at 9, ADXR needs ADX at t-4 → first at 13.
        assert!(r[12].is_nan());
        assert!(r[13].is_finite());
    }
}
