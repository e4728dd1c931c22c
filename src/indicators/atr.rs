// =============================================================================
// Average True Range (ATR) — Wilder's Smoothing Method
// =============================================================================
//
// ATR measures market volatility by decomposing the entire range of a bar.
//
// True Range (TR) for each bar:
//   TR = max(H - L, |H - prevClose|, |L - prevClose|)
//
// ATR is then the smoothed average of TR using Wilder's method:
//   ATR_0   = SMA of first `period` TR values
//   ATR_t   = (ATR_{t-1} * (period - 1) + TR_t) / period
//
// NATR = ATR / close * 100 makes the reading comparable across price scales.
//
// Default period: 14
// =============================================================================

use tracing::debug;

use super::util::{check_lengths, nan_vec, require};
use crate::error::Result;
use crate::market_data::{Bars, Candle};

/// True Range per bar. Index 0 has no previous close and is `NaN`.
pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Result<Vec<f64>> {
    let n = check_lengths(&[high, low, close])?;
    let mut out = nan_vec(n);
    for i in 1..n {
        out[i] = bar_true_range(high[i], low[i], close[i - 1]);
    }
    Ok(out)
}

pub(crate) fn bar_true_range(high: f64, low: f64, prev_close: f64) -> f64 {
    // f64::max swallows NaN, so check explicitly.
    if high.is_nan() || low.is_nan() || prev_close.is_nan() {
        return f64::NAN;
    }
    (high - low)
        .max((high - prev_close).abs())
        .max((low - prev_close).abs())
}

/// ATR series. The first value sits at index `period` (we need `period` TR
/// values, each requiring a previous candle).
pub fn average_true_range(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    period: usize,
) -> Result<Vec<f64>> {
    let n = check_lengths(&[high, low, close])?;
    require(close, "period", period)?;
    debug!(period, len = n, "computing ATR");

    let tr = true_range(high, low, close)?;
    let mut out = nan_vec(n);
    if n <= period {
        return Ok(out);
    }

    // --- Seed ATR with SMA of first `period` TR values ---------------------
    let seed: f64 = tr[1..=period].iter().sum::<f64>() / period as f64;
    if !seed.is_finite() {
        return Ok(out);
    }
    out[period] = seed;

    // --- Wilder's smoothing for remaining TR values ------------------------
    let period_f = period as f64;
    let mut atr = seed;
    for i in period + 1..n {
        atr = (atr * (period_f - 1.0) + tr[i]) / period_f;
        if !atr.is_finite() {
            break;
        }
        out[i] = atr;
    }
    Ok(out)
}

/// Normalized ATR: ATR as a percentage of the close.
pub fn normalized_average_true_range(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    period: usize,
) -> Result<Vec<f64>> {
    let atr = average_true_range(high, low, close, period)?;
    Ok(atr
        .iter()
        .zip(close)
        .map(|(&a, &c)| {
            if a.is_nan() {
                f64::NAN
            } else if c == 0.0 {
                0.0
            } else {
                a / c * 100.0
            }
        })
        .collect())
}

/// Most recent ATR value from a slice of candles (oldest first).
///
/// Returns `None` with fewer than `period + 1` candles or on non-finite input.
pub fn latest_atr(candles: &[Candle], period: usize) -> Option<f64> {
    let bars = Bars::from_candles(candles);
    let series = average_true_range(&bars.high, &bars.low, &bars.close, period).ok()?;
    series.last().copied().filter(|v| v.is_finite())
}

/// Most recent ATR as a percentage of the latest close.
pub fn latest_atr_pct(candles: &[Candle], period: usize) -> Option<f64> {
    let atr = latest_atr(candles, period)?;
    let last_close = candles.last()?.close;
    if last_close == 0.0 {
        return None;
    }
    Some((atr / last_close) * 100.0)
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::util::assert_close;

    fn candle(open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle::new(0, open, high, low, close, 100.0, 0)
    }

    #[test]
    fn atr_period_zero() {
        let candles = vec![candle(100.0, 105.0, 95.0, 102.0); 20];
        assert!(latest_atr(&candles, 0).is_none());
    }

    #[test]
    fn atr_insufficient_data() {
        // Need period + 1 = 15 candles for period=14, only have 10.
        let candles = vec![candle(100.0, 105.0, 95.0, 102.0); 10];
        assert!(latest_atr(&candles, 14).is_none());
    }

    #[test]
    fn atr_exact_minimum_data() {
        let candles = vec![
            candle(100.0, 102.0, 98.0, 101.0),
            candle(101.0, 104.0, 99.0, 103.0),
            candle(103.0, 106.0, 100.0, 105.0),
            candle(105.0, 108.0, 102.0, 107.0),
        ];
        // TRs: 5, 6, 6 → ATR(3) = 17/3
        assert_close(latest_atr(&candles, 3).unwrap(), 17.0 / 3.0);
    }

    #[test]
    fn atr_series_alignment() {
        let h = [2.0, 3.0, 4.0, 5.0, 6.0];
        let l = [1.0, 2.0, 3.0, 4.0, 5.0];
        let c = [1.5, 2.5, 3.5, 4.5, 5.5];
        let atr = average_true_range(&h, &l, &c, 2).unwrap();
        assert!(atr[1].is_nan());
        // TR = max(1, |3-1.5|, |2-1.5|) = 1.5 on every transition
        assert_close(atr[2], 1.5);
        assert_close(atr[4], 1.5);
    }

    #[test]
    fn atr_constant_range() {
        let candles: Vec<Candle> = (0..30)
            .map(|i| {
                let base = 100.0 + i as f64 * 0.1;
                candle(base, base + 5.0, base - 5.0, base)
            })
            .collect();
        let atr = latest_atr(&candles, 14).unwrap();
        assert!((atr - 10.0).abs() < 1.0, "expected ATR near 10.0, got {atr}");
    }

    #[test]
    fn atr_true_range_uses_prev_close() {
        let candles = vec![
            candle(100.0, 105.0, 95.0, 95.0),
            candle(110.0, 115.0, 108.0, 112.0), // gap up: |115-95|=20 > 7
            candle(112.0, 118.0, 110.0, 115.0),
            candle(115.0, 120.0, 113.0, 118.0),
        ];
        let atr = latest_atr(&candles, 3).unwrap();
        assert!(atr > 7.0, "ATR should reflect the gap, got {atr}");
    }

    #[test]
    fn atr_pct_and_natr_agree() {
        let candles: Vec<Candle> = (0..30)
            .map(|i| {
                let base = 100.0 + i as f64;
                candle(base, base + 3.0, base - 3.0, base + 1.0)
            })
            .collect();
        let pct = latest_atr_pct(&candles, 14).unwrap();
        let bars = Bars::from_candles(&candles);
        let natr = normalized_average_true_range(&bars.high, &bars.low, &bars.close, 14).unwrap();
        assert_close(pct, *natr.last().unwrap());
        assert!(natr[13].is_nan());
    }

    #[test]
    fn atr_nan_stops_series() {
        let candles = vec![
            candle(100.0, 105.0, 95.0, 100.0),
            candle(100.0, f64::NAN, 95.0, 100.0),
            candle(100.0, 105.0, 95.0, 100.0),
            candle(100.0, 105.0, 95.0, 100.0),
        ];
        assert!(latest_atr(&candles, 3).is_none());
    }

    #[test]
    fn true_range_mismatched_lengths() {
        assert!(true_range(&[1.0, 2.0], &[1.0], &[1.0, 2.0]).is_err());
    }
}
