// =============================================================================
// Candlestick patterns
// =============================================================================
//
// Pattern outputs follow the usual convention: -100 for a bearish signal,
// +100 for a bullish one, 0 otherwise.

use super::util::{check_lengths, nan_vec};
use crate::error::{AnalysisError, Result};

/// Bars averaged to decide whether a real body counts as "long".
const BODY_LONG_PERIOD: usize = 10;

fn real_body(open: f64, close: f64) -> f64 {
    (close - open).abs()
}

/// Two Crows (bearish reversal, three bars):
///   1. a long white candle,
///   2. a black candle whose body gaps above the first body,
///   3. a black candle opening inside the second body and closing inside the
///      first body.
pub fn two_crows(open: &[f64], high: &[f64], low: &[f64], close: &[f64]) -> Result<Vec<f64>> {
    let n = check_lengths(&[open, high, low, close])?;
    let lookback = BODY_LONG_PERIOD + 2;
    if n <= lookback {
        return Err(AnalysisError::InsufficientData {
            period: lookback + 1,
            len: n,
        });
    }

    let is_white = |i: usize| close[i] >= open[i];
    let is_black = |i: usize| close[i] < open[i];

    let mut out = nan_vec(n);
    // Running total of the bodies preceding the first candle of the pattern.
    let mut body_total: f64 = (0..BODY_LONG_PERIOD)
        .map(|j| real_body(open[j], close[j]))
        .sum();

    for i in lookback..n {
        let (first, second) = (i - 2, i - 1);
        let avg_body = body_total / BODY_LONG_PERIOD as f64;

        let long_white = is_white(first) && real_body(open[first], close[first]) > avg_body;
        let gapping_crow = is_black(second)
            && close[second].min(open[second]) > close[first].max(open[first]);
        let closing_crow = is_black(i)
            && open[i] < open[second]
            && open[i] > close[second]
            && close[i] > open[first]
            && close[i] < close[first];

        out[i] = if long_white && gapping_crow && closing_crow {
            -100.0
        } else {
            0.0
        };

        body_total += real_body(open[first], close[first])
            - real_body(open[first - BODY_LONG_PERIOD], close[first - BODY_LONG_PERIOD]);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_pattern() -> (Vec<f64>, Vec<f64>, Vec<f64>, Vec<f64>) {
        let mut open: Vec<f64> = vec![10.0; 10];
        let mut close: Vec<f64> = vec![10.5; 10];
        open.extend([10.0, 23.0, 22.0, 14.0]);
        close.extend([20.0, 21.0, 15.0, 14.5]);
        let high: Vec<f64> = open.iter().zip(&close).map(|(o, c)| o.max(*c) + 0.5).collect();
        let low: Vec<f64> = open.iter().zip(&close).map(|(o, c)| o.min(*c) - 0.5).collect();
        (open, high, low, close)
    }

    #[test]
    fn detects_two_crows() {
        let (o, h, l, c) = with_pattern();
        let out = two_crows(&o, &h, &l, &c).unwrap();
        assert!(out[11].is_nan());
        assert_eq!(out[12], -100.0);
        assert_eq!(out[13], 0.0);
    }

    #[test]
    fn no_pattern_without_gap() {
        let (mut o, h, l, c) = with_pattern();
        // Second candle body now overlaps the first.
        o[11] = 19.0;
        let out = two_crows(&o, &h, &l, &c).unwrap();
        assert_eq!(out[12], 0.0);
    }

    #[test]
    fn requires_lookback() {
        let v = vec![1.0; 12];
        assert!(two_crows(&v, &v, &v, &v).is_err());
    }
}
