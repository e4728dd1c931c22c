// =============================================================================
// Volume-based indicators
// =============================================================================
//
// Close Location Value (CLV) drives the accumulation/distribution family:
//   CLV = ((close - low) - (high - close)) / (high - low), 0 on a flat bar.
//
// Cumulative series (AD, OBV, NVI, VPT, VWAP) start at the first bar.

use serde::Serialize;

use super::util::{check_lengths, diff, nan_vec, partial_mean, partial_sum, require, safe_div, zip_with};
use crate::error::{AnalysisError, Result};

fn close_location_value(high: f64, low: f64, close: f64) -> f64 {
    safe_div((close - low) - (high - close), high - low, 0.0)
}

/// Accumulation/Distribution line.
pub fn accumulation_distribution(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    volume: &[f64],
) -> Result<Vec<f64>> {
    let n = check_lengths(&[high, low, close, volume])?;
    let mut out = Vec::with_capacity(n);
    let mut ad = 0.0;
    for i in 0..n {
        ad += close_location_value(high[i], low[i], close[i]) * volume[i];
        out.push(ad);
    }
    Ok(out)
}

#[derive(Debug, Clone, Serialize)]
pub struct ChaikinOscillator {
    pub ad: Vec<f64>,
    pub oscillator: Vec<f64>,
}

/// Chaikin A/D Oscillator: fast EMA minus slow EMA of the AD line.
///
/// Both EMAs start from the first AD value; output begins once the slow EMA
/// has covered `slow` bars.
pub fn chaikin_oscillator(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    volume: &[f64],
    fast: usize,
    slow: usize,
) -> Result<ChaikinOscillator> {
    let ad = accumulation_distribution(high, low, close, volume)?;
    require(&ad, "fast", fast)?;
    require(&ad, "slow", slow)?;

    let k_fast = 2.0 / (fast as f64 + 1.0);
    let k_slow = 2.0 / (slow as f64 + 1.0);
    let first = fast.max(slow) - 1;

    let mut oscillator = nan_vec(ad.len());
    let (mut ema_fast, mut ema_slow) = (ad[0], ad[0]);
    for (i, &value) in ad.iter().enumerate().skip(1) {
        ema_fast = k_fast * value + (1.0 - k_fast) * ema_fast;
        ema_slow = k_slow * value + (1.0 - k_slow) * ema_slow;
        if i >= first {
            oscillator[i] = ema_fast - ema_slow;
        }
    }
    if first == 0 {
        oscillator[0] = 0.0;
    }

    Ok(ChaikinOscillator { ad, oscillator })
}

/// Chaikin Money Flow over partial windows.
pub fn chaikin_money_flow(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    volume: &[f64],
    period: usize,
) -> Result<Vec<f64>> {
    let n = check_lengths(&[high, low, close, volume])?;
    require(close, "period", period)?;
    let flow: Vec<f64> = (0..n)
        .map(|i| close_location_value(high[i], low[i], close[i]) * volume[i])
        .collect();
    Ok(zip_with(
        &partial_sum(&flow, period),
        &partial_sum(volume, period),
        |f, v| safe_div(f, v, 0.0),
    ))
}

/// Money Flow Index. The first bar carries no direction and contributes 0.
pub fn money_flow_index(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    volume: &[f64],
    period: usize,
) -> Result<Vec<f64>> {
    let n = check_lengths(&[high, low, close, volume])?;
    require(close, "period", period)?;

    let tp: Vec<f64> = (0..n).map(|i| (high[i] + low[i] + close[i]) / 3.0).collect();
    let mut positive = vec![0.0; n];
    let mut negative = vec![0.0; n];
    for i in 1..n {
        let flow = tp[i] * volume[i];
        if tp[i] > tp[i - 1] {
            positive[i] = flow;
        } else if tp[i] < tp[i - 1] {
            negative[i] = flow;
        }
    }

    let mut out = nan_vec(n);
    for i in period - 1..n {
        let range = i + 1 - period..=i;
        let pos: f64 = positive[range.clone()].iter().sum();
        let neg: f64 = negative[range].iter().sum();
        out[i] = match (pos == 0.0, neg == 0.0) {
            (true, true) => 50.0,
            (_, true) => 100.0,
            _ => 100.0 - 100.0 / (1.0 + pos / neg),
        };
    }
    Ok(out)
}

/// On-Balance Volume, starting from the first bar's volume.
pub fn on_balance_volume(close: &[f64], volume: &[f64]) -> Result<Vec<f64>> {
    let n = check_lengths(&[close, volume])?;
    let mut out = Vec::with_capacity(n);
    let mut obv = volume[0];
    out.push(obv);
    for i in 1..n {
        if close[i] > close[i - 1] {
            obv += volume[i];
        } else if close[i] < close[i - 1] {
            obv -= volume[i];
        }
        out.push(obv);
    }
    Ok(out)
}

/// Negative Volume Index starting at 1000.
pub fn negative_volume_index(close: &[f64], volume: &[f64]) -> Result<Vec<f64>> {
    let n = check_lengths(&[close, volume])?;
    let mut out = Vec::with_capacity(n);
    let mut nvi = 1000.0;
    out.push(nvi);
    for i in 1..n {
        if volume[i] < volume[i - 1] {
            nvi *= 1.0 + safe_div(close[i] - close[i - 1], close[i - 1], 0.0);
        }
        out.push(nvi);
    }
    Ok(out)
}

/// Volume-Price Trend: cumulative volume times percent change.
pub fn volume_price_trend(close: &[f64], volume: &[f64]) -> Result<Vec<f64>> {
    let n = check_lengths(&[close, volume])?;
    let mut out = Vec::with_capacity(n);
    let mut vpt = 0.0;
    out.push(vpt);
    for i in 1..n {
        vpt += volume[i] * safe_div(close[i] - close[i - 1], close[i - 1], 0.0);
        out.push(vpt);
    }
    Ok(out)
}

/// Ease of Movement, averaged over partial windows.
pub fn ease_of_movement(
    high: &[f64],
    low: &[f64],
    volume: &[f64],
    period: usize,
) -> Result<Vec<f64>> {
    let n = check_lengths(&[high, low, volume])?;
    require(high, "period", period)?;
    let mut raw = nan_vec(n);
    for i in 1..n {
        let distance = (high[i] - high[i - 1]) + (low[i] - low[i - 1]);
        raw[i] = safe_div(distance * (high[i] - low[i]), 2.0 * volume[i], 0.0);
    }
    Ok(partial_mean(&raw, period))
}

/// Force Index: price change times volume change over `period` bars.
pub fn force_index(close: &[f64], volume: &[f64], period: usize) -> Result<Vec<f64>> {
    check_lengths(&[close, volume])?;
    require(close, "period", period)?;
    Ok(zip_with(&diff(close, period), &diff(volume, period), |p, v| p * v))
}

/// Volume Weighted Average Price of the bar midpoint, cumulative from bar 0.
pub fn vwap(high: &[f64], low: &[f64], volume: &[f64]) -> Result<Vec<f64>> {
    let n = check_lengths(&[high, low, volume])?;
    if volume.iter().any(|v| *v < 0.0) {
        return Err(AnalysisError::InvalidArgument("volume must not be negative".into()));
    }
    let mut out = Vec::with_capacity(n);
    let (mut pv, mut vol) = (0.0, 0.0);
    for i in 0..n {
        pv += volume[i] * (high[i] + low[i]) / 2.0;
        vol += volume[i];
        out.push(safe_div(pv, vol, f64::NAN));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::util::assert_close;

    #[test]
    fn ad_accumulates_clv_weighted_volume() {
        let high = [10.0, 10.0, 10.0];
        let low = [8.0, 8.0, 10.0];
        let close = [10.0, 8.0, 10.0];
        let vol = [100.0, 50.0, 70.0];
        let ad = accumulation_distribution(&high, &low, &close, &vol).unwrap();
        assert_close(ad[0], 100.0);
        assert_close(ad[1], 50.0);
        // flat bar contributes nothing
        assert_close(ad[2], 50.0);
    }

    #[test]
    fn chaikin_oscillator_lookback() {
        let n = 20;
        let close: Vec<f64> = (0..n).map(|i| 10.0 + i as f64).collect();
        let high: Vec<f64> = close.iter().map(|c| c + 0.5).collect();
        let low: Vec<f64> = close.iter().map(|c| c - 1.0).collect();
        let vol = vec![10.0; n];
        let co = chaikin_oscillator(&high, &low, &close, &vol, 3, 10).unwrap();
        assert!(co.oscillator[8].is_nan());
        // Rising AD: the fast EMA leads the slow one.
        assert!(co.oscillator[9] > 0.0);
        assert_eq!(co.ad.len(), n);
    }

    #[test]
    fn cmf_bounds() {
        let high = [10.0, 11.0, 12.0];
        let low = [9.0, 10.0, 11.0];
        let close = [10.0, 11.0, 12.0];
        let cmf = chaikin_money_flow(&high, &low, &close, &[1.0, 2.0, 3.0], 2).unwrap();
        for v in cmf {
            assert_close(v, 1.0);
        }
    }

    #[test]
    fn mfi_directional_cases() {
        let up: Vec<f64> = (1..=10).map(|x| x as f64).collect();
        let vol = vec![1.0; 10];
        let mfi = money_flow_index(&up, &up, &up, &vol, 5).unwrap();
        assert!(mfi[3].is_nan());
        assert_close(mfi[4], 100.0);

        let flat = vec![5.0; 10];
        let mfi = money_flow_index(&flat, &flat, &flat, &vol, 5).unwrap();
        assert_close(mfi[9], 50.0);

        let down: Vec<f64> = up.iter().rev().copied().collect();
        let mfi = money_flow_index(&down, &down, &down, &vol, 5).unwrap();
        assert_close(mfi[9], 0.0);
    }

    #[test]
    fn obv_sequence() {
        let obv = on_balance_volume(&[1.0, 2.0, 1.5, 1.5], &[10.0, 5.0, 3.0, 7.0]).unwrap();
        assert_eq!(obv, vec![10.0, 15.0, 12.0, 12.0]);
    }

    #[test]
    fn nvi_only_moves_on_falling_volume() {
        let nvi = negative_volume_index(&[10.0, 11.0, 12.1], &[100.0, 120.0, 90.0]).unwrap();
        assert_close(nvi[0], 1000.0);
        assert_close(nvi[1], 1000.0);
        assert_close(nvi[2], 1100.0);
    }

    #[test]
    fn vpt_cumulative() {
        let vpt = volume_price_trend(&[10.0, 11.0, 9.9], &[5.0, 100.0, 10.0]).unwrap();
        assert_close(vpt[0], 0.0);
        assert_close(vpt[1], 10.0);
        assert_close(vpt[2], 9.0);
    }

    #[test]
    fn eom_and_force_index() {
        let high = [10.0, 12.0, 14.0];
        let low = [8.0, 10.0, 12.0];
        let vol = [1.0, 2.0, 2.0];
        let eom = ease_of_movement(&high, &low, &vol, 2).unwrap();
        assert!(eom[0].is_nan());
        // (2 + 2) * 2 / 4 = 2
        assert_close(eom[1], 2.0);
        assert_close(eom[2], 2.0);

        let fi = force_index(&[1.0, 3.0, 6.0], &[10.0, 12.0, 11.0], 1).unwrap();
        assert!(fi[0].is_nan());
        assert_close(fi[1], 4.0);
        assert_close(fi[2], -3.0);
    }

    #[test]
    fn vwap_weights_by_volume() {
        let v = vwap(&[11.0, 21.0], &[9.0, 19.0], &[1.0, 3.0]).unwrap();
        assert_close(v[0], 10.0);
        assert_close(v[1], (10.0 + 60.0) / 4.0);
        let zero = vwap(&[1.0], &[1.0], &[0.0]).unwrap();
        assert!(zero[0].is_nan());
    }
}
