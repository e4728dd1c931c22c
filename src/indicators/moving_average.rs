// =============================================================================
// Moving Averages & Overlap Studies
// =============================================================================
//
//   SMA   — arithmetic mean of the last `period` values.
//   WMA   — linear weights 1..period, newest bar heaviest.
//   TRIMA — triangular weights min(i+1, period-i); a double-smoothed SMA.
//   KAMA  — Kaufman adaptive MA; smoothing constant follows the efficiency
//           ratio |net change| / Σ|bar changes| between the 2- and 30-period
//           EMA constants.
//   HMA   — Hull: WMA(2*WMA(n/2) - WMA(n), floor(sqrt(n))).
//   VAMA  — volume adjusted: price scaled by volume / (0.67 * mean volume).
//
// `ma` dispatches on `MaType` for indicators that take a smoothing method.
// =============================================================================

use tracing::debug;

use super::ema::{dema, ema, tema};
use super::util::{after_warmup, check_lengths, nan_vec, require, rolling, zip_with};
use crate::error::Result;
use crate::types::MaType;

/// Simple Moving Average.
pub fn sma(data: &[f64], period: usize) -> Result<Vec<f64>> {
    after_warmup(data, |tail| {
        require(tail, "period", period)?;
        Ok(rolling(tail, period, |w| w.iter().sum::<f64>() / period as f64))
    })
}

/// Weighted Moving Average with linear weights.
pub fn wma(data: &[f64], period: usize) -> Result<Vec<f64>> {
    after_warmup(data, |tail| {
        require(tail, "period", period)?;
        let denom = (period * (period + 1)) as f64 / 2.0;
        Ok(rolling(tail, period, |w| {
            w.iter()
                .enumerate()
                .map(|(i, v)| (i + 1) as f64 * v)
                .sum::<f64>()
                / denom
        }))
    })
}

/// Triangular Moving Average.
pub fn trima(data: &[f64], period: usize) -> Result<Vec<f64>> {
    after_warmup(data, |tail| {
        require(tail, "period", period)?;
        let weights: Vec<f64> = (0..period)
            .map(|i| (i + 1).min(period - i) as f64)
            .collect();
        let denom: f64 = weights.iter().sum();
        Ok(rolling(tail, period, |w| {
            w.iter().zip(&weights).map(|(v, k)| v * k).sum::<f64>() / denom
        }))
    })
}

/// Kaufman Adaptive Moving Average. First value at index `period`.
pub fn kama(data: &[f64], period: usize) -> Result<Vec<f64>> {
    after_warmup(data, |tail| {
        require(tail, "period", period)?;
        let mut out = nan_vec(tail.len());
        if tail.len() <= period {
            return Ok(out);
        }

        let fast = 2.0 / 3.0;
        let slow = 2.0 / 31.0;

        let mut prev = tail[period - 1];
        for i in period..tail.len() {
            let change = (tail[i] - tail[i - period]).abs();
            let volatility: f64 = (i - period + 1..=i)
                .map(|j| (tail[j] - tail[j - 1]).abs())
                .sum();
            let er = if volatility == 0.0 { 0.0 } else { change / volatility };
            let sc = (er * (fast - slow) + slow).powi(2);
            prev += sc * (tail[i] - prev);
            out[i] = prev;
        }
        Ok(out)
    })
}

/// Moving average of the requested type.
pub fn ma(data: &[f64], period: usize, ma_type: MaType) -> Result<Vec<f64>> {
    debug!(period, %ma_type, "computing moving average");
    match ma_type {
        MaType::Sma => sma(data, period),
        MaType::Ema => ema(data, period),
        MaType::Wma => wma(data, period),
        MaType::Dema => dema(data, period),
        MaType::Tema => tema(data, period),
        MaType::Trima => trima(data, period),
        MaType::Kama => kama(data, period),
    }
}

/// Hull Moving Average.
pub fn hull_moving_average(data: &[f64], period: usize) -> Result<Vec<f64>> {
    require(data, "period", period)?;
    let half = (period / 2).max(1);
    let root = ((period as f64).sqrt() as usize).max(1);

    let fast = wma(data, half)?;
    let slow = wma(data, period)?;
    let raw = zip_with(&fast, &slow, |f, s| 2.0 * f - s);
    wma(&raw, root)
}

/// Volume Adjusted Moving Average.
pub fn volume_adjusted_moving_average(
    data: &[f64],
    volume: &[f64],
    period: usize,
) -> Result<Vec<f64>> {
    check_lengths(&[data, volume])?;
    require(data, "period", period)?;

    let avg_volume = volume.iter().sum::<f64>() / volume.len() as f64;
    let increment = avg_volume * 0.67;
    let scaled: Vec<f64> = data
        .iter()
        .zip(volume)
        .map(|(p, v)| if increment == 0.0 { 0.0 } else { p * v / increment })
        .collect();

    Ok(rolling(&scaled, period, |w| w.iter().sum::<f64>() / period as f64))
}

/// Midpoint over period: (highest + lowest) / 2 of a single series.
pub fn midpoint(data: &[f64], period: usize) -> Result<Vec<f64>> {
    require(data, "period", period)?;
    Ok(rolling(data, period, |w| {
        let hi = w.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let lo = w.iter().copied().fold(f64::INFINITY, f64::min);
        (hi + lo) / 2.0
    }))
}

/// Midpoint price over period: (highest high + lowest low) / 2.
pub fn midprice(high: &[f64], low: &[f64], period: usize) -> Result<Vec<f64>> {
    check_lengths(&[high, low])?;
    require(high, "period", period)?;
    let hh = super::util::rolling_max(high, period);
    let ll = super::util::rolling_min(low, period);
    Ok(zip_with(&hh, &ll, |h, l| (h + l) / 2.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::util::assert_close;

    #[test]
    fn sma_known_values() {
        let out = sma(&[1.0, 2.0, 3.0, 4.0, 5.0], 3).unwrap();
        assert!(out[1].is_nan());
        assert_close(out[2], 2.0);
        assert_close(out[4], 4.0);
    }

    #[test]
    fn wma_weights_recent_bars() {
        // (1*1 + 2*2 + 3*3) / 6 = 14/6
        let out = wma(&[1.0, 2.0, 3.0], 3).unwrap();
        assert_close(out[2], 14.0 / 6.0);
    }

    #[test]
    fn trima_odd_and_even_weights() {
        // period 3: weights 1,2,1
        let out = trima(&[1.0, 2.0, 6.0], 3).unwrap();
        assert_close(out[2], (1.0 + 4.0 + 6.0) / 4.0);
        // period 4: weights 1,2,2,1
        let out = trima(&[1.0, 2.0, 3.0, 4.0], 4).unwrap();
        assert_close(out[3], (1.0 + 4.0 + 6.0 + 4.0) / 6.0);
    }

    #[test]
    fn kama_flat_series_stays_flat() {
        let out = kama(&[10.0; 20], 5).unwrap();
        assert!(out[4].is_nan());
        for v in &out[5..] {
            assert_close(*v, 10.0);
        }
    }

    #[test]
    fn kama_follows_a_clean_trend_quickly() {
        // ER = 1 on a monotonic line, so the fast constant is used.
        let data: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let out = kama(&data, 10).unwrap();
        let last = *out.last().unwrap();
        assert!(last > 45.0, "kama too slow: {last}");
    }

    #[test]
    fn ma_dispatch_matches_direct_calls() {
        let data: Vec<f64> = (1..=40).map(|i| (i as f64).sin() + 10.0).collect();
        assert_eq!(
            format!("{:?}", ma(&data, 5, MaType::Wma).unwrap()),
            format!("{:?}", wma(&data, 5).unwrap())
        );
        assert_eq!(
            format!("{:?}", ma(&data, 5, MaType::Ema).unwrap()),
            format!("{:?}", ema(&data, 5).unwrap())
        );
    }

    #[test]
    fn hull_lookback_and_linear_tracking() {
        let data: Vec<f64> = (1..=60).map(|i| i as f64).collect();
        let out = hull_moving_average(&data, 16).unwrap();
        // WMA(16) valid from 15, then WMA(4) of the raw line valid from 18.
        assert!(out[17].is_nan());
        assert!(out[18].is_finite());
        // On a line WMA(n) lags by (n-1)/3: raw leads by 1/3, WMA(4) lags 1.
        assert!((out[59] - (60.0 - 2.0 / 3.0)).abs() < 1e-6);
    }

    #[test]
    fn vama_scales_by_relative_volume() {
        let price = [10.0, 10.0, 10.0, 10.0];
        let volume = [0.67, 0.67, 0.67, 0.67];
        // avg volume 0.67 → increment 0.4489 → ratio 1/0.67
        let out = volume_adjusted_moving_average(&price, &volume, 2).unwrap();
        assert_close(out[1], 10.0 / 0.67);
    }

    #[test]
    fn midpoint_and_midprice() {
        let mp = midpoint(&[1.0, 5.0, 3.0], 3).unwrap();
        assert_close(mp[2], 3.0);

        let mpr = midprice(&[4.0, 6.0, 5.0], &[1.0, 2.0, 3.0], 2).unwrap();
        assert!(mpr[0].is_nan());
        assert_close(mpr[1], (6.0 + 1.0) / 2.0);
        assert_close(mpr[2], (6.0 + 2.0) / 2.0);
    }
}
