// =============================================================================
// Price channels: Keltner, Donchian, Ichimoku
// =============================================================================
//
// All three use partial windows, so they produce values from the first bar.

use serde::Serialize;

use super::util::{
    check_lengths, partial_max, partial_mean, partial_min, require, rolling_max, rolling_min,
    zip_with,
};
use crate::error::Result;

#[derive(Debug, Clone, Serialize)]
pub struct KeltnerChannels {
    pub high_band: Vec<f64>,
    pub central: Vec<f64>,
    pub low_band: Vec<f64>,
}

/// Keltner channel built from weighted typical prices.
pub fn keltner_channels(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    period: usize,
) -> Result<KeltnerChannels> {
    let n = check_lengths(&[high, low, close])?;
    require(close, "period", period)?;

    let mut hi = Vec::with_capacity(n);
    let mut mid = Vec::with_capacity(n);
    let mut lo = Vec::with_capacity(n);
    for i in 0..n {
        let (h, l, c) = (high[i], low[i], close[i]);
        hi.push((4.0 * h - 2.0 * l + c) / 3.0);
        mid.push((h + l + c) / 3.0);
        lo.push((-2.0 * h + 4.0 * l + c) / 3.0);
    }

    Ok(KeltnerChannels {
        high_band: partial_mean(&hi, period),
        central: partial_mean(&mid, period),
        low_band: partial_mean(&lo, period),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct DonchianChannel {
    pub high_band: Vec<f64>,
    pub low_band: Vec<f64>,
    /// 1.0 where the price reaches the full-window high.
    pub high_indicator: Vec<f64>,
    /// 1.0 where the price reaches the full-window low.
    pub low_indicator: Vec<f64>,
}

pub fn donchian_channel(data: &[f64], period: usize) -> Result<DonchianChannel> {
    require(data, "period", period)?;

    let full_max = rolling_max(data, period);
    let full_min = rolling_min(data, period);
    let flag = |hit: bool| if hit { 1.0 } else { 0.0 };

    Ok(DonchianChannel {
        high_band: partial_max(data, period),
        low_band: partial_min(data, period),
        high_indicator: zip_with(data, &full_max, |x, m| flag(x >= m)),
        low_indicator: zip_with(data, &full_min, |x, m| flag(x <= m)),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct IchimokuCloud {
    pub conversion: Vec<f64>,
    pub base: Vec<f64>,
    pub span_a: Vec<f64>,
    pub span_b: Vec<f64>,
}

/// Ichimoku lines without the forward displacement.
pub fn ichimoku_cloud(
    high: &[f64],
    low: &[f64],
    short: usize,
    medium: usize,
    long: usize,
) -> Result<IchimokuCloud> {
    check_lengths(&[high, low])?;
    require(high, "short", short)?;
    require(high, "medium", medium)?;
    require(high, "long", long)?;

    let midline = |p: usize| zip_with(&partial_max(high, p), &partial_min(low, p), |h, l| (h + l) / 2.0);

    let conversion = midline(short);
    let base = midline(medium);
    let span_a = zip_with(&conversion, &base, |c, b| (c + b) / 2.0);
    let span_b = midline(long);

    Ok(IchimokuCloud {
        conversion,
        base,
        span_a,
        span_b,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::util::assert_close;

    #[test]
    fn keltner_ordering_and_first_bar() {
        let high = [11.0, 12.0, 13.0];
        let low = [9.0, 10.0, 11.0];
        let close = [10.0, 11.0, 12.0];
        let k = keltner_channels(&high, &low, &close, 2).unwrap();
        // bar 0: (44 - 18 + 10)/3 = 12, (30)/3 = 10, (-22 + 36 + 10)/3 = 8
        assert_close(k.high_band[0], 12.0);
        assert_close(k.central[0], 10.0);
        assert_close(k.low_band[0], 8.0);
        for i in 0..3 {
            assert!(k.high_band[i] > k.central[i] && k.central[i] > k.low_band[i]);
        }
    }

    #[test]
    fn donchian_bands_and_flags() {
        let data = [1.0, 3.0, 2.0, 5.0, 4.0];
        let d = donchian_channel(&data, 3).unwrap();
        assert_close(d.high_band[0], 1.0);
        assert_close(d.high_band[1], 3.0);
        assert_close(d.low_band[4], 2.0);
        // Before a full window the flag stays 0.
        assert_close(d.high_indicator[1], 0.0);
        assert_close(d.high_indicator[3], 1.0);
        assert_close(d.high_indicator[4], 0.0);
        assert_close(d.low_indicator[2], 0.0);
    }

    #[test]
    fn ichimoku_lines() {
        let high: Vec<f64> = (1..=60).map(|x| x as f64 + 1.0).collect();
        let low: Vec<f64> = (1..=60).map(|x| x as f64 - 1.0).collect();
        let ich = ichimoku_cloud(&high, &low, 9, 26, 52).unwrap();
        // Last bar: conversion window 52..=60 → (61 + 51) / 2 = 56
        assert_close(ich.conversion[59], 56.0);
        // base window 35..=60 → (61 + 34) / 2 = 47.5
        assert_close(ich.base[59], 47.5);
        assert_close(ich.span_a[59], (56.0 + 47.5) / 2.0);
        assert_close(ich.span_b[59], (61.0 + 8.0) / 2.0);
        assert_close(ich.conversion[0], 1.0);
    }

    #[test]
    fn ichimoku_period_longer_than_data() {
        assert!(ichimoku_cloud(&[1.0; 10], &[1.0; 10], 9, 26, 52).is_err());
    }
}
