// =============================================================================
// Bollinger Bands
// =============================================================================
//
// Bollinger Bands consist of a middle band (moving average), an upper band
// (MA + k_up*σ), and a lower band (MA - k_dn*σ), where σ is the population
// standard deviation over the same window. The Band Width (BBW) is the
// normalised distance: BBW = (upper - lower) / middle * 100.

use serde::Serialize;
use tracing::debug;

use super::moving_average::ma;
use super::util::{require, rolling};
use crate::error::{AnalysisError, Result};
use crate::types::MaType;

/// Full-series Bollinger output, aligned with the input.
#[derive(Debug, Clone, Serialize)]
pub struct BollingerBands {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
    pub width: Vec<f64>,
}

/// Latest Bollinger reading.
#[derive(Debug, Clone, Serialize)]
pub struct BollingerResult {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    pub width: f64,
}

/// Calculate Bollinger Bands for the whole series.
///
/// - `upper`  = MA + `dev_up` * σ
/// - `middle` = MA(`ma_type`)
/// - `lower`  = MA - `dev_dn` * σ
/// - `width`  = (upper - lower) / middle * 100, `NaN` when middle is zero
pub fn bollinger_bands(
    data: &[f64],
    period: usize,
    dev_up: f64,
    dev_dn: f64,
    ma_type: MaType,
) -> Result<BollingerBands> {
    require(data, "period", period)?;
    if !dev_up.is_finite() || !dev_dn.is_finite() {
        return Err(AnalysisError::InvalidArgument(
            "band deviations must be finite".into(),
        ));
    }
    debug!(period, dev_up, dev_dn, %ma_type, "computing Bollinger Bands");

    let middle = ma(data, period, ma_type)?;
    let std_dev = rolling(data, period, |w| {
        let mean = w.iter().sum::<f64>() / period as f64;
        (w.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / period as f64).sqrt()
    });

    let n = data.len();
    let mut bands = BollingerBands {
        upper: Vec::with_capacity(n),
        middle: Vec::with_capacity(n),
        lower: Vec::with_capacity(n),
        width: Vec::with_capacity(n),
    };

    for (&mid, &sd) in middle.iter().zip(&std_dev) {
        if mid.is_nan() || sd.is_nan() {
            bands.upper.push(f64::NAN);
            bands.middle.push(f64::NAN);
            bands.lower.push(f64::NAN);
            bands.width.push(f64::NAN);
            continue;
        }
        let upper = mid + dev_up * sd;
        let lower = mid - dev_dn * sd;
        let width = if mid == 0.0 {
            f64::NAN
        } else {
            (upper - lower) / mid * 100.0
        };
        bands.upper.push(upper);
        bands.middle.push(mid);
        bands.lower.push(lower);
        bands.width.push(width);
    }

    Ok(bands)
}

/// Calculate the most recent SMA-based Bollinger reading.
///
/// Returns `None` when:
/// - Fewer than `period` data points.
/// - Middle band is zero (degenerate input).
pub fn calculate_bollinger(closes: &[f64], period: usize, num_std: f64) -> Option<BollingerResult> {
    let bands = bollinger_bands(closes, period, num_std, num_std, MaType::Sma).ok()?;
    let i = closes.len() - 1;
    let result = BollingerResult {
        upper: bands.upper[i],
        middle: bands.middle[i],
        lower: bands.lower[i],
        width: bands.width[i],
    };
    result.width.is_finite().then_some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::util::assert_close;

    #[test]
    fn bollinger_basic() {
        let closes: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        let bb = calculate_bollinger(&closes, 20, 2.0).unwrap();
        assert!(bb.upper > bb.middle);
        assert!(bb.lower < bb.middle);
        assert!(bb.width > 0.0);
    }

    #[test]
    fn bollinger_insufficient_data() {
        let closes = vec![1.0, 2.0, 3.0];
        assert!(calculate_bollinger(&closes, 20, 2.0).is_none());
        assert!(bollinger_bands(&closes, 20, 2.0, 2.0, MaType::Sma).is_err());
    }

    #[test]
    fn bollinger_constant_prices_have_zero_width() {
        let closes = vec![50.0; 25];
        let bb = calculate_bollinger(&closes, 20, 2.0).unwrap();
        assert_close(bb.width, 0.0);
        assert_close(bb.upper, bb.lower);
    }

    #[test]
    fn bollinger_zero_middle_is_none() {
        let closes = vec![0.0; 20];
        assert!(calculate_bollinger(&closes, 20, 2.0).is_none());
        let bands = bollinger_bands(&closes, 20, 2.0, 2.0, MaType::Sma).unwrap();
        assert!(bands.width[19].is_nan());
        assert_close(bands.middle[19], 0.0);
    }

    #[test]
    fn bollinger_population_deviation_and_asymmetric_bands() {
        // [2,4,4,4,5,5,7,9]: mean 5, population σ 2
        let data = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let bands = bollinger_bands(&data, 8, 2.0, 1.0, MaType::Sma).unwrap();
        assert!(bands.upper[6].is_nan());
        assert_close(bands.middle[7], 5.0);
        assert_close(bands.upper[7], 9.0);
        assert_close(bands.lower[7], 3.0);
        assert_close(bands.width[7], 120.0);
    }

    #[test]
    fn bollinger_with_ema_middle() {
        let data: Vec<f64> = (1..=30).map(|x| x as f64).collect();
        let bands = bollinger_bands(&data, 5, 2.0, 2.0, MaType::Ema).unwrap();
        let ema = crate::indicators::ema::ema(&data, 5).unwrap();
        assert_close(bands.middle[29], ema[29]);
    }
}
