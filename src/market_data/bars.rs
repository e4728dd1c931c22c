use serde::{Deserialize, Serialize};

use super::candle_buffer::Candle;
use crate::error::{AnalysisError, Result};
use crate::types::PriceField;

/// Column-oriented OHLCV series, oldest first.
///
/// Every column is optional on the wire so callers can post only the series
/// an indicator needs (e.g. just `close` for RSI).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bars {
    #[serde(default)]
    pub open: Vec<f64>,
    #[serde(default)]
    pub high: Vec<f64>,
    #[serde(default)]
    pub low: Vec<f64>,
    #[serde(default)]
    pub close: Vec<f64>,
    #[serde(default)]
    pub volume: Vec<f64>,
}

impl Bars {
    pub fn from_candles(candles: &[Candle]) -> Self {
        let mut bars = Self {
            open: Vec::with_capacity(candles.len()),
            high: Vec::with_capacity(candles.len()),
            low: Vec::with_capacity(candles.len()),
            close: Vec::with_capacity(candles.len()),
            volume: Vec::with_capacity(candles.len()),
        };
        for c in candles {
            bars.open.push(c.open);
            bars.high.push(c.high);
            bars.low.push(c.low);
            bars.close.push(c.close);
            bars.volume.push(c.volume);
        }
        bars
    }

    /// Length of the longest column.
    pub fn len(&self) -> usize {
        [&self.open, &self.high, &self.low, &self.close, &self.volume]
            .iter()
            .map(|c| c.len())
            .max()
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn field(&self, field: PriceField) -> &[f64] {
        match field {
            PriceField::Open => &self.open,
            PriceField::High => &self.high,
            PriceField::Low => &self.low,
            PriceField::Close => &self.close,
            PriceField::Volume => &self.volume,
        }
    }

    /// A column an indicator cannot run without.
    pub fn require(&self, field: PriceField) -> Result<&[f64]> {
        let series = self.field(field);
        if !series.is_empty() {
            return Ok(series);
        }
        if self.is_empty() {
            Err(AnalysisError::EmptyInput)
        } else {
            Err(AnalysisError::InvalidArgument(format!(
                "bars are missing the '{field}' series"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_candles_splits_columns() {
        let candles = vec![
            Candle::new(0, 1.0, 2.0, 0.5, 1.5, 10.0, 59_999),
            Candle::new(60_000, 1.5, 2.5, 1.0, 2.0, 20.0, 119_999),
        ];
        let bars = Bars::from_candles(&candles);
        assert_eq!(bars.len(), 2);
        assert_eq!(bars.close, vec![1.5, 2.0]);
        assert_eq!(bars.volume, vec![10.0, 20.0]);
    }

    #[test]
    fn partial_bars_from_json() {
        let bars: Bars = serde_json::from_str(r#"{"close": [1, 2, 3]}"#).unwrap();
        assert_eq!(bars.len(), 3);
        assert!(bars.require(PriceField::Close).is_ok());
        assert!(matches!(
            bars.require(PriceField::High),
            Err(AnalysisError::InvalidArgument(_))
        ));
        assert_eq!(
            Bars::default().require(PriceField::Close),
            Err(AnalysisError::EmptyInput)
        );
    }
}
