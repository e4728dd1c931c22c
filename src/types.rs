// =============================================================================
// Shared types used across the analysis library and service
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

/// Smoothing method for moving-average parameterised indicators (Bollinger
/// middle band, APO/PPO legs, Stochastic RSI %D).
///
/// The numeric codes follow the classic `matype` convention; 7 (MAMA) and 8
/// (T3) are not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MaType {
    #[default]
    Sma,
    Ema,
    Wma,
    Dema,
    Tema,
    Trima,
    Kama,
}

impl TryFrom<u8> for MaType {
    type Error = AnalysisError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Self::Sma),
            1 => Ok(Self::Ema),
            2 => Ok(Self::Wma),
            3 => Ok(Self::Dema),
            4 => Ok(Self::Tema),
            5 => Ok(Self::Trima),
            6 => Ok(Self::Kama),
            other => Err(AnalysisError::InvalidArgument(format!(
                "unsupported moving average type code {other}"
            ))),
        }
    }
}

impl std::str::FromStr for MaType {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        if let Ok(code) = s.parse::<u8>() {
            return Self::try_from(code);
        }
        match s.to_ascii_lowercase().as_str() {
            "sma" => Ok(Self::Sma),
            "ema" => Ok(Self::Ema),
            "wma" => Ok(Self::Wma),
            "dema" => Ok(Self::Dema),
            "tema" => Ok(Self::Tema),
            "trima" => Ok(Self::Trima),
            "kama" => Ok(Self::Kama),
            _ => Err(AnalysisError::InvalidArgument(format!(
                "unknown moving average type '{s}'"
            ))),
        }
    }
}

impl std::fmt::Display for MaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Sma => "SMA",
            Self::Ema => "EMA",
            Self::Wma => "WMA",
            Self::Dema => "DEMA",
            Self::Tema => "TEMA",
            Self::Trima => "TRIMA",
            Self::Kama => "KAMA",
        };
        write!(f, "{name}")
    }
}

/// Sampling frequency of a return series, used to pick the annualization
/// factor for risk metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReturnsPeriod {
    #[default]
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl ReturnsPeriod {
    /// Number of periods per year.
    pub fn annualization_factor(self) -> f64 {
        match self {
            Self::Daily => 252.0,
            Self::Weekly => 52.0,
            Self::Monthly => 12.0,
            Self::Quarterly => 4.0,
            Self::Yearly => 1.0,
        }
    }

    /// Resolve the factor, letting an explicit override win.
    pub fn resolve(self, annualization: Option<f64>) -> f64 {
        annualization.unwrap_or_else(|| self.annualization_factor())
    }
}

impl std::str::FromStr for ReturnsPeriod {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "quarterly" => Ok(Self::Quarterly),
            "yearly" => Ok(Self::Yearly),
            _ => Err(AnalysisError::InvalidArgument(format!(
                "unknown returns period '{s}'"
            ))),
        }
    }
}

impl std::fmt::Display for ReturnsPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Daily => write!(f, "daily"),
            Self::Weekly => write!(f, "weekly"),
            Self::Monthly => write!(f, "monthly"),
            Self::Quarterly => write!(f, "quarterly"),
            Self::Yearly => write!(f, "yearly"),
        }
    }
}

/// One column of an OHLCV bar set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl std::str::FromStr for PriceField {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "high" => Ok(Self::High),
            "low" => Ok(Self::Low),
            "close" => Ok(Self::Close),
            "volume" => Ok(Self::Volume),
            _ => Err(AnalysisError::InvalidArgument(format!(
                "unknown price field '{s}'"
            ))),
        }
    }
}

impl std::fmt::Display for PriceField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Open => "open",
            Self::High => "high",
            Self::Low => "low",
            Self::Close => "close",
            Self::Volume => "volume",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_field_parse() {
        assert_eq!("High".parse::<PriceField>().unwrap(), PriceField::High);
        assert!("vwap".parse::<PriceField>().is_err());
        assert_eq!(PriceField::Volume.to_string(), "volume");
    }

    #[test]
    fn ma_type_codes() {
        assert_eq!(MaType::try_from(0).unwrap(), MaType::Sma);
        assert_eq!(MaType::try_from(6).unwrap(), MaType::Kama);
        assert!(MaType::try_from(7).is_err());
        assert_eq!("ema".parse::<MaType>().unwrap(), MaType::Ema);
        assert_eq!("3".parse::<MaType>().unwrap(), MaType::Dema);
        assert!("mama".parse::<MaType>().is_err());
    }

    #[test]
    fn annualization_factors() {
        assert_eq!(ReturnsPeriod::Daily.annualization_factor(), 252.0);
        assert_eq!(ReturnsPeriod::Monthly.resolve(None), 12.0);
        assert_eq!(ReturnsPeriod::Daily.resolve(Some(365.0)), 365.0);
    }

    #[test]
    fn serde_lowercase() {
        let p: ReturnsPeriod = serde_json::from_str("\"weekly\"").unwrap();
        assert_eq!(p, ReturnsPeriod::Weekly);
        assert_eq!(serde_json::to_string(&MaType::Trima).unwrap(), "\"trima\"");
    }
}
