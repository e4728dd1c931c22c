// =============================================================================
// Analysis Errors
// =============================================================================
//
// Every public indicator and risk function validates its inputs up front and
// reports problems through `AnalysisError`. The service layer maps these to
// HTTP 400 responses; unknown catalog names map to 404.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("input series is empty")]
    EmptyInput,

    #[error("invalid period `{name}` = {value}")]
    InvalidPeriod { name: &'static str, value: usize },

    #[error("period {period} is greater than the number of data points ({len})")]
    InsufficientData { period: usize, len: usize },

    #[error("mismatched data lengths: expected {expected}, found {found}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("annual metrics need 250..=257 observations, got {len}; use `returns` for arbitrary spans")]
    AnnualDataLength { len: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unknown indicator: {0}")]
    UnknownIndicator(String),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        let err = AnalysisError::InsufficientData { period: 20, len: 5 };
        assert_eq!(
            err.to_string(),
            "period 20 is greater than the number of data points (5)"
        );

        let err = AnalysisError::InvalidPeriod { name: "period", value: 0 };
        assert!(err.to_string().contains("period"));
    }
}
