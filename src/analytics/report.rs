// =============================================================================
// Risk report — every performance metric for one return series
// =============================================================================

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::returns::{annualized_return, cumulative_return, volatility};
use super::risk;
use crate::error::{AnalysisError, Result};
use crate::indicators::statistics::{kurtosis, skewness};
use crate::indicators::util::check_lengths;
use crate::types::ReturnsPeriod;

/// Parameters shared by the report's metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub period: ReturnsPeriod,
    /// Overrides the factor implied by `period`.
    pub annualization: Option<f64>,
    pub risk_free: f64,
    pub required_return: f64,
    /// Value-at-risk confidence level in percent.
    pub var_confidence: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            period: ReturnsPeriod::Daily,
            annualization: None,
            risk_free: 0.0,
            required_return: 0.0,
            var_confidence: 95.0,
        }
    }
}

impl RiskConfig {
    pub fn annualization_factor(&self) -> f64 {
        self.period.resolve(self.annualization)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(ann) = self.annualization {
            if !(ann.is_finite() && ann > 0.0) {
                return Err(AnalysisError::InvalidArgument(format!(
                    "annualization must be positive, got {ann}"
                )));
            }
        }
        if !(self.var_confidence > 0.0 && self.var_confidence < 100.0) {
            return Err(AnalysisError::InvalidArgument(format!(
                "var_confidence must lie in (0, 100), got {}",
                self.var_confidence
            )));
        }
        Ok(())
    }
}

/// Metrics relative to a benchmark series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkMetrics {
    pub alpha: Option<f64>,
    pub beta: Option<f64>,
    pub information_ratio: Option<f64>,
}

/// Undefined metrics serialise as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskReport {
    pub observations: usize,
    pub period: ReturnsPeriod,
    pub annualization: f64,
    pub cumulative_return: Option<f64>,
    pub annualized_return: Option<f64>,
    pub volatility: Option<f64>,
    pub max_drawdown: Option<f64>,
    pub sharpe_ratio: Option<f64>,
    pub sortino_ratio: Option<f64>,
    pub calmar_ratio: Option<f64>,
    pub omega_ratio: Option<f64>,
    pub tail_ratio: Option<f64>,
    pub downside_risk: Option<f64>,
    pub value_at_risk: Option<f64>,
    pub skewness: Option<f64>,
    pub kurtosis: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub benchmark: Option<BenchmarkMetrics>,
}

fn metric(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Metrics that can only fail for lack of data report as missing.
fn optional(name: &'static str, value: Result<f64>) -> Option<f64> {
    match value {
        Ok(v) => metric(v),
        Err(e) => {
            debug!(metric = name, error = %e, "metric unavailable");
            None
        }
    }
}

impl RiskReport {
    /// Build the report for `returns`, optionally against `benchmark` (same
    /// length). Empty input and invalid configuration are errors; metrics that
    /// are undefined for this particular series are `None`.
    pub fn build(returns: &[f64], benchmark: Option<&[f64]>, config: &RiskConfig) -> Result<Self> {
        config.validate()?;
        if returns.is_empty() {
            return Err(AnalysisError::EmptyInput);
        }
        if let Some(b) = benchmark {
            check_lengths(&[returns, b])?;
        }

        let period = config.period;
        let ann = config.annualization;
        let factor = config.annualization_factor();
        debug!(len = returns.len(), %period, factor, has_benchmark = benchmark.is_some(), "building risk report");

        let benchmark = benchmark
            .map(|b| -> Result<BenchmarkMetrics> {
                Ok(BenchmarkMetrics {
                    alpha: metric(risk::alpha(returns, b, config.risk_free, period, ann)?),
                    beta: metric(risk::beta(returns, b, config.risk_free)?),
                    information_ratio: metric(risk::information_ratio(returns, b)?),
                })
            })
            .transpose()?;

        let value_at_risk = optional("value_at_risk", risk::value_at_risk(returns, config.var_confidence));
        if value_at_risk.is_none() {
            warn!("return series has no finite observations");
        }

        Ok(Self {
            observations: returns.len(),
            period,
            annualization: factor,
            cumulative_return: metric(cumulative_return(returns)),
            annualized_return: optional("annualized_return", annualized_return(returns, period, ann)),
            volatility: optional("volatility", volatility(returns)),
            max_drawdown: metric(risk::max_drawdown(returns)),
            sharpe_ratio: optional("sharpe_ratio", risk::sharpe_ratio(returns)),
            sortino_ratio: metric(risk::sortino_ratio(returns, config.required_return, period, ann)),
            calmar_ratio: optional("calmar_ratio", risk::calmar_ratio(returns, period, ann)),
            omega_ratio: metric(risk::omega_ratio(
                returns,
                config.risk_free,
                config.required_return,
                factor,
            )),
            tail_ratio: metric(risk::tail_ratio(returns)),
            downside_risk: metric(risk::downside_risk(returns, config.required_return, period, ann)),
            value_at_risk,
            skewness: optional("skewness", skewness(returns)),
            kurtosis: optional("kurtosis", kurtosis(returns)),
            benchmark,
        })
    }
}
