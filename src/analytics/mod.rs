// =============================================================================
// Performance & Risk Analytics
// =============================================================================
//
// Return-series metrics: returns and their aggregates, risk-adjusted ratios
// and an aggregated `RiskReport`.

pub mod report;
pub mod returns;
pub mod risk;

pub use crate::indicators::statistics::{kurtosis, skewness};
pub use report::{RiskConfig, RiskReport};
