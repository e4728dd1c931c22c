// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free indicator implementations over `f64` series. Series
// outputs are aligned with their input: positions inside the lookback are
// `NaN`. Invalid periods and mismatched inputs are reported as
// `AnalysisError`; the `current_*`/`latest_*` helpers return `Option` for
// callers that only want the last reading.

pub mod util;

pub mod ema;
pub mod moving_average;
pub mod rsi;
pub mod roc;
pub mod atr;
pub mod adx;
pub mod bollinger;
pub mod channels;
pub mod oscillators;
pub mod trend;
pub mod volume;
pub mod price;
pub mod statistics;
pub mod hilbert;
pub mod patterns;

pub mod catalog;

pub use catalog::{compute, IndicatorKind, IndicatorOutput, IndicatorParams};
