// =============================================================================
// Kloud Analysis — technical indicators, performance and risk analytics
// =============================================================================
//
// The library half carries every computation (`indicators`, `analytics`) and
// the service plumbing used by the binary: live candle buffers fed from the
// exchange, runtime configuration and the HTTP/WebSocket API.
// =============================================================================

pub mod analytics;
pub mod api;
pub mod app_state;
pub mod binance;
pub mod error;
pub mod indicators;
pub mod market_data;
pub mod runtime_config;
pub mod types;

pub use error::{AnalysisError, Result};
pub use market_data::Bars;
pub use types::{MaType, PriceField, ReturnsPeriod};
