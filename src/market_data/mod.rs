pub mod bars;
pub mod candle_buffer;
pub mod kline_stream;

// Re-export the core types for convenient access (e.g. `use crate::market_data::Candle`).
pub use bars::Bars;
pub use candle_buffer::{Candle, CandleBuffer, CandleKey};
pub use kline_stream::run_kline_stream;
