use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use super::candle_buffer::{Candle, CandleBuffer, CandleKey};
use crate::binance::client::parse_str_f64;

const STREAM_BASE_URL: &str = "wss://stream.binance.com:9443/ws";

/// Intervals Binance publishes kline streams for.
pub const SUPPORTED_INTERVALS: &[&str] = &[
    "1s", "1m", "3m", "5m", "15m", "30m", "1h", "2h", "4h", "6h", "8h", "12h", "1d", "3d", "1w",
    "1M",
];

pub fn kline_stream_url(symbol: &str, interval: &str) -> String {
    format!("{STREAM_BASE_URL}/{}@kline_{interval}", symbol.to_lowercase())
}

/// Connect to the Binance kline WebSocket stream for a single (symbol, interval)
/// pair and feed candles into `buffer`.
///
/// Runs until the stream disconnects or an error occurs, then returns so that
/// the caller (main.rs) can handle reconnection.
pub async fn run_kline_stream(
    symbol: &str,
    interval: &str,
    buffer: &Arc<CandleBuffer>,
) -> Result<()> {
    if !SUPPORTED_INTERVALS.contains(&interval) {
        warn!(
            interval = %interval,
            "unsupported kline interval requested -- it will still be subscribed"
        );
    }

    let url = kline_stream_url(symbol, interval);
    info!(url = %url, symbol = %symbol, interval = %interval, "connecting to kline WebSocket");

    let (ws_stream, _response) = connect_async(&url)
        .await
        .context("failed to connect to kline WebSocket")?;

    info!(symbol = %symbol, interval = %interval, "kline WebSocket connected");
    let (mut write, mut read) = ws_stream.split();

    loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => match parse_kline_message(&text) {
                Ok((key, candle)) => {
                    debug!(
                        key = %key,
                        close = candle.close,
                        closed = candle.is_closed,
                        "candle update"
                    );
                    buffer.update(key, candle);
                }
                Err(e) => {
                    warn!(error = %e, "failed to parse kline message");
                }
            },
            Some(Ok(Message::Ping(payload))) => {
                write
                    .send(Message::Pong(payload))
                    .await
                    .context("failed to answer kline ping")?;
            }
            Some(Ok(Message::Close(frame))) => {
                warn!(symbol = %symbol, interval = %interval, ?frame, "kline WebSocket closed by server");
                return Ok(());
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                error!(error = %e, "kline WebSocket read error");
                return Err(e.into());
            }
            None => {
                warn!(symbol = %symbol, interval = %interval, "kline WebSocket stream ended");
                return Ok(());
            }
        }
    }
}

/// Parse a kline event.
///
/// Accepts both the single-stream payload and the combined-stream envelope:
/// ```json
/// { "e": "kline", "s": "BTCUSDT", "k": { ... } }
/// { "stream": "btcusdt@kline_1m", "data": { "e": "kline", "s": "BTCUSDT", "k": { ... } } }
/// ```
pub fn parse_kline_message(text: &str) -> Result<(CandleKey, Candle)> {
    let root: serde_json::Value =
        serde_json::from_str(text).context("failed to parse kline JSON")?;

    let data = root.get("data").unwrap_or(&root);

    let symbol = data["s"].as_str().context("missing field s")?;
    let k = &data["k"];
    let interval = k["i"].as_str().context("missing field k.i")?;

    let open_time = k["t"].as_i64().context("missing field k.t")?;
    let close_time = k["T"].as_i64().context("missing field k.T")?;
    let field = |name: &str| {
        parse_str_f64(&k[name]).with_context(|| format!("invalid field k.{name}"))
    };

    let mut candle = Candle::new(
        open_time,
        field("o")?,
        field("h")?,
        field("l")?,
        field("c")?,
        field("v")?,
        close_time,
    );
    candle.is_closed = k["x"].as_bool().context("missing field k.x")?;

    Ok((CandleKey::new(symbol, interval), candle))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KLINE: &str = r#"{
        "e": "kline",
        "s": "BTCUSDT",
        "k": {
            "t": 1700000000000,
            "T": 1700000059999,
            "i": "1m",
            "o": "37000.00",
            "h": "37050.00",
            "l": "36990.00",
            "c": "37020.00",
            "v": "123.456",
            "n": 1500,
            "x": true
        }
    }"#;

    #[test]
    fn parse_single_stream_message() {
        let (key, candle) = parse_kline_message(KLINE).expect("should parse");
        assert_eq!(key.symbol, "BTCUSDT");
        assert_eq!(key.interval, "1m");
        assert!((candle.close - 37020.0).abs() < f64::EPSILON);
        assert!((candle.volume - 123.456).abs() < 1e-12);
        assert!(candle.is_closed);
    }

    #[test]
    fn parse_combined_stream_envelope() {
        let wrapped = format!(r#"{{"stream": "btcusdt@kline_1m", "data": {KLINE}}}"#);
        let (key, _) = parse_kline_message(&wrapped).expect("should parse");
        assert_eq!(key.to_string(), "BTCUSDT@1m");
    }

    #[test]
    fn parse_rejects_missing_fields() {
        assert!(parse_kline_message(r#"{"e": "kline", "s": "BTCUSDT", "k": {}}"#).is_err());
        assert!(parse_kline_message("not json").is_err());
    }

    #[test]
    fn stream_url() {
        assert_eq!(
            kline_stream_url("BTCUSDT", "5m"),
            "wss://stream.binance.com:9443/ws/btcusdt@kline_5m"
        );
    }
}
