// =============================================================================
// Binance REST API Client — public market data
// =============================================================================
//
// Only unauthenticated endpoints are used: the service backfills candle
// history from `GET /api/v3/klines` before the WebSocket feed takes over.
// =============================================================================

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, instrument, warn};

use super::rate_limit::{klines_weight, RequestWeightTracker};
use crate::market_data::Candle;

const DEFAULT_BASE_URL: &str = "https://api.binance.com";

/// Maximum `limit` accepted by the klines endpoint.
pub const MAX_KLINES_LIMIT: u32 = 1000;

/// Binance REST client for public market data.
#[derive(Clone)]
pub struct BinanceClient {
    base_url: String,
    client: reqwest::Client,
    weights: Arc<RequestWeightTracker>,
}

impl BinanceClient {
    /// Create a client against the production REST endpoint.
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("failed to build reqwest client")?;
        let base_url = base_url.into();

        debug!(base_url = %base_url, "BinanceClient initialised");

        Ok(Self {
            base_url,
            client,
            weights: Arc::new(RequestWeightTracker::new()),
        })
    }

    pub fn weights(&self) -> &RequestWeightTracker {
        &self.weights
    }

    /// GET /api/v3/klines (public — no signature required).
    ///
    /// Binance includes the still-open candle as the last entry; it is marked
    /// `is_closed = false` when its close time lies in the future.
    #[instrument(skip(self), name = "binance::get_klines")]
    pub async fn get_klines(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Candle>> {
        let limit = limit.clamp(1, MAX_KLINES_LIMIT);
        if !self.weights.can_send_request(klines_weight(limit)) {
            anyhow::bail!("request weight budget exhausted; retry after the minute rolls over");
        }

        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url,
            symbol.to_uppercase(),
            interval,
            limit
        );

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("GET /api/v3/klines request failed")?;

        self.weights.update_from_headers(resp.headers());
        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .context("failed to parse klines response")?;

        if !status.is_success() {
            anyhow::bail!("Binance GET /api/v3/klines returned {}: {}", status, body);
        }

        let now_ms = chrono::Utc::now().timestamp_millis();
        let candles = parse_klines(&body, now_ms)?;
        debug!(symbol, interval, count = candles.len(), "klines fetched");
        Ok(candles)
    }
}

/// Parse Binance's array-of-arrays klines response.
///
/// Array indices:
///   [0] openTime, [1] open, [2] high, [3] low, [4] close, [5] volume,
///   [6] closeTime, ...
pub fn parse_klines(body: &serde_json::Value, now_ms: i64) -> Result<Vec<Candle>> {
    let raw = body.as_array().context("klines response is not an array")?;

    let mut candles = Vec::with_capacity(raw.len());
    for entry in raw {
        let arr = entry.as_array().context("kline entry is not an array")?;
        if arr.len() < 7 {
            warn!("skipping malformed kline entry with {} elements", arr.len());
            continue;
        }

        let open_time = arr[0].as_i64().context("kline open time is not an integer")?;
        let close_time = arr[6].as_i64().context("kline close time is not an integer")?;
        let mut candle = Candle::new(
            open_time,
            parse_str_f64(&arr[1])?,
            parse_str_f64(&arr[2])?,
            parse_str_f64(&arr[3])?,
            parse_str_f64(&arr[4])?,
            parse_str_f64(&arr[5])?,
            close_time,
        );
        candle.is_closed = close_time < now_ms;
        candles.push(candle);
    }
    Ok(candles)
}

/// Parse a JSON value that may be either a string or a number into `f64`.
pub(crate) fn parse_str_f64(val: &serde_json::Value) -> Result<f64> {
    if let Some(s) = val.as_str() {
        s.parse::<f64>()
            .with_context(|| format!("failed to parse '{s}' as f64"))
    } else if let Some(n) = val.as_f64() {
        Ok(n)
    } else {
        anyhow::bail!("expected string or number, got: {val}")
    }
}

impl std::fmt::Debug for BinanceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceClient")
            .field("base_url", &self.base_url)
            .field("weights", &self.weights)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_kline_arrays() {
        let body = json!([
            [1700000000000i64, "37000.0", "37050.0", "36990.0", "37020.0", "12.5",
             1700000059999i64, "0", 10, "0", "0", "0"],
            [1700000060000i64, "37020.0", "37030.0", "37000.0", "37010.0", "3.0",
             1700000119999i64, "0", 4, "0", "0", "0"]
        ]);
        let candles = parse_klines(&body, 1700000100000).unwrap();
        assert_eq!(candles.len(), 2);
        assert!((candles[0].close - 37020.0).abs() < f64::EPSILON);
        assert!(candles[0].is_closed);
        // Close time still in the future: the live candle.
        assert!(!candles[1].is_closed);
    }

    #[test]
    fn skips_short_entries_and_rejects_non_arrays() {
        let body = json!([[1, "1.0"]]);
        assert!(parse_klines(&body, 0).unwrap().is_empty());
        assert!(parse_klines(&json!({"code": -1121}), 0).is_err());
    }

    #[test]
    fn numeric_fields_accept_strings_and_numbers() {
        assert_eq!(parse_str_f64(&json!("1.5")).unwrap(), 1.5);
        assert_eq!(parse_str_f64(&json!(2.5)).unwrap(), 2.5);
        assert!(parse_str_f64(&json!(null)).is_err());
    }

    #[test]
    fn client_builds() {
        let client = BinanceClient::with_base_url("http://localhost:1").unwrap();
        assert_eq!(client.weights().used_weight(), 0);
    }
}
