// =============================================================================
// Central Application State — Kloud Analysis Service
// =============================================================================
//
// AppState ties the live candle buffers to the runtime configuration and
// builds the per-market indicator snapshots served over REST and pushed over
// the WebSocket feed.
//
// Thread safety:
//   - The candle buffer carries its own atomic version counter.
//   - parking_lot::RwLock guards the runtime configuration.
// =============================================================================

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Notify;

use crate::indicators::atr::{latest_atr, latest_atr_pct};
use crate::indicators::adx::latest_adx;
use crate::indicators::bollinger::{calculate_bollinger, BollingerResult};
use crate::indicators::oscillators::macd;
use crate::indicators::rsi::current_rsi;
use crate::market_data::{CandleBuffer, CandleKey};
use crate::runtime_config::RuntimeConfig;

// =============================================================================
// Snapshot types
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct RsiReading {
    pub value: f64,
    pub label: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct MacdReading {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Latest indicator values for one (symbol, interval) market. Readings that
/// need more history than is buffered are `null`.
#[derive(Debug, Clone, Serialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub interval: String,
    pub data_version: u64,
    pub candles: usize,
    pub last_close: Option<f64>,
    pub last_open_time: Option<i64>,
    pub rsi: Option<RsiReading>,
    pub atr: Option<f64>,
    pub atr_pct: Option<f64>,
    pub adx: Option<f64>,
    pub bollinger: Option<BollingerResult>,
    pub macd: Option<MacdReading>,
    pub server_time: i64,
}

// =============================================================================
// AppState
// =============================================================================

/// Shared across all async tasks via `Arc<AppState>`.
pub struct AppState {
    pub runtime_config: Arc<RwLock<RuntimeConfig>>,
    /// Where config changes are persisted.
    pub config_path: PathBuf,

    pub candle_buffer: Arc<CandleBuffer>,

    /// Signalled when the watched symbol list changes so the stream
    /// supervisor can start and stop feeds.
    pub markets_changed: Notify,

    /// Open WebSocket subscribers.
    pub ws_connections: AtomicU64,

    /// Instant when the service was started. Used for uptime calculations.
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(config: RuntimeConfig, config_path: PathBuf) -> Self {
        let candle_buffer = Arc::new(CandleBuffer::new(config.candle_capacity));
        Self {
            runtime_config: Arc::new(RwLock::new(config)),
            config_path,
            candle_buffer,
            markets_changed: Notify::new(),
            ws_connections: AtomicU64::new(0),
            start_time: std::time::Instant::now(),
        }
    }

    /// Version of the market data; bumps whenever a candle closes.
    pub fn data_version(&self) -> u64 {
        self.candle_buffer.version()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn connection_opened(&self) -> u64 {
        self.ws_connections.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn connection_closed(&self) {
        self.ws_connections.fetch_sub(1, Ordering::Relaxed);
    }

    /// Every (symbol, interval) pair the configuration asks for.
    pub fn watched_markets(&self) -> Vec<CandleKey> {
        let cfg = self.runtime_config.read();
        cfg.symbols
            .iter()
            .flat_map(|s| cfg.intervals.iter().map(move |i| CandleKey::new(s, i)))
            .collect()
    }

    /// Latest indicator readings for `key`, or `None` when nothing has been
    /// buffered for it yet.
    pub fn market_snapshot(&self, key: &CandleKey) -> Option<MarketSnapshot> {
        let candles = self.candle_buffer.get_closed(key, usize::MAX);
        if candles.is_empty() {
            return None;
        }
        let defaults = self.runtime_config.read().indicator_defaults.clone();
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

        let macd = macd(
            &closes,
            defaults.macd_fast,
            defaults.macd_slow,
            defaults.macd_signal,
        )
        .ok()
        .and_then(|m| {
            let reading = MacdReading {
                macd: *m.macd.last()?,
                signal: *m.signal.last()?,
                histogram: *m.histogram.last()?,
            };
            [reading.macd, reading.signal, reading.histogram]
                .iter()
                .all(|v| v.is_finite())
                .then_some(reading)
        });

        Some(MarketSnapshot {
            symbol: key.symbol.clone(),
            interval: key.interval.clone(),
            data_version: self.data_version(),
            candles: candles.len(),
            last_close: candles.last().map(|c| c.close),
            last_open_time: candles.last().map(|c| c.open_time),
            rsi: current_rsi(&closes, defaults.rsi_period)
                .map(|(value, label)| RsiReading { value, label }),
            atr: latest_atr(&candles, defaults.atr_period),
            atr_pct: latest_atr_pct(&candles, defaults.atr_period),
            adx: latest_adx(&candles, defaults.adx_period),
            bollinger: calculate_bollinger(
                &closes,
                defaults.bollinger_period,
                defaults.bollinger_std,
            ),
            macd,
            server_time: chrono::Utc::now().timestamp_millis(),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::Candle;

    fn state_with_candles(n: usize) -> (AppState, CandleKey) {
        let state = AppState::new(RuntimeConfig::default(), PathBuf::from("unused.json"));
        let key = CandleKey::new("btcusdt", "1m");
        let candles = (0..n)
            .map(|i| {
                let c = 100.0 + (i as f64 * 0.4).sin() * 3.0 + i as f64 * 0.05;
                let t = i as i64 * 60_000;
                Candle::new(t, c - 0.2, c + 1.0, c - 1.0, c, 10.0, t + 59_999)
            })
            .collect();
        state.candle_buffer.extend_closed(key.clone(), candles);
        (state, key)
    }

    #[test]
    fn snapshot_is_none_without_data() {
        let state = AppState::new(RuntimeConfig::default(), PathBuf::from("unused.json"));
        assert!(state
            .market_snapshot(&CandleKey::new("BTCUSDT", "1m"))
            .is_none());
    }

    #[test]
    fn snapshot_fills_all_readings_with_enough_history() {
        let (state, key) = state_with_candles(120);
        let snap = state.market_snapshot(&key).unwrap();
        assert_eq!(snap.symbol, "BTCUSDT");
        assert_eq!(snap.candles, 120);
        assert!(snap.rsi.is_some());
        assert!(snap.atr.unwrap() > 0.0);
        assert!(snap.adx.is_some());
        assert!(snap.bollinger.is_some());
        assert!(snap.macd.is_some());
        assert!(snap.data_version > 0);
    }

    #[test]
    fn short_history_leaves_readings_empty() {
        let (state, key) = state_with_candles(5);
        let snap = state.market_snapshot(&key).unwrap();
        assert_eq!(snap.candles, 5);
        assert!(snap.last_close.is_some());
        assert!(snap.rsi.is_none());
        assert!(snap.macd.is_none());
        let json = serde_json::to_value(&snap).unwrap();
        assert!(json["adx"].is_null());
    }

    #[test]
    fn connection_counter() {
        let state = AppState::new(RuntimeConfig::default(), PathBuf::from("unused.json"));
        assert_eq!(state.connection_opened(), 1);
        assert_eq!(state.connection_opened(), 2);
        state.connection_closed();
        assert_eq!(state.ws_connections.load(Ordering::Relaxed), 1);
    }
}
