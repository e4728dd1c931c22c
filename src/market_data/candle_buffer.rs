use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::bars::Bars;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single OHLCV candle from the Binance kline feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: i64,
    pub close_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub is_closed: bool,
}

impl Candle {
    /// A closed candle.
    pub fn new(
        open_time: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        close_time: i64,
    ) -> Self {
        Self {
            open_time,
            close_time,
            open,
            high,
            low,
            close,
            volume,
            is_closed: true,
        }
    }
}

/// Composite key that identifies a unique candle series.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct CandleKey {
    pub symbol: String,
    pub interval: String,
}

impl CandleKey {
    pub fn new(symbol: &str, interval: &str) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            interval: interval.to_string(),
        }
    }
}

impl std::fmt::Display for CandleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.symbol, self.interval)
    }
}

// ---------------------------------------------------------------------------
// CandleBuffer -- thread-safe ring buffer per (symbol, interval)
// ---------------------------------------------------------------------------

/// Thread-safe ring-buffer that stores the most recent candles per
/// `(symbol, interval)` pair.  The live (unclosed) candle is continuously
/// updated in-place; when a candle closes it becomes permanent and the ring is
/// trimmed to `max_candles`.
///
/// `version` increases every time a candle closes anywhere in the buffer, so
/// consumers can cheaply tell whether indicator snapshots are stale.
pub struct CandleBuffer {
    buffers: RwLock<HashMap<CandleKey, VecDeque<Candle>>>,
    max_candles: usize,
    version: AtomicU64,
}

impl CandleBuffer {
    /// Create a new buffer that retains at most `max_candles` closed candles per
    /// key, plus one in-progress candle.
    pub fn new(max_candles: usize) -> Self {
        Self {
            buffers: RwLock::new(HashMap::new()),
            max_candles,
            version: AtomicU64::new(0),
        }
    }

    /// Insert or replace the latest candle for the given key.
    ///
    /// * A closed candle replaces the in-progress version of itself (same
    ///   `open_time`) and is appended; the ring is trimmed to `max_candles`.
    /// * A closed candle repeating the newest stored closed candle replaces it
    ///   in place.
    /// * An open candle replaces the previous in-progress candle, otherwise it
    ///   is appended.
    /// * Anything older than the newest stored closed candle is dropped, so the
    ///   ring stays strictly ordered by `open_time`.
    pub fn update(&self, key: CandleKey, candle: Candle) {
        let closed = candle.is_closed;
        let accepted = {
            let mut map = self.buffers.write();
            let ring = map
                .entry(key.clone())
                .or_insert_with(|| VecDeque::with_capacity(self.max_candles + 1));
            Self::apply(ring, candle, self.max_candles)
        };
        if !accepted {
            debug!(key = %key, "dropped stale candle");
            return;
        }
        if closed {
            self.version.fetch_add(1, Ordering::Release);
        }
    }

    fn apply(ring: &mut VecDeque<Candle>, candle: Candle, max: usize) -> bool {
        match Self::newest_closed(ring) {
            Some(newest) if candle.open_time < newest => return false,
            Some(newest) if candle.open_time == newest => {
                if !candle.is_closed {
                    return false;
                }
                if let Some(slot) = ring.iter_mut().rev().find(|c| c.is_closed) {
                    *slot = candle;
                }
                return true;
            }
            _ => {}
        }

        while ring
            .back()
            .is_some_and(|last| !last.is_closed && last.open_time <= candle.open_time)
        {
            ring.pop_back();
        }

        // A newer live candle may already sit at the back.
        let pos = match ring.back() {
            Some(last) if !last.is_closed => {
                if !candle.is_closed {
                    return false;
                }
                ring.len() - 1
            }
            _ => ring.len(),
        };
        let closed = candle.is_closed;
        ring.insert(pos, candle);
        if closed {
            Self::trim(ring, max);
        }
        true
    }

    fn newest_closed(ring: &VecDeque<Candle>) -> Option<i64> {
        ring.iter().rev().find(|c| c.is_closed).map(|c| c.open_time)
    }

    /// Append historical closed candles (oldest first), skipping any that are
    /// not newer than the latest closed candle already stored.
    pub fn extend_closed(&self, key: CandleKey, candles: Vec<Candle>) -> usize {
        let mut added = 0;
        {
            let mut map = self.buffers.write();
            let ring = map
                .entry(key.clone())
                .or_insert_with(|| VecDeque::with_capacity(self.max_candles + 1));
            let newest = Self::newest_closed(ring).unwrap_or(i64::MIN);

            // Keep a trailing in-progress candle at the back.
            let live = match ring.back() {
                Some(last) if !last.is_closed => ring.pop_back(),
                _ => None,
            };
            for candle in candles
                .into_iter()
                .filter(|c| c.is_closed && c.open_time > newest)
            {
                ring.push_back(candle);
                added += 1;
            }
            Self::trim(ring, self.max_candles);
            if let Some(live) = live {
                if ring.back().map_or(true, |c| c.open_time < live.open_time) {
                    ring.push_back(live);
                }
            }
        }
        if added > 0 {
            self.version.fetch_add(1, Ordering::Release);
            debug!(key = %key, added, "backfilled candles");
        }
        added
    }

    fn trim(ring: &mut VecDeque<Candle>, max: usize) {
        let closed = ring.iter().filter(|c| c.is_closed).count();
        let mut excess = closed.saturating_sub(max);
        while excess > 0 {
            match ring.front() {
                Some(front) if front.is_closed => {
                    ring.pop_front();
                    excess -= 1;
                }
                _ => break,
            }
        }
    }

    /// Return the most recent `count` **closed** candles (oldest-first order).
    pub fn get_closed(&self, key: &CandleKey, count: usize) -> Vec<Candle> {
        let map = self.buffers.read();
        match map.get(key) {
            Some(ring) => {
                let closed: Vec<&Candle> = ring.iter().filter(|c| c.is_closed).collect();
                let start = closed.len().saturating_sub(count);
                closed[start..].iter().map(|c| (*c).clone()).collect()
            }
            None => Vec::new(),
        }
    }

    /// Closed candles for `key` as column vectors.
    pub fn get_bars(&self, key: &CandleKey, count: usize) -> Bars {
        Bars::from_candles(&self.get_closed(key, count))
    }

    /// Return the close price of the most recent closed candle, if any.
    pub fn last_close(&self, key: &CandleKey) -> Option<f64> {
        let map = self.buffers.read();
        map.get(key)
            .and_then(|ring| ring.iter().rev().find(|c| c.is_closed).map(|c| c.close))
    }

    /// Total number of candles (including any in-progress candle) stored for a
    /// key.
    pub fn count(&self, key: &CandleKey) -> usize {
        let map = self.buffers.read();
        map.get(key).map_or(0, VecDeque::len)
    }

    /// Drop everything stored for `key`. Returns whether anything was there.
    pub fn remove(&self, key: &CandleKey) -> bool {
        self.buffers.write().remove(key).is_some()
    }

    /// Every key that has received at least one candle.
    pub fn keys(&self) -> Vec<CandleKey> {
        let mut keys: Vec<CandleKey> = self.buffers.read().keys().cloned().collect();
        keys.sort_by(|a, b| (&a.symbol, &a.interval).cmp(&(&b.symbol, &b.interval)));
        keys
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> usize {
        self.max_candles
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_candle(open_time: i64, close: f64, is_closed: bool) -> Candle {
        Candle {
            is_closed,
            ..Candle::new(open_time, close, close + 1.0, close - 1.0, close, 100.0, open_time + 59_999)
        }
    }

    fn make_key(sym: &str, iv: &str) -> CandleKey {
        CandleKey::new(sym, iv)
    }

    #[test]
    fn ring_buffer_trimming() {
        let buf = CandleBuffer::new(3);
        let key = make_key("BTCUSDT", "1m");

        for i in 0..5 {
            buf.update(
                key.clone(),
                sample_candle(i * 60_000, 100.0 + i as f64, true),
            );
        }

        assert_eq!(buf.count(&key), 3);
        assert_eq!(buf.get_bars(&key, 10).close, vec![102.0, 103.0, 104.0]);
        assert_eq!(buf.version(), 5);
    }

    #[test]
    fn in_progress_replacement() {
        let buf = CandleBuffer::new(10);
        let key = make_key("ETHUSDT", "5m");

        buf.update(key.clone(), sample_candle(0, 50.0, false));
        assert_eq!(buf.count(&key), 1);

        // Same open_time, still open -- should replace.
        buf.update(key.clone(), sample_candle(0, 51.0, false));
        assert_eq!(buf.count(&key), 1);
        assert_eq!(buf.version(), 0);

        // Close it.
        buf.update(key.clone(), sample_candle(0, 52.0, true));
        assert_eq!(buf.count(&key), 1);
        assert_eq!(buf.last_close(&key), Some(52.0));
        assert_eq!(buf.version(), 1);
    }

    #[test]
    fn get_closed_filters_out_in_progress() {
        let buf = CandleBuffer::new(10);
        let key = make_key("BTCUSDT", "1m");

        buf.update(key.clone(), sample_candle(0, 100.0, true));
        buf.update(key.clone(), sample_candle(60_000, 101.0, true));
        buf.update(key.clone(), sample_candle(120_000, 102.0, false)); // in progress

        let closed = buf.get_closed(&key, 10);
        assert_eq!(closed.len(), 2);
    }

    #[test]
    fn last_close_empty_returns_none() {
        let buf = CandleBuffer::new(10);
        let key = make_key("XYZUSDT", "1h");
        assert_eq!(buf.last_close(&key), None);
        assert!(buf.get_bars(&key, 10).is_empty());
    }

    #[test]
    fn backfill_skips_known_candles_and_keeps_live_one() {
        let buf = CandleBuffer::new(10);
        let key = make_key("btcusdt", "1m");
        assert_eq!(key.symbol, "BTCUSDT");

        buf.update(key.clone(), sample_candle(60_000, 101.0, true));
        buf.update(key.clone(), sample_candle(120_000, 102.0, false));

        let history = (0..4)
            .map(|i| sample_candle(i * 60_000, 100.0 + i as f64, true))
            .collect();
        // Only open_time 120_000 and 180_000 are newer than the stored close.
        assert_eq!(buf.extend_closed(key.clone(), history), 2);

        let closes = buf.get_bars(&key, 10).close;
        assert_eq!(closes, vec![101.0, 102.0, 103.0]);
        // The stale live candle (120_000) is dropped in favour of history.
        assert_eq!(buf.count(&key), 3);
    }

    #[test]
    fn closed_repeat_replaces_and_older_candles_are_dropped() {
        let buf = CandleBuffer::new(10);
        let key = make_key("BTCUSDT", "1m");
        let history = (0..3)
            .map(|i| sample_candle(i * 60_000, 100.0 + i as f64, true))
            .collect();
        buf.extend_closed(key.clone(), history);
        let version = buf.version();

        // Stream delivers the final event for the last backfilled bar.
        buf.update(key.clone(), sample_candle(120_000, 102.5, true));
        // And a late event for an older bar.
        buf.update(key.clone(), sample_candle(60_000, 999.0, true));
        buf.update(key.clone(), sample_candle(60_000, 999.0, false));

        let open_times: Vec<i64> = buf.get_closed(&key, 10).iter().map(|c| c.open_time).collect();
        assert_eq!(open_times, vec![0, 60_000, 120_000]);
        assert_eq!(buf.get_bars(&key, 10).close, vec![100.0, 101.0, 102.5]);
        assert_eq!(buf.count(&key), 3);
        assert_eq!(buf.version(), version + 1);
    }

    #[test]
    fn closed_candle_lands_before_newer_live_candle() {
        let buf = CandleBuffer::new(10);
        let key = make_key("BTCUSDT", "1m");
        buf.update(key.clone(), sample_candle(0, 100.0, true));
        buf.update(key.clone(), sample_candle(120_000, 102.0, false));
        buf.update(key.clone(), sample_candle(60_000, 101.0, true));

        let open_times: Vec<i64> = buf.get_closed(&key, 10).iter().map(|c| c.open_time).collect();
        assert_eq!(open_times, vec![0, 60_000]);
        assert_eq!(buf.count(&key), 3);

        // The live candle closes normally afterwards.
        buf.update(key.clone(), sample_candle(120_000, 102.2, true));
        assert_eq!(buf.count(&key), 3);
        assert_eq!(buf.last_close(&key), Some(102.2));
    }

    #[test]
    fn repeated_backfill_fills_outage_gap() {
        let buf = CandleBuffer::new(10);
        let key = make_key("BTCUSDT", "1m");
        let window = |from: i64, to: i64| -> Vec<Candle> {
            (from..to)
                .map(|i| sample_candle(i * 60_000, 100.0 + i as f64, true))
                .collect()
        };
        assert_eq!(buf.extend_closed(key.clone(), window(0, 4)), 4);
        // Stream dropped after bar 4 was live; bars 4..7 closed during the outage.
        buf.update(key.clone(), sample_candle(4 * 60_000, 104.0, false));
        assert_eq!(buf.extend_closed(key.clone(), window(1, 7)), 3);

        let open_times: Vec<i64> = buf.get_closed(&key, 10).iter().map(|c| c.open_time).collect();
        assert_eq!(open_times, (0..7).map(|i| i * 60_000).collect::<Vec<_>>());
        assert_eq!(buf.count(&key), 7);
    }

    #[test]
    fn remove_drops_market() {
        let buf = CandleBuffer::new(10);
        let key = make_key("BTCUSDT", "1m");
        buf.update(key.clone(), sample_candle(0, 100.0, true));
        assert!(buf.remove(&key));
        assert!(buf.keys().is_empty());
        assert!(!buf.remove(&key));
    }

    #[test]
    fn keys_are_sorted() {
        let buf = CandleBuffer::new(10);
        buf.update(make_key("ETHUSDT", "1m"), sample_candle(0, 1.0, true));
        buf.update(make_key("BTCUSDT", "5m"), sample_candle(0, 1.0, true));
        let keys: Vec<String> = buf.keys().iter().map(ToString::to_string).collect();
        assert_eq!(keys, vec!["BTCUSDT@5m", "ETHUSDT@1m"]);
    }
}
