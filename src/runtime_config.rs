// =============================================================================
// Runtime Configuration — service settings with atomic save
// =============================================================================
//
// Watched markets, buffer sizes, indicator defaults for snapshots and the
// risk-report defaults all live here. The file is JSON; every field carries a
// serde default so that older files keep loading when fields are added.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash. A few settings can be overridden from the environment (or `.env`).
//
// =============================================================================

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::analytics::RiskConfig;
use crate::market_data::kline_stream::SUPPORTED_INTERVALS;

pub const CONFIG_PATH_ENV: &str = "KLOUD_CONFIG";
pub const SYMBOLS_ENV: &str = "KLOUD_SYMBOLS";
pub const BIND_ADDR_ENV: &str = "KLOUD_BIND_ADDR";
pub const ADMIN_TOKEN_ENV: &str = "KLOUD_ADMIN_TOKEN";

const DEFAULT_CONFIG_PATH: &str = "analysis_config.json";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3001";

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_symbols() -> Vec<String> {
    vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()]
}

fn default_intervals() -> Vec<String> {
    vec!["1m".to_string(), "1h".to_string()]
}

fn default_candle_capacity() -> usize {
    500
}

fn default_backfill_limit() -> u32 {
    500
}

fn default_snapshot_interval_ms() -> u64 {
    1000
}

fn default_period() -> usize {
    14
}

fn default_bollinger_period() -> usize {
    20
}

fn default_bollinger_std() -> f64 {
    2.0
}

fn default_macd_fast() -> usize {
    12
}

fn default_macd_slow() -> usize {
    26
}

fn default_macd_signal() -> usize {
    9
}

// =============================================================================
// IndicatorDefaults
// =============================================================================

/// Periods used for the per-market indicator snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorDefaults {
    #[serde(default = "default_period")]
    pub rsi_period: usize,

    #[serde(default = "default_period")]
    pub atr_period: usize,

    #[serde(default = "default_period")]
    pub adx_period: usize,

    #[serde(default = "default_bollinger_period")]
    pub bollinger_period: usize,

    /// Band width in standard deviations.
    #[serde(default = "default_bollinger_std")]
    pub bollinger_std: f64,

    #[serde(default = "default_macd_fast")]
    pub macd_fast: usize,

    #[serde(default = "default_macd_slow")]
    pub macd_slow: usize,

    #[serde(default = "default_macd_signal")]
    pub macd_signal: usize,
}

impl Default for IndicatorDefaults {
    fn default() -> Self {
        Self {
            rsi_period: default_period(),
            atr_period: default_period(),
            adx_period: default_period(),
            bollinger_period: default_bollinger_period(),
            bollinger_std: default_bollinger_std(),
            macd_fast: default_macd_fast(),
            macd_slow: default_macd_slow(),
            macd_signal: default_macd_signal(),
        }
    }
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level runtime configuration for the analysis service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Markets -------------------------------------------------------------

    /// Symbols kept live in the candle buffer.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    /// Kline intervals subscribed for every symbol.
    #[serde(default = "default_intervals")]
    pub intervals: Vec<String>,

    /// Closed candles retained per (symbol, interval).
    #[serde(default = "default_candle_capacity")]
    pub candle_capacity: usize,

    /// Candles fetched over REST before the live stream starts.
    #[serde(default = "default_backfill_limit")]
    pub backfill_limit: u32,

    // --- Push feed -----------------------------------------------------------

    /// How often WebSocket subscribers are checked for a new snapshot.
    #[serde(default = "default_snapshot_interval_ms")]
    pub snapshot_interval_ms: u64,

    // --- Analysis defaults ---------------------------------------------------

    #[serde(default)]
    pub indicator_defaults: IndicatorDefaults,

    /// Defaults for `POST /analysis/risk` when the request omits a config.
    #[serde(default)]
    pub risk: RiskConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            intervals: default_intervals(),
            candle_capacity: default_candle_capacity(),
            backfill_limit: default_backfill_limit(),
            snapshot_interval_ms: default_snapshot_interval_ms(),
            indicator_defaults: IndicatorDefaults::default(),
            risk: RiskConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbols = ?config.symbols,
            intervals = ?config.intervals,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Load from `path`, falling back to defaults when the file is missing or
    /// malformed.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "using default runtime config");
                Self::default()
            }
        }
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }

    /// Apply `KLOUD_SYMBOLS` if it is set and non-empty.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(raw) = std::env::var(SYMBOLS_ENV) {
            let symbols = parse_symbol_list(&raw);
            if symbols.is_empty() {
                warn!(var = SYMBOLS_ENV, "ignoring empty symbol override");
            } else {
                info!(symbols = ?symbols, "symbols overridden from environment");
                self.symbols = symbols;
            }
        }
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.candle_capacity == 0 {
            anyhow::bail!("candle_capacity must be positive");
        }
        if self.snapshot_interval_ms == 0 {
            anyhow::bail!("snapshot_interval_ms must be positive");
        }
        for interval in &self.intervals {
            if !SUPPORTED_INTERVALS.contains(&interval.as_str()) {
                anyhow::bail!("unsupported kline interval '{interval}'");
            }
        }
        self.risk
            .validate()
            .context("invalid risk defaults")?;
        Ok(())
    }
}

/// Comma-separated symbols, trimmed and uppercased, blanks and duplicates
/// dropped.
pub fn parse_symbol_list(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for symbol in raw.split(',').map(|s| s.trim().to_uppercase()) {
        if !symbol.is_empty() && !out.contains(&symbol) {
            out.push(symbol);
        }
    }
    out
}

pub fn config_path() -> PathBuf {
    std::env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

pub fn bind_addr() -> String {
    std::env::var(BIND_ADDR_ENV).unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string())
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.symbols, vec!["BTCUSDT", "ETHUSDT"]);
        assert_eq!(cfg.candle_capacity, 500);
        assert_eq!(cfg.backfill_limit, 500);
        assert_eq!(cfg.snapshot_interval_ms, 1000);
        assert_eq!(cfg.indicator_defaults.rsi_period, 14);
        assert_eq!(cfg.indicator_defaults.bollinger_period, 20);
        assert!((cfg.indicator_defaults.bollinger_std - 2.0).abs() < f64::EPSILON);
        assert_eq!(cfg.indicator_defaults.macd_slow, 26);
        assert!((cfg.risk.var_confidence - 95.0).abs() < f64::EPSILON);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, RuntimeConfig::default());
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{ "symbols": ["SOLUSDT"], "indicator_defaults": { "rsi_period": 7 } }"#;
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.symbols, vec!["SOLUSDT"]);
        assert_eq!(cfg.indicator_defaults.rsi_period, 7);
        assert_eq!(cfg.indicator_defaults.atr_period, 14);
        assert_eq!(cfg.intervals, vec!["1m", "1h"]);
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = std::env::temp_dir().join(format!("kloud-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("analysis_config.json");

        let mut cfg = RuntimeConfig::default();
        cfg.symbols = vec!["XRPUSDT".to_string()];
        cfg.save(&path).unwrap();

        assert!(!path.with_extension("json.tmp").exists());
        assert_eq!(RuntimeConfig::load(&path).unwrap(), cfg);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = RuntimeConfig::load_or_default("/nonexistent/kloud/config.json");
        assert_eq!(cfg, RuntimeConfig::default());
    }

    #[test]
    fn validate_rejects_bad_settings() {
        let mut cfg = RuntimeConfig::default();
        cfg.intervals.push("7m".to_string());
        assert!(cfg.validate().is_err());

        let mut cfg = RuntimeConfig::default();
        cfg.candle_capacity = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = RuntimeConfig::default();
        cfg.risk.var_confidence = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn symbol_list_parsing() {
        assert_eq!(
            parse_symbol_list(" btcusdt, ETHUSDT,,btcusdt "),
            vec!["BTCUSDT", "ETHUSDT"]
        );
        assert!(parse_symbol_list(" , ").is_empty());
    }
}
