// =============================================================================
// Kloud Analysis — Main Entry Point
// =============================================================================
//
// Loads the runtime config, keeps one kline feed per watched (symbol,
// interval) market and serves the analysis API until Ctrl+C.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use kloud_analysis::app_state::AppState;
use kloud_analysis::binance::BinanceClient;
use kloud_analysis::market_data::{run_kline_stream, CandleKey};
use kloud_analysis::runtime_config::{self, RuntimeConfig};
use kloud_analysis::api;

const RECONNECT_DELAY_SECS: u64 = 5;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Kloud Analysis starting up");

    let config_path = runtime_config::config_path();
    let mut config = RuntimeConfig::load_or_default(&config_path);
    config.apply_env_overrides();
    config.validate().context("invalid runtime config")?;

    info!(
        symbols = ?config.symbols,
        intervals = ?config.intervals,
        capacity = config.candle_capacity,
        "configured markets"
    );

    // ── 2. Build shared state ────────────────────────────────────────────
    let state = Arc::new(AppState::new(config, config_path));
    let client = Arc::new(BinanceClient::new()?);

    // ── 3. Market data supervisor ────────────────────────────────────────
    let supervisor_state = state.clone();
    tokio::spawn(async move {
        supervise_streams(supervisor_state, client).await;
    });

    // ── 4. API server ────────────────────────────────────────────────────
    let bind_addr = runtime_config::bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server on {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    let app = api::router(state.clone());
    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "API server failed");
        }
    });

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 5. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received, stopping");
    server.abort();

    if let Err(e) = state.runtime_config.read().save(&state.config_path) {
        error!(error = %e, "failed to save runtime config on shutdown");
    }

    info!("Kloud Analysis shut down complete.");
    Ok(())
}

/// Keep exactly one feed task per watched market, re-evaluating whenever the
/// watched set changes.
async fn supervise_streams(state: Arc<AppState>, client: Arc<BinanceClient>) {
    let mut tasks: HashMap<CandleKey, JoinHandle<()>> = HashMap::new();

    loop {
        let wanted = state.watched_markets();

        tasks.retain(|key, handle| {
            let keep = wanted.contains(key);
            if !keep {
                info!(market = %key, "stopping market feed");
                handle.abort();
                state.candle_buffer.remove(key);
            }
            keep
        });

        for key in wanted {
            if tasks.contains_key(&key) {
                continue;
            }
            info!(market = %key, "starting market feed");
            let handle = tokio::spawn(run_market(state.clone(), client.clone(), key.clone()));
            tasks.insert(key, handle);
        }

        info!(count = tasks.len(), "market feeds running");
        state.markets_changed.notified().await;
    }
}

/// Follow one market's kline stream forever. Every (re)connect is preceded by
/// a REST backfill so bars that closed while the stream was down are filled in.
async fn run_market(state: Arc<AppState>, client: Arc<BinanceClient>, key: CandleKey) {
    loop {
        backfill(&state, &client, &key).await;

        if let Err(e) = run_kline_stream(&key.symbol, &key.interval, &state.candle_buffer).await {
            error!(market = %key, error = %e, "kline stream error");
        }
        warn!(market = %key, "kline stream ended, reconnecting in {RECONNECT_DELAY_SECS}s");
        tokio::time::sleep(tokio::time::Duration::from_secs(RECONNECT_DELAY_SECS)).await;
    }
}

async fn backfill(state: &AppState, client: &BinanceClient, key: &CandleKey) {
    let limit = state.runtime_config.read().backfill_limit;
    match client.get_klines(&key.symbol, &key.interval, limit).await {
        Ok(candles) => {
            let added = state.candle_buffer.extend_closed(key.clone(), candles);
            info!(market = %key, added, "backfill complete");
        }
        Err(e) => warn!(market = %key, error = %format!("{e:#}"), "backfill failed, continuing with live data"),
    }
}
