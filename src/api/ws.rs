// =============================================================================
// WebSocket Handler — Push-based indicator snapshots
// =============================================================================
//
// Clients connect to `/api/v1/ws?token=<token>[&symbol=..&interval=..]` and
// receive:
//   1. An immediate snapshot on connect.
//   2. A fresh snapshot every `snapshot_interval_ms` whenever the candle
//      buffer version has changed since the last push.
//
// With `symbol` and `interval` the payload is that market's `MarketSnapshot`;
// without them it is the list of snapshots for every buffered market.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::{Sink, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

use crate::api::auth::validate_token;
use crate::app_state::{AppState, MarketSnapshot};
use crate::market_data::CandleKey;

// =============================================================================
// Query parameters
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
    symbol: Option<String>,
    interval: Option<String>,
}

#[derive(Serialize)]
struct SnapshotMessage {
    seq: u64,
    data_version: u64,
    markets: Vec<MarketSnapshot>,
}

// =============================================================================
// WebSocket upgrade handler
// =============================================================================

/// Validates the `?token=` query parameter before upgrading.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsQuery>,
) -> impl IntoResponse {
    let token = query.token.unwrap_or_default();
    if !validate_token(&token) {
        warn!("WebSocket connection rejected: invalid token");
        return (StatusCode::FORBIDDEN, "Invalid or missing token").into_response();
    }

    let filter = match (query.symbol, query.interval) {
        (Some(symbol), Some(interval)) => Some(CandleKey::new(&symbol, &interval)),
        (None, None) => None,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                "symbol and interval must be given together",
            )
                .into_response()
        }
    };

    info!(market = ?filter, "WebSocket connection accepted, upgrading");
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state, filter))
        .into_response()
}

// =============================================================================
// Connection handler
// =============================================================================

/// Runs the push ticker and the receive loop on one task via `tokio::select!`.
async fn handle_ws_connection(socket: WebSocket, state: Arc<AppState>, filter: Option<CandleKey>) {
    let open = state.connection_opened();
    debug!(open, "WebSocket subscriber added");

    let (mut sender, mut receiver) = socket.split();
    let mut sequence: u64 = 0;

    if let Err(e) = send_snapshot(&mut sender, &state, filter.as_ref(), &mut sequence).await {
        warn!(error = %e, "failed to send initial WebSocket snapshot");
        state.connection_closed();
        return;
    }
    let mut last_sent_version = state.data_version();

    let period = state.runtime_config.read().snapshot_interval_ms.max(1);
    let mut push_interval = interval(Duration::from_millis(period));

    loop {
        tokio::select! {
            _ = push_interval.tick() => {
                let current_version = state.data_version();
                if current_version != last_sent_version {
                    match send_snapshot(&mut sender, &state, filter.as_ref(), &mut sequence).await {
                        Ok(()) => last_sent_version = current_version,
                        Err(e) => {
                            debug!(error = %e, "WebSocket send failed, disconnecting");
                            break;
                        }
                    }
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = sender.send(Message::Pong(data)).await {
                            debug!(error = %e, "failed to send Pong, disconnecting");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("WebSocket Close frame received");
                        break;
                    }
                    Some(Ok(other)) => {
                        debug!(?other, "ignoring client WebSocket message");
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket receive error, disconnecting");
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    state.connection_closed();
    info!("WebSocket connection closed");
}

// =============================================================================
// Helpers
// =============================================================================

fn collect_snapshots(state: &AppState, filter: Option<&CandleKey>) -> Vec<MarketSnapshot> {
    match filter {
        Some(key) => state.market_snapshot(key).into_iter().collect(),
        None => state
            .candle_buffer
            .keys()
            .iter()
            .filter_map(|key| state.market_snapshot(key))
            .collect(),
    }
}

async fn send_snapshot<S>(
    sender: &mut S,
    state: &AppState,
    filter: Option<&CandleKey>,
    sequence: &mut u64,
) -> Result<(), axum::Error>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    *sequence += 1;
    let message = SnapshotMessage {
        seq: *sequence,
        data_version: state.data_version(),
        markets: collect_snapshots(state, filter),
    };

    match serde_json::to_string(&message) {
        Ok(json) => {
            sender.send(Message::Text(json)).await?;
            debug!(seq = message.seq, markets = message.markets.len(), "WebSocket snapshot sent");
            Ok(())
        }
        Err(e) => {
            // Not a network error; keep the connection.
            warn!(error = %e, "failed to serialize snapshot");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::market_data::Candle;
    use crate::runtime_config::RuntimeConfig;

    #[test]
    fn snapshots_respect_market_filter() {
        let state = AppState::new(RuntimeConfig::default(), PathBuf::from("unused.json"));
        for symbol in ["BTCUSDT", "ETHUSDT"] {
            let candles = (0..3)
                .map(|i| Candle::new(i * 60_000, 1.0, 2.0, 0.5, 1.5, 10.0, i * 60_000 + 59_999))
                .collect();
            state
                .candle_buffer
                .extend_closed(CandleKey::new(symbol, "1m"), candles);
        }

        assert_eq!(collect_snapshots(&state, None).len(), 2);
        let eth = CandleKey::new("ethusdt", "1m");
        let only = collect_snapshots(&state, Some(&eth));
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].symbol, "ETHUSDT");
        assert!(collect_snapshots(&state, Some(&CandleKey::new("XRPUSDT", "1m"))).is_empty());
    }

    const TOKEN: &str = "kloud-test-token";

    /// Serve the router on an ephemeral port and return its base ws:// URL.
    async fn spawn_server(state: Arc<AppState>) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, crate::api::router(state)).await.unwrap();
        });
        format!("ws://{addr}/api/v1/ws")
    }

    fn seeded_state() -> Arc<AppState> {
        let state = AppState::new(RuntimeConfig::default(), PathBuf::from("unused.json"));
        let candles = (0..3)
            .map(|i| Candle::new(i * 60_000, 1.0, 2.0, 0.5, 1.5, 10.0, i * 60_000 + 59_999))
            .collect();
        state
            .candle_buffer
            .extend_closed(CandleKey::new("BTCUSDT", "1m"), candles);
        Arc::new(state)
    }

    async fn rejected_status(url: &str) -> u16 {
        match tokio_tungstenite::connect_async(url).await {
            Err(tokio_tungstenite::tungstenite::Error::Http(resp)) => resp.status().as_u16(),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("upgrade should have been refused"),
        }
    }

    #[tokio::test]
    async fn bad_token_is_forbidden() {
        std::env::set_var(crate::runtime_config::ADMIN_TOKEN_ENV, TOKEN);
        let base = spawn_server(seeded_state()).await;
        assert_eq!(rejected_status(&base).await, 403);
        assert_eq!(rejected_status(&format!("{base}?token=wrong")).await, 403);
    }

    #[tokio::test]
    async fn symbol_without_interval_is_bad_request() {
        std::env::set_var(crate::runtime_config::ADMIN_TOKEN_ENV, TOKEN);
        let base = spawn_server(seeded_state()).await;
        let url = format!("{base}?token={TOKEN}&symbol=BTCUSDT");
        assert_eq!(rejected_status(&url).await, 400);
    }

    #[tokio::test]
    async fn valid_token_receives_snapshot_on_connect() {
        use tokio_tungstenite::tungstenite::Message as WsMessage;

        std::env::set_var(crate::runtime_config::ADMIN_TOKEN_ENV, TOKEN);
        let base = spawn_server(seeded_state()).await;
        let url = format!("{base}?token={TOKEN}&symbol=btcusdt&interval=1m");
        let (mut socket, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();

        let first = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let text = match first {
            WsMessage::Text(text) => text,
            other => panic!("expected a text frame, got {other:?}"),
        };
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["seq"], 1);
        assert_eq!(json["markets"].as_array().unwrap().len(), 1);
        assert_eq!(json["markets"][0]["symbol"], "BTCUSDT");
        assert_eq!(json["markets"][0]["candles"], 3);
    }
}
