use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast::{self, error::RecvError};
use tower_http::cors::CorsLayer;
use tracing::{debug, warn};

use crate::bus::{BroadcastBus, BusMessage};
use crate::db::models::ScoreFingerprint;
use crate::db::ScoreStore;
use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ScoreStore>,
    pub bus: Arc<BroadcastBus>,
    pub metrics: Arc<Metrics>,
    /// Only messages on this topic are forwarded to WebSocket subscribers
    pub topic: String,
}

/// Build the Axum router for metrics, store inspection and update streaming.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/api/scores", get(scores_handler))
        .route("/api/scores/:key/history", get(history_handler))
        .route("/ws/updates", get(updates_ws))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// Parse `addr` and bind the HTTP listener.
pub async fn bind(addr: &str) -> anyhow::Result<TcpListener> {
    let addr: SocketAddr = addr
        .parse()
        .with_context(|| format!("invalid HTTP address '{}'", addr))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    Ok(listener)
}

/// GET /metrics
async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// GET /api/scores
async fn scores_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .store
        .entries()
        .await
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// GET /api/scores/:key/history
async fn history_handler(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let history = state
        .store
        .history(&ScoreFingerprint::from(key))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    if history.is_empty() {
        return Err((StatusCode::NOT_FOUND, "unknown score key".to_string()));
    }
    Ok(Json(history))
}

/// GET /ws/updates: one text frame per score-change event
async fn updates_ws(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    // Subscribe before upgrading so nothing published after the handshake is lost
    let rx = state.bus.subscribe();
    let topic = state.topic.clone();
    ws.on_upgrade(move |socket| stream_updates(socket, rx, topic))
}

async fn stream_updates(socket: WebSocket, mut rx: broadcast::Receiver<BusMessage>, topic: String) {
    let (mut sender, mut receiver) = socket.split();
    debug!(topic = %topic, "Update subscriber connected");

    loop {
        tokio::select! {
            msg = rx.recv() => match msg {
                Ok(msg) if msg.topic == topic => {
                    let text = String::from_utf8_lossy(&msg.payload).into_owned();
                    if sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Update subscriber lagging, events dropped");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    debug!(topic = %topic, "Update subscriber disconnected");
}
