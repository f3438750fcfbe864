// =============================================================================
// Minimal HTTP/WebSocket surface
// =============================================================================
//
// The operator REST surface (dashboard read, settings, positions, bot
// start/stop, logs, system errors, portfolio) is out of scope; what remains
// is a liveness probe and the operator event stream, both exactly in the
// shape the source's `api` module builds them — an axum router forwarding
// broadcast channels over a WebSocket upgrade.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tower_http::cors::CorsLayer;
use tracing::{debug, warn};

use crate::events::EventBus;

pub fn router(event_bus: Arc<EventBus>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/ws/events", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(event_bus)
}

async fn healthz() -> impl IntoResponse {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

async fn ws_handler(ws: WebSocketUpgrade, State(event_bus): State<Arc<EventBus>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, event_bus))
}

/// Forwards both the progress and alert broadcast channels onto one
/// WebSocket, tagged so the client can tell them apart. Delivery is
/// best-effort: a slow consumer may miss events, matching the external
/// interfaces contract — consumers must tolerate gaps and re-fetch on
/// reconnect.
async fn handle_connection(socket: WebSocket, event_bus: Arc<EventBus>) {
    let (mut sender, mut receiver) = socket.split();
    let mut events_rx = event_bus.subscribe_events();
    let mut alerts_rx = event_bus.subscribe_alerts();

    loop {
        tokio::select! {
            event = events_rx.recv() => {
                match event {
                    Ok(event) => {
                        let payload = serde_json::json!({ "channel": "event", "data": event });
                        if sender.send(Message::Text(payload.to_string())).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            alert = alerts_rx.recv() => {
                match alert {
                    Ok(alert) => {
                        let payload = serde_json::json!({ "channel": "alert", "data": alert });
                        if sender.send(Message::Text(payload.to_string())).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(_))) | Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "event WebSocket receive error");
                        break;
                    }
                }
            }
        }
    }

    debug!("event WebSocket connection closed");
}
