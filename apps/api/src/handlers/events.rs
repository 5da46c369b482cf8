// [apps/api/src/handlers/events.rs]
//! `GET /ws` — a tenant's live event stream. Grounded in the corpus's
//! websocket handler shape (split socket, keepalive ticker, a
//! `tokio::select!` loop, first branch to finish tears the rest down)
//! but single-directional: this surface is read-only, so there is no
//! upstream command channel to mirror.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Extension;
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, warn};

use aegis_infra_eventbus::OutboundCoalescer;

use crate::middleware::TenantIdentity;
use crate::state::AppState;

const KEEPALIVE_INTERVAL_SECONDS: u64 = 25;
/// Above this many buffered frames, coalescible events collapse to
/// last-value-per-(connection, kind) rather than growing unbounded
/// while a slow client catches up.
const COALESCE_THRESHOLD: usize = 200;

pub async fn subscribe(websocket_upgrade: WebSocketUpgrade, State(state): State<AppState>, Extension(identity): Extension<TenantIdentity>) -> impl IntoResponse {
    websocket_upgrade.on_upgrade(move |socket| stream_tenant_events(socket, state, identity))
}

async fn stream_tenant_events(socket: WebSocket, state: AppState, identity: TenantIdentity) {
    let (mut sender, mut receiver) = socket.split();
    let mut bus_subscription = state.event_bus.subscribe(&identity.organization_id).await;
    let organization_id = identity.organization_id.clone();

    debug!("websocket event stream opened for org [{organization_id}]");

    let mut send_task = tokio::spawn(async move {
        let mut keepalive = interval(Duration::from_secs(KEEPALIVE_INTERVAL_SECONDS));
        let mut coalescer = OutboundCoalescer::new(COALESCE_THRESHOLD);

        loop {
            tokio::select! {
                _ = keepalive.tick() => {
                    if sender.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                    for event in coalescer.drain() {
                        let Ok(frame) = serde_json::to_string(&event) else { continue };
                        if sender.send(Message::Text(frame)).await.is_err() {
                            return;
                        }
                    }
                }
                received = bus_subscription.recv() => {
                    match received {
                        Ok(event) => {
                            coalescer.push(event);
                            // Drain whatever else is already queued on the
                            // channel without waiting, so a burst coalesces
                            // into one flush instead of one send per event.
                            while let Ok(more) = bus_subscription.try_recv() {
                                coalescer.push(more);
                            }
                            for event in coalescer.drain() {
                                let Ok(frame) = serde_json::to_string(&event) else { continue };
                                if sender.send(Message::Text(frame)).await.is_err() {
                                    return;
                                }
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("org [{organization_id}] websocket subscriber lagged, skipped {skipped} events");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }
    });

    let mut receive_task = tokio::spawn(async move {
        while let Some(message) = receiver.next().await {
            match message {
                Ok(Message::Close(_)) => break,
                Err(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => receive_task.abort(),
        _ = &mut receive_task => send_task.abort(),
    }
}
