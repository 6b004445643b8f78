//! `WebSocket` handler for live step streaming.
//!
//! Clients connect to `GET /api/simulations/{id}/ws` and receive every
//! [`Step`](simarena_types::Step) the engine emits for that simulation as a
//! JSON text frame, ending with the completion step (`round == -1`) or a
//! failure notice. Nothing is replayed: a client only sees steps emitted
//! while it is connected.

use std::sync::Arc;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use simarena_types::SimulationId;
use tracing::debug;

use crate::error::ObserverError;
use crate::handlers::parse_simulation_id;
use crate::state::AppState;

/// Upgrade to a `WebSocket` after checking that the simulation exists.
///
/// An unknown simulation is reported as 404 before the upgrade headers are
/// looked at.
///
/// # Route
///
/// `GET /api/simulations/{id}/ws`
pub async fn ws_simulation(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ObserverError> {
    let id = parse_simulation_id(&id_str)?;
    state.store.get(id).await?;
    Ok(match ws {
        Ok(ws) => ws.on_upgrade(move |socket| handle_ws(socket, state, id)),
        Err(rejection) => rejection.into_response(),
    })
}

/// Register with the hub, forward frames until either side goes away,
/// then unregister.
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>, simulation_id: SimulationId) {
    let (subscriber, mut rx) = state.hub.subscribe(simulation_id).await;
    debug!(%simulation_id, %subscriber, "WebSocket client connected");

    loop {
        tokio::select! {
            frame = rx.recv() => {
                let Some(frame) = frame else {
                    debug!(%simulation_id, "Subscriber dropped by hub, closing WebSocket");
                    break;
                };
                if socket.send(Message::Text(frame.as_ref().into())).await.is_err() {
                    debug!(%simulation_id, "WebSocket client disconnected (send failed)");
                    break;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(%simulation_id, "WebSocket client disconnected");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!(%simulation_id, "WebSocket client disconnected (pong failed)");
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        debug!(%simulation_id, "WebSocket error: {e}");
                        break;
                    }
                    _ => {
                        // Client text and binary frames carry no meaning here.
                    }
                }
            }
        }
    }

    state.hub.unregister(simulation_id, subscriber).await;
}
