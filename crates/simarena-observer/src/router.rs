//! Axum router construction for the API.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS restricted to the configured web client origin.

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderValue, Method, header};
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router.
///
/// The router includes:
/// - `GET /health` -- liveness probe
/// - `POST /api/simulations` -- create and start a simulation
/// - `GET /api/simulations` -- list simulations
/// - `GET /api/simulations/{id}` -- single simulation
/// - `DELETE /api/simulations/{id}` -- delete a simulation
/// - `GET /api/simulations/{id}/ws` -- live step stream
///
/// `cors_origin` is the single origin allowed to call the API from a
/// browser. An unparseable origin disables cross-origin access.
pub fn build_router(state: Arc<AppState>, cors_origin: &str) -> Router {
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);
    match HeaderValue::from_str(cors_origin) {
        Ok(origin) => cors = cors.allow_origin(origin),
        Err(e) => warn!(cors_origin, error = %e, "Invalid CORS origin, cross-origin requests disabled"),
    }

    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/simulations",
            get(handlers::list_simulations).post(handlers::create_simulation),
        )
        .route(
            "/api/simulations/{id}",
            get(handlers::get_simulation).delete(handlers::delete_simulation),
        )
        .route("/api/simulations/{id}/ws", get(ws::ws_simulation))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
