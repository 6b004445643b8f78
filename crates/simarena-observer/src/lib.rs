//! HTTP and `WebSocket` API for simarena.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **REST endpoints** to create, list, fetch and delete simulations
//! - **`WebSocket` endpoint** (`/api/simulations/{id}/ws`) streaming every
//!   step of a running simulation as JSON
//! - **Health check** (`GET /health`)
//!
//! # Architecture
//!
//! Simulations live in the [`SimulationStore`](simarena_store::SimulationStore);
//! handlers read and write it directly. Creating a simulation hands it to a
//! [`RunLauncher`](simarena_core::engine::RunLauncher), which runs it in the
//! background. Live steps reach clients through the [`BroadcastHub`], which
//! keeps one bounded channel per connected socket.

pub mod error;
pub mod handlers;
pub mod hub;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use hub::{BroadcastHub, SubscriberId};
pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use state::AppState;
