//! Shared application state for the API server.
//!
//! [`AppState`] bundles the services every handler needs: the store that
//! owns simulation documents, the hub that fans out live steps, and the
//! launcher that starts background runs. All three are constructed by the
//! binary and shared through [`Arc`].

use std::sync::Arc;

use simarena_core::engine::RunLauncher;
use simarena_store::SimulationStore;

use crate::hub::BroadcastHub;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Durable simulation collection.
    pub store: Arc<SimulationStore>,
    /// Live step fan-out for `WebSocket` clients.
    pub hub: Arc<BroadcastHub>,
    /// Starts the run for a freshly created simulation.
    pub launcher: Arc<dyn RunLauncher>,
}

impl AppState {
    /// Create application state from its services.
    pub const fn new(
        store: Arc<SimulationStore>,
        hub: Arc<BroadcastHub>,
        launcher: Arc<dyn RunLauncher>,
    ) -> Self {
        Self {
            store,
            hub,
            launcher,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("store", &self.store)
            .field("hub", &self.hub)
            .finish_non_exhaustive()
    }
}
