//! Step callback that feeds the `WebSocket` broadcast hub.

use std::sync::Arc;

use simarena_core::engine::StepCallback;
use simarena_observer::BroadcastHub;
use simarena_types::{SimulationId, Step};
use tracing::debug;

/// Forwards every engine step to the subscribers of its simulation.
#[derive(Debug, Clone)]
pub struct HubCallback {
    hub: Arc<BroadcastHub>,
}

impl HubCallback {
    /// Create a callback backed by the given hub.
    pub const fn new(hub: Arc<BroadcastHub>) -> Self {
        Self { hub }
    }
}

impl StepCallback for HubCallback {
    async fn on_step(&self, simulation_id: SimulationId, step: &Step) {
        let receivers = self.hub.broadcast(simulation_id, step).await;
        debug!(%simulation_id, round = step.round, receivers, "Step forwarded to hub");
    }
}
