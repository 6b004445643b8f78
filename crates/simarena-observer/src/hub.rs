//! Per-simulation fan-out of steps to live subscribers.
//!
//! Each subscriber is a bounded [`mpsc`] channel carrying pre-serialized
//! frames. A step is encoded once and offered to every subscriber of its
//! simulation with `try_send`; a subscriber whose channel is full or closed
//! is dropped from the hub without affecting the others.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use simarena_types::{SimulationId, Step};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, warn};
use uuid::Uuid;

/// A JSON-encoded step, shared between all subscribers.
pub type Frame = Arc<str>;

/// Channel capacity for a subscriber created with [`BroadcastHub::subscribe`].
pub const SUBSCRIBER_BUFFER: usize = 64;

/// Identifies one subscriber within a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

type Subscribers = HashMap<SubscriberId, mpsc::Sender<Frame>>;

/// Routes steps to the subscribers of their simulation.
#[derive(Debug, Default)]
pub struct BroadcastHub {
    subscribers: RwLock<HashMap<SimulationId, Subscribers>>,
}

impl BroadcastHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `sender` for steps of `simulation_id`.
    pub async fn register(&self, simulation_id: SimulationId, sender: mpsc::Sender<Frame>) -> SubscriberId {
        let id = SubscriberId::new();
        let mut subs = self.subscribers.write().await;
        subs.entry(simulation_id).or_default().insert(id, sender);
        debug!(%simulation_id, subscriber = %id, "subscriber registered");
        id
    }

    /// Create a channel, register its sender, and return the receiving end.
    pub async fn subscribe(&self, simulation_id: SimulationId) -> (SubscriberId, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let id = self.register(simulation_id, tx).await;
        (id, rx)
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub async fn unregister(&self, simulation_id: SimulationId, subscriber: SubscriberId) {
        let mut subs = self.subscribers.write().await;
        remove_subscribers(&mut subs, simulation_id, &[subscriber]);
        debug!(%simulation_id, %subscriber, "subscriber unregistered");
    }

    /// Deliver `step` to every subscriber of `simulation_id`.
    ///
    /// Returns how many subscribers accepted the frame. Never fails.
    pub async fn broadcast(&self, simulation_id: SimulationId, step: &Step) -> usize {
        let frame: Frame = match serde_json::to_string(step) {
            Ok(json) => json.into(),
            Err(e) => {
                warn!(%simulation_id, error = %e, "failed to serialize step");
                return 0;
            }
        };

        let mut failed = Vec::new();
        let mut delivered: usize = 0;
        {
            let subs = self.subscribers.read().await;
            let Some(targets) = subs.get(&simulation_id) else {
                return 0;
            };
            for (id, sender) in targets {
                if sender.try_send(Arc::clone(&frame)).is_ok() {
                    delivered = delivered.saturating_add(1);
                } else {
                    failed.push(*id);
                }
            }
        }

        if !failed.is_empty() {
            warn!(%simulation_id, dropped = failed.len(), "dropping unresponsive subscribers");
            let mut subs = self.subscribers.write().await;
            remove_subscribers(&mut subs, simulation_id, &failed);
        }

        debug!(%simulation_id, round = step.round, delivered, "step broadcast");
        delivered
    }

    /// Number of live subscribers for `simulation_id`.
    pub async fn subscriber_count(&self, simulation_id: SimulationId) -> usize {
        self.subscribers
            .read()
            .await
            .get(&simulation_id)
            .map_or(0, HashMap::len)
    }

    /// Number of simulations with at least one subscriber.
    pub async fn simulation_count(&self) -> usize {
        self.subscribers.read().await.len()
    }
}

fn remove_subscribers(
    subs: &mut HashMap<SimulationId, Subscribers>,
    simulation_id: SimulationId,
    ids: &[SubscriberId],
) {
    if let Some(targets) = subs.get_mut(&simulation_id) {
        for id in ids {
            targets.remove(id);
        }
        if targets.is_empty() {
            subs.remove(&simulation_id);
        }
    }
}
