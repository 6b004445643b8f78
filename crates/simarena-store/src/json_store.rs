//! The simulation collection file.
//!
//! [`SimulationStore`] serializes all access through a single async mutex.
//! Every operation reads the entire array, mutates it in memory, and (for
//! writes) rewrites the file in full before releasing the lock.

use std::path::{Path, PathBuf};

use simarena_types::{Simulation, SimulationId};
use tokio::sync::Mutex;

use crate::error::StoreError;

/// File name of the collection inside the data directory.
pub const COLLECTION_FILE: &str = "simulations.json";

/// Durable collection of simulations keyed by id.
#[derive(Debug)]
pub struct SimulationStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl SimulationStore {
    /// Open the store rooted at `data_dir`, creating the directory if needed.
    ///
    /// The collection file itself is created lazily on first write.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be created.
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = data_dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(COLLECTION_FILE);
        tracing::info!(path = %path.display(), "Opened simulation store");
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    /// Path of the collection file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Vec<Simulation>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn write_all(&self, sims: &[Simulation]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(sims)?;
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }

    /// Append a new simulation.
    ///
    /// Ids are generated fresh by the caller, so no collision check is made.
    pub async fn create(&self, sim: &Simulation) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut sims = self.read_all().await?;
        sims.push(sim.clone());
        self.write_all(&sims).await?;
        tracing::debug!(simulation_id = %sim.id, "Created simulation");
        Ok(())
    }

    /// Fetch one simulation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no simulation has this id.
    pub async fn get(&self, id: SimulationId) -> Result<Simulation, StoreError> {
        let _guard = self.lock.lock().await;
        self.read_all()
            .await?
            .into_iter()
            .find(|s| s.id == id)
            .ok_or(StoreError::NotFound(id))
    }

    /// All simulations, in insertion order.
    pub async fn list(&self) -> Result<Vec<Simulation>, StoreError> {
        let _guard = self.lock.lock().await;
        self.read_all().await
    }

    /// Replace the stored simulation that has `sim.id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if it was never created or has been
    /// deleted.
    pub async fn update(&self, sim: &Simulation) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut sims = self.read_all().await?;
        let slot = sims
            .iter_mut()
            .find(|s| s.id == sim.id)
            .ok_or(StoreError::NotFound(sim.id))?;
        slot.clone_from(sim);
        self.write_all(&sims).await
    }

    /// Remove a simulation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no simulation has this id.
    pub async fn delete(&self, id: SimulationId) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut sims = self.read_all().await?;
        let before = sims.len();
        sims.retain(|s| s.id != id);
        if sims.len() == before {
            return Err(StoreError::NotFound(id));
        }
        self.write_all(&sims).await?;
        tracing::debug!(simulation_id = %id, "Deleted simulation");
        Ok(())
    }
}
