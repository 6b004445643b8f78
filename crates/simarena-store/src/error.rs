//! Error types for the data layer.
//!
//! All store operations report failures through [`StoreError`]. A missing
//! simulation is an ordinary outcome and gets its own variant so callers can
//! map it to a 404 without inspecting I/O errors.

use simarena_types::SimulationId;

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the collection file failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The collection file could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No simulation with this id exists.
    #[error("simulation not found: {0}")]
    NotFound(SimulationId),
}
