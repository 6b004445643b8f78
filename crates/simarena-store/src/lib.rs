//! Data layer for simarena.
//!
//! Every simulation lives in a single JSON document, `simulations.json`,
//! inside the configured data directory. Each operation reads the whole
//! collection, changes it, and writes it back under one lock, so the file
//! is always a complete, valid array.
//!
//! # Modules
//!
//! - [`json_store`] -- [`SimulationStore`], the collection file and its
//!   CRUD operations
//! - [`error`] -- Shared error types

pub mod error;
pub mod json_store;

// Re-export primary types for convenience.
pub use error::StoreError;
pub use json_store::{COLLECTION_FILE, SimulationStore};
