//! Shared type definitions for simarena.
//!
//! This crate is the single source of truth for the simulation data model.
//! The same structs are persisted by the store, produced by the engine, and
//! streamed to observers, and they flow to `TypeScript` via `ts-rs` for the
//! web client.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for simulations and agents
//! - [`enums`] -- Language, depth preset, and lifecycle status
//! - [`structs`] -- `Simulation`, `Agent`, and `Step`
//! - [`request`] -- Creation request and its validation rules

pub mod enums;
pub mod ids;
pub mod request;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{Depth, Language, SimulationStatus};
pub use ids::{AgentId, SimulationId};
pub use request::{AgentRequest, CreateSimulationRequest, ValidationError};
pub use structs::{Agent, COMPLETION_ROUND, Simulation, Step};
