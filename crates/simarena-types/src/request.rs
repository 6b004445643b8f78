//! Simulation creation request and its validation rules.
//!
//! A [`CreateSimulationRequest`] is the only way a [`Simulation`] comes into
//! existence. Validation happens here, synchronously, before any run is
//! started; an invalid request never reaches the store or the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use validator::Validate;

use crate::enums::{Depth, Language, SimulationStatus};
use crate::ids::{AgentId, SimulationId};
use crate::structs::{Agent, Simulation};

/// Errors raised when a creation request is malformed.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// One or more field rules failed.
    #[error("invalid simulation request: {0}")]
    Fields(#[from] validator::ValidationErrors),
}

/// An agent as submitted by the client, before an id is assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AgentRequest {
    /// Display name (must not be blank).
    #[validate(custom(function = "not_blank"))]
    pub name: String,
    /// Optional role; empty means independent.
    #[serde(default)]
    pub role: String,
}

/// Body of `POST /api/simulations`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CreateSimulationRequest {
    /// Scenario description (must not be blank).
    #[validate(custom(function = "not_blank"))]
    pub description: String,
    /// Initial conditions.
    #[serde(default)]
    pub preconditions: String,
    /// Number of rounds, 1 to 20 inclusive.
    #[validate(range(min = 1, max = 20))]
    pub rounds: i32,
    /// Presentation hint for clients.
    #[serde(default)]
    pub show_only_result: bool,
    /// Participants in turn order, at most ten.
    #[serde(default)]
    #[validate(length(max = 10), nested)]
    pub agents: Vec<AgentRequest>,
    /// Prompt and response language, English when omitted.
    #[serde(default)]
    pub language: Language,
    /// Turn length preset, medium when omitted.
    #[serde(default)]
    pub depth: Depth,
}

impl CreateSimulationRequest {
    /// Validate the request and turn it into a fresh, running [`Simulation`].
    ///
    /// Assigns new simulation and agent ids. The returned simulation has no
    /// steps and no final result.
    pub fn into_simulation(self, created_at: DateTime<Utc>) -> Result<Simulation, ValidationError> {
        self.validate()?;

        let agents = self
            .agents
            .into_iter()
            .map(|a| Agent {
                id: AgentId::new(),
                name: a.name.trim().to_owned(),
                role: a.role.trim().to_owned(),
            })
            .collect();

        Ok(Simulation {
            id: SimulationId::new(),
            description: self.description,
            preconditions: self.preconditions,
            rounds: self.rounds,
            show_only_result: self.show_only_result,
            agents,
            language: self.language,
            depth: self.depth,
            status: SimulationStatus::Running,
            steps: Vec::new(),
            final_result: None,
            created_at,
        })
    }
}

fn not_blank(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        return Err(validator::ValidationError::new("blank"));
    }
    Ok(())
}
