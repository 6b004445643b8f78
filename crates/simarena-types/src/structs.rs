//! Core entity structs: [`Simulation`], [`Agent`], and [`Step`].
//!
//! These are persisted verbatim in the store's JSON document and a [`Step`]
//! is also the exact payload streamed to live observers, so field names are
//! part of the external contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{Depth, Language, SimulationStatus};
use crate::ids::{AgentId, SimulationId};

/// Round number carried by the transport-only completion step.
///
/// Lies outside every valid `1..=rounds` range so observers can tell the
/// end-of-run notification apart from a real turn.
pub const COMPLETION_ROUND: i32 = -1;

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

/// A participant in a simulation.
///
/// Agents are fixed at creation time. An empty `role` means the agent acts
/// independently; a simulation becomes interactive as soon as any agent has
/// a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Agent {
    /// Identifier, unique within the owning simulation.
    pub id: AgentId,
    /// Display name, also used to label the agent's lines in history.
    pub name: String,
    /// Free-form role description. Empty when the agent has none.
    #[serde(default)]
    pub role: String,
}

impl Agent {
    /// Whether this agent was given a role.
    pub fn has_role(&self) -> bool {
        !self.role.trim().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// One unit of simulation output.
///
/// A persisted step is a single agent turn. The same shape is reused for
/// transport-only notifications (failure and completion), which are
/// broadcast but never appended to [`Simulation::steps`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Step {
    /// Round the step belongs to, or [`COMPLETION_ROUND`].
    pub round: i32,
    /// Acting agent, absent for synthetic and completion steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub agent_id: Option<AgentId>,
    /// Acting agent's name at the time of the turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub agent_name: Option<String>,
    /// Generated text (or error / final result for notifications).
    pub content: String,
    /// When the step was produced.
    pub timestamp: DateTime<Utc>,
}

impl Step {
    /// Build a turn step for `agent` (or the synthetic agent when `None`).
    pub fn turn(
        round: i32,
        agent: Option<&Agent>,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            round,
            agent_id: agent.map(|a| a.id),
            agent_name: agent.map(|a| a.name.clone()),
            content: content.into(),
            timestamp,
        }
    }

    /// Build the end-of-run notification carrying the final result.
    pub fn completion(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            round: COMPLETION_ROUND,
            agent_id: None,
            agent_name: None,
            content: content.into(),
            timestamp,
        }
    }

    /// Whether this is the end-of-run notification.
    pub const fn is_completion(&self) -> bool {
        self.round == COMPLETION_ROUND
    }
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// A complete simulation document: configuration, transcript, and outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Simulation {
    /// Unique simulation identifier.
    pub id: SimulationId,
    /// Scenario description shown to every agent.
    pub description: String,
    /// Initial conditions of the scenario.
    #[serde(default)]
    pub preconditions: String,
    /// Number of rounds to run (1 to 20).
    pub rounds: i32,
    /// Presentation hint for clients: only the final result matters.
    #[serde(default)]
    pub show_only_result: bool,
    /// Participants in turn order.
    #[serde(default)]
    pub agents: Vec<Agent>,
    /// Prompt and response language.
    #[serde(default)]
    pub language: Language,
    /// Token budget preset per turn.
    #[serde(default)]
    pub depth: Depth,
    /// Lifecycle status.
    pub status: SimulationStatus,
    /// Persisted turns, round-major and turn-minor.
    #[serde(default)]
    pub steps: Vec<Step>,
    /// Summary produced after the last round.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub final_result: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Simulation {
    /// A simulation is interactive when any agent has a role.
    ///
    /// Interactive agents see each other's turns and a roster of
    /// co-participants; independent agents only see their own history.
    pub fn is_interactive(&self) -> bool {
        self.agents.iter().any(Agent::has_role)
    }

    /// Number of turns the engine takes per round.
    ///
    /// A simulation without agents still gets one synthetic turn per round.
    pub fn turns_per_round(&self) -> usize {
        self.agents.len().max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(name: &str, role: &str) -> Agent {
        Agent {
            id: AgentId::new(),
            name: name.to_owned(),
            role: role.to_owned(),
        }
    }

    fn simulation(agents: Vec<Agent>) -> Simulation {
        Simulation {
            id: SimulationId::new(),
            description: String::from("D"),
            preconditions: String::new(),
            rounds: 2,
            show_only_result: false,
            agents,
            language: Language::En,
            depth: Depth::Medium,
            status: SimulationStatus::Running,
            steps: Vec::new(),
            final_result: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn interactive_requires_a_non_empty_role() {
        assert!(!simulation(vec![agent("Alice", ""), agent("Bob", "  ")]).is_interactive());
        assert!(simulation(vec![agent("Alice", ""), agent("Bob", "judge")]).is_interactive());
    }

    #[test]
    fn empty_roster_still_takes_one_turn() {
        assert_eq!(simulation(Vec::new()).turns_per_round(), 1);
        assert_eq!(simulation(vec![agent("A", ""), agent("B", "")]).turns_per_round(), 2);
    }

    #[test]
    fn completion_step_has_no_agent() {
        let step = Step::completion("done", Utc::now());
        assert!(step.is_completion());
        let json = serde_json::to_value(&step).unwrap_or_default();
        assert_eq!(json["round"], -1);
        assert!(json.get("agent_id").is_none());
    }

    #[test]
    fn turn_step_carries_agent_identity() {
        let alice = agent("Alice", "");
        let step = Step::turn(1, Some(&alice), "hello", Utc::now());
        assert_eq!(step.agent_id, Some(alice.id));
        assert_eq!(step.agent_name.as_deref(), Some("Alice"));
        assert!(!step.is_completion());
    }

    #[test]
    fn simulation_document_uses_stable_field_names() {
        let sim = simulation(vec![agent("Alice", "")]);
        let json = serde_json::to_value(&sim).unwrap_or_default();
        for field in [
            "id",
            "description",
            "preconditions",
            "rounds",
            "show_only_result",
            "agents",
            "language",
            "depth",
            "status",
            "steps",
            "created_at",
        ] {
            assert!(json.get(field).is_some(), "missing field {field}");
        }
        assert!(json.get("final_result").is_none());
        assert_eq!(json["status"], "running");
    }
}
