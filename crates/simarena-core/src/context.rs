//! Prompt assembly from simulation state.
//!
//! [`ContextBuilder`] is a pure function of its inputs: the same simulation,
//! agent, and round always render the same prompt. Templates are embedded at
//! compile time, one set per [`Language`].

use minijinja::Environment;
use serde::Serialize;
use simarena_types::{Agent, Language, Simulation, Step};

use crate::completion::RenderedPrompt;

/// Simulations longer than this many rounds get a sliding history window.
const WINDOW_MIN_ROUNDS: i32 = 5;

/// The window starts sliding once the current round exceeds this.
const WINDOW_START_ROUND: i32 = 3;

/// Number of completed rounds kept in a sliding window.
const WINDOW_SPAN: i32 = 2;

const TEMPLATES: &[(&str, &str)] = &[
    ("en/turn_system.j2", include_str!("../templates/en/turn_system.j2")),
    ("en/turn_user.j2", include_str!("../templates/en/turn_user.j2")),
    ("en/summary_system.j2", include_str!("../templates/en/summary_system.j2")),
    ("en/summary_user.j2", include_str!("../templates/en/summary_user.j2")),
    ("ru/turn_system.j2", include_str!("../templates/ru/turn_system.j2")),
    ("ru/turn_user.j2", include_str!("../templates/ru/turn_user.j2")),
    ("ru/summary_system.j2", include_str!("../templates/ru/summary_system.j2")),
    ("ru/summary_user.j2", include_str!("../templates/ru/summary_user.j2")),
];

/// Errors raised while rendering a prompt.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    /// A template failed to load or render.
    #[error("prompt template error: {0}")]
    Template(#[from] minijinja::Error),
}

/// The steps an agent gets to see for one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryWindow<'a> {
    /// Visible steps in transcript order.
    pub steps: Vec<&'a Step>,
    /// Whether earlier rounds were cut off.
    pub truncated: bool,
}

/// Select the history visible to `agent` while it acts in `round`.
///
/// Long simulations only show the last two completed rounds once past the
/// third round. Interactive agents also see turns already taken in the
/// current round; independent agents only see their own earlier turns.
pub fn history_window<'a>(sim: &'a Simulation, agent: Option<&Agent>, round: i32) -> HistoryWindow<'a> {
    let truncated = sim.rounds > WINDOW_MIN_ROUNDS && round > WINDOW_START_ROUND;
    let min_round = if truncated {
        round.saturating_sub(WINDOW_SPAN)
    } else {
        1
    };
    let interactive = sim.is_interactive();
    let acting = agent.map(|a| a.id);

    let steps = sim
        .steps
        .iter()
        .filter(|step| {
            if step.round > round || step.round < min_round {
                return false;
            }
            if step.round == round {
                return interactive;
            }
            interactive || step.agent_id == acting
        })
        .collect();

    HistoryWindow { steps, truncated }
}

#[derive(Serialize)]
struct RosterEntry<'a> {
    name: &'a str,
    role: &'a str,
}

#[derive(Serialize)]
struct HistoryEntry<'a> {
    agent_name: Option<&'a str>,
    content: &'a str,
}

#[derive(Serialize)]
struct RoundGroup<'a> {
    round: i32,
    entries: Vec<HistoryEntry<'a>>,
}

#[derive(Serialize)]
struct TurnContext<'a> {
    agent_name: Option<&'a str>,
    agent_role: &'a str,
    description: &'a str,
    preconditions: &'a str,
    interactive: bool,
    others: Vec<RosterEntry<'a>>,
    round: i32,
    rounds: i32,
    history: Vec<RoundGroup<'a>>,
    truncated: bool,
}

#[derive(Serialize)]
struct SummaryContext<'a> {
    description: &'a str,
    preconditions: &'a str,
    transcript: Vec<RoundGroup<'a>>,
}

fn group_by_round<'a>(steps: impl IntoIterator<Item = &'a Step>) -> Vec<RoundGroup<'a>> {
    let mut groups: Vec<RoundGroup<'a>> = Vec::new();
    for step in steps {
        let entry = HistoryEntry {
            agent_name: step.agent_name.as_deref(),
            content: &step.content,
        };
        match groups.last_mut() {
            Some(group) if group.round == step.round => group.entries.push(entry),
            _ => groups.push(RoundGroup {
                round: step.round,
                entries: vec![entry],
            }),
        }
    }
    groups
}

/// Renders turn and summary prompts.
pub struct ContextBuilder {
    env: Environment<'static>,
}

impl ContextBuilder {
    /// Create a builder with all embedded templates loaded.
    pub fn new() -> Result<Self, PromptError> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        for &(name, source) in TEMPLATES {
            env.add_template(name, source)?;
        }
        Ok(Self { env })
    }

    fn render<S: Serialize>(
        &self,
        language: Language,
        name: &str,
        ctx: &S,
    ) -> Result<String, PromptError> {
        let path = format!("{}/{name}.j2", language.code());
        Ok(self.env.get_template(&path)?.render(ctx)?)
    }

    /// Build the prompt for one turn.
    ///
    /// `agent` is `None` for the synthetic turn of a simulation without
    /// agents.
    pub fn build_turn_prompt(
        &self,
        sim: &Simulation,
        agent: Option<&Agent>,
        round: i32,
    ) -> Result<RenderedPrompt, PromptError> {
        let interactive = sim.is_interactive();
        let window = history_window(sim, agent, round);

        let others = if interactive {
            sim.agents
                .iter()
                .filter(|other| agent.is_none_or(|a| a.id != other.id))
                .map(|other| RosterEntry {
                    name: &other.name,
                    role: other.role.trim(),
                })
                .collect()
        } else {
            Vec::new()
        };

        let ctx = TurnContext {
            agent_name: agent.map(|a| a.name.as_str()),
            agent_role: agent.map_or("", |a| a.role.trim()),
            description: &sim.description,
            preconditions: &sim.preconditions,
            interactive,
            others,
            round,
            rounds: sim.rounds,
            history: group_by_round(window.steps),
            truncated: window.truncated,
        };

        Ok(RenderedPrompt {
            system: self.render(sim.language, "turn_system", &ctx)?,
            user: self.render(sim.language, "turn_user", &ctx)?,
        })
    }

    /// Build the prompt asking for the final summary of a finished run.
    pub fn build_summary_prompt(&self, sim: &Simulation) -> Result<RenderedPrompt, PromptError> {
        let ctx = SummaryContext {
            description: &sim.description,
            preconditions: &sim.preconditions,
            transcript: group_by_round(&sim.steps),
        };

        Ok(RenderedPrompt {
            system: self.render(sim.language, "summary_system", &ctx)?,
            user: self.render(sim.language, "summary_user", &ctx)?,
        })
    }
}

impl std::fmt::Debug for ContextBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextBuilder").finish_non_exhaustive()
    }
}
