//! The orchestration engine: runs a simulation's rounds to completion.
//!
//! A run is a single background task. For every round and every agent in
//! turn order it renders a prompt, asks the completion backend for a turn,
//! persists the whole simulation, and hands the new [`Step`] to the
//! [`StepCallback`]. After the last round it requests a summary, marks the
//! simulation completed and emits the completion step.
//!
//! A failed turn ends the run immediately with status `failed`. A failed
//! summary does not: the error text becomes the final result instead.
//!
//! Each simulation id can be launched at most once per engine.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use simarena_store::SimulationStore;
use simarena_types::{Agent, Depth, Simulation, SimulationId, SimulationStatus, Step};
use tokio::task::JoinHandle;
use tracing::{Instrument, info, info_span, warn};

use crate::completion::{CompletionClient, CompletionError};
use crate::context::{ContextBuilder, PromptError};

/// Maximum response tokens for a turn at the given depth. Zero means no cap.
pub const fn token_budget(depth: Depth) -> u32 {
    match depth {
        Depth::Shallow => 400,
        Depth::Medium => 1200,
        Depth::Deep => 0,
    }
}

/// Receives every step the engine emits.
///
/// Called after each persisted turn, for the failure notice, and for the
/// completion step. Implementations must not fail; delivery problems are
/// theirs to absorb.
pub trait StepCallback: Send + Sync + 'static {
    /// Handle one emitted step.
    fn on_step(&self, simulation_id: SimulationId, step: &Step) -> impl Future<Output = ()> + Send;
}

/// A callback that discards every step.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpCallback;

impl StepCallback for NoOpCallback {
    async fn on_step(&self, _simulation_id: SimulationId, _step: &Step) {}
}

/// Object-safe handle for starting runs, used by the HTTP layer.
///
/// The background task is detached: callers only learn whether the launch
/// was accepted.
pub trait RunLauncher: Send + Sync {
    /// Start running `sim` in the background.
    fn start(&self, sim: Simulation) -> Result<(), EngineError>;
}

/// Errors returned when launching a run.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// This simulation has already been launched.
    #[error("simulation {0} has already been launched")]
    AlreadyLaunched(SimulationId),

    /// The simulation is not in the `running` state.
    #[error("simulation {0} is not running")]
    NotRunning(SimulationId),
}

/// Why a single turn produced no step.
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    /// The prompt could not be rendered.
    #[error(transparent)]
    Prompt(#[from] PromptError),

    /// The backend gave up.
    #[error(transparent)]
    Completion(#[from] CompletionError),
}

/// Position of a run in its state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// About to take turn `turn_index` of `round`.
    Running {
        /// Current round, starting at 1.
        round: i32,
        /// Index into the agent list (0 for the synthetic turn).
        turn_index: usize,
    },
    /// All rounds done; the summary is being produced.
    Summarizing,
    /// Finished with a final result.
    Completed,
    /// Stopped by a failed turn.
    Failed,
}

impl RunState {
    /// Initial state for a simulation with `rounds` rounds.
    pub const fn start(rounds: i32) -> Self {
        if rounds >= 1 {
            Self::Running {
                round: 1,
                turn_index: 0,
            }
        } else {
            Self::Summarizing
        }
    }

    /// State after a successful turn.
    pub const fn advance(self, rounds: i32, turns_per_round: usize) -> Self {
        match self {
            Self::Running { round, turn_index } => {
                let next = turn_index.saturating_add(1);
                if next < turns_per_round {
                    Self::Running {
                        round,
                        turn_index: next,
                    }
                } else if round < rounds {
                    Self::Running {
                        round: round.saturating_add(1),
                        turn_index: 0,
                    }
                } else {
                    Self::Summarizing
                }
            }
            other => other,
        }
    }
}

struct EngineInner<C, K> {
    client: C,
    store: Arc<SimulationStore>,
    callback: K,
    context: ContextBuilder,
    /// Every id ever launched. Never pruned, so an id cannot run twice even
    /// after its record is deleted.
    launched: Mutex<HashSet<SimulationId>>,
}

/// Drives simulation runs against a completion backend.
///
/// Cloning is cheap; clones share the launched-id registry.
pub struct Engine<C, K> {
    inner: Arc<EngineInner<C, K>>,
}

impl<C, K> Clone for Engine<C, K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: CompletionClient, K: StepCallback> Engine<C, K> {
    /// Create an engine.
    pub fn new(client: C, store: Arc<SimulationStore>, callback: K) -> Result<Self, PromptError> {
        Ok(Self {
            inner: Arc::new(EngineInner {
                client,
                store,
                callback,
                context: ContextBuilder::new()?,
                launched: Mutex::new(HashSet::new()),
            }),
        })
    }

    /// Spawn the run for `sim` and return its task handle.
    ///
    /// The simulation must be `running` and must not have been launched
    /// before by this engine.
    pub fn launch(&self, sim: Simulation) -> Result<JoinHandle<RunState>, EngineError> {
        if sim.status != SimulationStatus::Running {
            return Err(EngineError::NotRunning(sim.id));
        }
        {
            let mut launched = self
                .inner
                .launched
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if !launched.insert(sim.id) {
                return Err(EngineError::AlreadyLaunched(sim.id));
            }
        }

        let span = info_span!("simulation", simulation_id = %sim.id);
        let inner = Arc::clone(&self.inner);
        Ok(tokio::spawn(async move { inner.execute(sim).await }.instrument(span)))
    }
}

impl<C: CompletionClient, K: StepCallback> RunLauncher for Engine<C, K> {
    fn start(&self, sim: Simulation) -> Result<(), EngineError> {
        self.launch(sim).map(drop)
    }
}

impl<C: CompletionClient, K: StepCallback> EngineInner<C, K> {
    async fn execute(&self, mut sim: Simulation) -> RunState {
        let budget = token_budget(sim.depth);
        let turns = sim.turns_per_round();
        let mut state = RunState::start(sim.rounds);
        info!(rounds = sim.rounds, agents = sim.agents.len(), "run started");

        while let RunState::Running { round, turn_index } = state {
            let agent = sim.agents.get(turn_index).cloned();
            let agent_name = agent.as_ref().map_or("-", |a| a.name.as_str());

            match self.take_turn(&sim, agent.as_ref(), round, budget).await {
                Ok(content) => {
                    let step = Step::turn(round, agent.as_ref(), content, Utc::now());
                    sim.steps.push(step.clone());
                    self.persist(&sim).await;
                    self.callback.on_step(sim.id, &step).await;
                    info!(round, agent = agent_name, "turn completed");
                    state = state.advance(sim.rounds, turns);
                }
                Err(err) => {
                    warn!(round, agent = agent_name, error = %err, "turn failed, stopping run");
                    sim.status = SimulationStatus::Failed;
                    self.persist(&sim).await;
                    let notice =
                        Step::turn(round, agent.as_ref(), format!("Error: {err}"), Utc::now());
                    self.callback.on_step(sim.id, &notice).await;
                    return RunState::Failed;
                }
            }
        }

        let summary = match self.summarize(&sim, budget).await {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "summary generation failed");
                format!("Summary generation failed: {err}")
            }
        };

        sim.final_result = Some(summary.clone());
        sim.status = SimulationStatus::Completed;
        self.persist(&sim).await;
        self.callback
            .on_step(sim.id, &Step::completion(summary, Utc::now()))
            .await;
        info!(steps = sim.steps.len(), "run completed");
        RunState::Completed
    }

    async fn take_turn(
        &self,
        sim: &Simulation,
        agent: Option<&Agent>,
        round: i32,
        budget: u32,
    ) -> Result<String, TurnError> {
        let prompt = self.context.build_turn_prompt(sim, agent, round)?;
        let text = self
            .client
            .complete_streaming(&prompt.messages(), budget)
            .await?;
        Ok(text)
    }

    async fn summarize(&self, sim: &Simulation, budget: u32) -> Result<String, TurnError> {
        let prompt = self.context.build_summary_prompt(sim)?;
        let text = self
            .client
            .complete_blocking(&prompt.messages(), budget)
            .await?;
        Ok(text)
    }

    async fn persist(&self, sim: &Simulation) {
        if let Err(err) = self.store.update(sim).await {
            warn!(error = %err, status = ?sim.status, "failed to persist simulation");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::collections::VecDeque;

    use simarena_types::{AgentId, Language};
    use tokio::sync::Mutex as AsyncMutex;

    use super::*;

    /// Replies from a script, one entry per call; `Err` entries fail the call.
    struct ScriptedClient {
        replies: Mutex<VecDeque<Result<String, String>>>,
        calls: Mutex<Vec<Vec<crate::completion::ChatMessage>>>,
    }

    impl ScriptedClient {
        fn new(replies: Vec<Result<&str, &str>>) -> Self {
            Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .map(|r| r.map(str::to_owned).map_err(str::to_owned))
                        .collect(),
                ),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn next(&self, messages: &[crate::completion::ChatMessage]) -> Result<String, CompletionError> {
            self.calls.lock().unwrap().push(messages.to_vec());
            let reply = self.replies.lock().unwrap().pop_front();
            match reply {
                Some(Ok(text)) => Ok(text),
                Some(Err(msg)) => Err(CompletionError::Exhausted {
                    operation: "streaming chat completion",
                    attempts: 2,
                    last: Box::new(CompletionError::Transport(msg)),
                }),
                None => Err(CompletionError::EmptyChoices),
            }
        }
    }

    impl CompletionClient for Arc<ScriptedClient> {
        async fn complete_streaming(
            &self,
            messages: &[crate::completion::ChatMessage],
            _token_budget: u32,
        ) -> Result<String, CompletionError> {
            self.next(messages)
        }

        async fn complete_blocking(
            &self,
            messages: &[crate::completion::ChatMessage],
            _token_budget: u32,
        ) -> Result<String, CompletionError> {
            self.next(messages)
        }
    }

    #[derive(Default)]
    struct Recorder {
        steps: AsyncMutex<Vec<(SimulationId, Step)>>,
    }

    impl StepCallback for Arc<Recorder> {
        async fn on_step(&self, simulation_id: SimulationId, step: &Step) {
            self.steps.lock().await.push((simulation_id, step.clone()));
        }
    }

    fn agent(name: &str) -> Agent {
        Agent {
            id: AgentId::new(),
            name: name.to_owned(),
            role: String::new(),
        }
    }

    fn agent_with_role(name: &str, role: &str) -> Agent {
        Agent {
            role: role.to_owned(),
            ..agent(name)
        }
    }

    fn simulation(rounds: i32, agents: Vec<Agent>) -> Simulation {
        Simulation {
            id: SimulationId::new(),
            description: String::from("Two merchants"),
            preconditions: String::new(),
            rounds,
            show_only_result: false,
            agents,
            language: Language::En,
            depth: Depth::Shallow,
            status: SimulationStatus::Running,
            steps: Vec::new(),
            final_result: None,
            created_at: Utc::now(),
        }
    }

    struct Harness {
        _dir: tempfile::TempDir,
        store: Arc<SimulationStore>,
        client: Arc<ScriptedClient>,
        recorder: Arc<Recorder>,
        engine: Engine<Arc<ScriptedClient>, Arc<Recorder>>,
    }

    async fn harness(replies: Vec<Result<&str, &str>>) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SimulationStore::open(dir.path()).await.unwrap());
        let client = Arc::new(ScriptedClient::new(replies));
        let recorder = Arc::new(Recorder::default());
        let engine = Engine::new(Arc::clone(&client), Arc::clone(&store), Arc::clone(&recorder)).unwrap();
        Harness {
            _dir: dir,
            store,
            client,
            recorder,
            engine,
        }
    }

    #[test]
    fn depth_maps_to_token_budget() {
        assert_eq!(token_budget(Depth::Shallow), 400);
        assert_eq!(token_budget(Depth::Medium), 1200);
        assert_eq!(token_budget(Depth::Deep), 0);
    }

    #[test]
    fn state_machine_walks_rounds_then_summarizes() {
        let mut state = RunState::start(2);
        let mut visited = Vec::new();
        while let RunState::Running { round, turn_index } = state {
            visited.push((round, turn_index));
            state = state.advance(2, 2);
        }
        assert_eq!(visited, vec![(1, 0), (1, 1), (2, 0), (2, 1)]);
        assert_eq!(state, RunState::Summarizing);
        assert_eq!(RunState::Failed.advance(2, 2), RunState::Failed);
    }

    #[tokio::test]
    async fn successful_run_persists_every_turn_in_order() {
        let h = harness(vec![Ok("a1r1"), Ok("a2r1"), Ok("a1r2"), Ok("a2r2"), Ok("the end")]).await;
        let sim = simulation(2, vec![agent("Alice"), agent("Bob")]);
        h.store.create(&sim).await.unwrap();

        let state = h.engine.launch(sim.clone()).unwrap().await.unwrap();
        assert_eq!(state, RunState::Completed);

        let stored = h.store.get(sim.id).await.unwrap();
        assert_eq!(stored.status, SimulationStatus::Completed);
        assert_eq!(stored.final_result.as_deref(), Some("the end"));
        let order: Vec<(i32, Option<AgentId>)> = stored.steps.iter().map(|s| (s.round, s.agent_id)).collect();
        let (a1, a2) = (Some(sim.agents[0].id), Some(sim.agents[1].id));
        assert_eq!(order, vec![(1, a1), (1, a2), (2, a1), (2, a2)]);
        assert_eq!(stored.steps[2].content, "a1r2");

        let emitted = h.recorder.steps.lock().await;
        assert_eq!(emitted.len(), 5);
        assert!(emitted.iter().all(|(id, _)| *id == sim.id));
        let last = &emitted[4].1;
        assert!(last.is_completion());
        assert_eq!(last.content, "the end");
    }

    #[tokio::test]
    async fn failed_turn_stops_the_run() {
        let h = harness(vec![Ok("a1r1"), Ok("a2r1"), Err("connection refused")]).await;
        let sim = simulation(2, vec![agent("Alice"), agent("Bob")]);
        h.store.create(&sim).await.unwrap();

        let state = h.engine.launch(sim.clone()).unwrap().await.unwrap();
        assert_eq!(state, RunState::Failed);

        let stored = h.store.get(sim.id).await.unwrap();
        assert_eq!(stored.status, SimulationStatus::Failed);
        assert_eq!(stored.steps.len(), 2);
        assert!(stored.final_result.is_none());

        let emitted = h.recorder.steps.lock().await;
        assert_eq!(emitted.len(), 3);
        let notice = &emitted[2].1;
        assert!(notice.content.starts_with("Error: "));
        assert!(notice.content.contains("connection refused"));
        assert_eq!(notice.round, 2);
        assert_eq!(notice.agent_id, Some(sim.agents[0].id));
        assert_eq!(h.client.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn failed_summary_still_completes() {
        let h = harness(vec![Ok("only turn"), Err("timeout")]).await;
        let sim = simulation(1, vec![agent("Alice")]);
        h.store.create(&sim).await.unwrap();

        let state = h.engine.launch(sim.clone()).unwrap().await.unwrap();
        assert_eq!(state, RunState::Completed);

        let stored = h.store.get(sim.id).await.unwrap();
        assert_eq!(stored.status, SimulationStatus::Completed);
        let result = stored.final_result.unwrap();
        assert!(result.starts_with("Summary generation failed: "));
        assert_eq!(stored.steps.len(), 1);
    }

    #[tokio::test]
    async fn simulation_without_agents_takes_synthetic_turns() {
        let h = harness(vec![Ok("r1"), Ok("r2"), Ok("r3"), Ok("summary")]).await;
        let sim = simulation(3, Vec::new());
        h.store.create(&sim).await.unwrap();

        h.engine.launch(sim.clone()).unwrap().await.unwrap();

        let stored = h.store.get(sim.id).await.unwrap();
        assert_eq!(stored.steps.len(), 3);
        assert!(stored.steps.iter().all(|s| s.agent_id.is_none()));
        let rounds: Vec<i32> = stored.steps.iter().map(|s| s.round).collect();
        assert_eq!(rounds, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn later_turns_see_earlier_history() {
        let h = harness(vec![Ok("I open a stall"), Ok("I watch"), Ok("summary")]).await;
        let sim = simulation(2, vec![agent("Alice")]);
        h.store.create(&sim).await.unwrap();

        h.engine.launch(sim).unwrap().await.unwrap();

        let calls = h.client.calls.lock().unwrap();
        assert!(!calls[0][0].content.contains("I open a stall"));
        assert!(calls[1][0].content.contains("[Alice]: I open a stall"));
        assert!(calls[2][0].content.contains("I watch"));
    }

    #[tokio::test]
    async fn interactive_agents_see_each_other_within_a_round() {
        let h = harness(vec![
            Ok("I set out my loaves"),
            Ok("I offer two coins"),
            Ok("I accept"),
            Ok("I pay"),
            Ok("a deal was made"),
        ])
        .await;
        let sim = simulation(
            2,
            vec![agent_with_role("Alice", "baker"), agent_with_role("Bob", "customer")],
        );
        assert!(sim.is_interactive());
        h.store.create(&sim).await.unwrap();

        let state = h.engine.launch(sim.clone()).unwrap().await.unwrap();
        assert_eq!(state, RunState::Completed);

        let calls = h.client.calls.lock().unwrap();
        assert!(calls[1][0].content.contains("[Alice]: I set out my loaves"));
        assert!(calls[2][0].content.contains("[Bob]: I offer two coins"));
        assert!(calls[3][0].content.contains("[Alice]: I accept"));
        drop(calls);

        let stored = h.store.get(sim.id).await.unwrap();
        assert_eq!(stored.steps.len(), 4);
        let order: Vec<(i32, Option<AgentId>)> = stored.steps.iter().map(|s| (s.round, s.agent_id)).collect();
        let (a, b) = (Some(sim.agents[0].id), Some(sim.agents[1].id));
        assert_eq!(order, vec![(1, a), (1, b), (2, a), (2, b)]);
    }

    #[tokio::test]
    async fn independent_agents_see_only_their_own_turns() {
        let h = harness(vec![Ok("I bake"), Ok("I browse"), Ok("I sell"), Ok("I leave"), Ok("summary")]).await;
        let sim = simulation(2, vec![agent("Alice"), agent("Bob")]);
        assert!(!sim.is_interactive());
        h.store.create(&sim).await.unwrap();

        h.engine.launch(sim).unwrap().await.unwrap();

        let calls = h.client.calls.lock().unwrap();
        assert!(!calls[1][0].content.contains("I bake"));
        assert!(calls[2][0].content.contains("[Alice]: I bake"));
        assert!(!calls[2][0].content.contains("I browse"));
        assert!(calls[3][0].content.contains("[Bob]: I browse"));
    }

    #[tokio::test]
    async fn a_simulation_runs_at_most_once() {
        let h = harness(vec![Ok("turn"), Ok("summary")]).await;
        let sim = simulation(1, vec![agent("Alice")]);
        h.store.create(&sim).await.unwrap();

        let handle = h.engine.launch(sim.clone()).unwrap();
        let again = h.engine.start(sim.clone());
        assert!(matches!(again, Err(EngineError::AlreadyLaunched(id)) if id == sim.id));
        handle.await.unwrap();

        let after = h.engine.clone().launch(sim.clone());
        assert!(matches!(after, Err(EngineError::AlreadyLaunched(_))));
        assert_eq!(h.recorder.steps.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn terminal_simulation_is_not_launched() {
        let h = harness(Vec::new()).await;
        let mut sim = simulation(1, vec![agent("Alice")]);
        sim.status = SimulationStatus::Failed;

        let result = h.engine.launch(sim);
        assert!(matches!(result, Err(EngineError::NotRunning(_))));
        assert!(h.client.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleted_simulation_does_not_break_the_run() {
        let h = harness(vec![Ok("turn"), Ok("summary")]).await;
        let sim = simulation(1, vec![agent("Alice")]);

        let state = h.engine.launch(sim).unwrap().await.unwrap();
        assert_eq!(state, RunState::Completed);
        assert_eq!(h.recorder.steps.lock().await.len(), 2);
    }
}
