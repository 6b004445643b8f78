//! simarena server binary.
//!
//! Wires together configuration, the simulation store, the completion
//! client, the run engine and the HTTP API, then serves until `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `simarena.yaml` and apply environment overrides
//! 3. Open the JSON store in the data directory
//! 4. Build the completion client
//! 5. Create the broadcast hub and the engine that feeds it
//! 6. Serve the API

mod error;
mod hub_callback;

use std::path::Path;
use std::sync::Arc;

use simarena_core::config::{ArenaConfig, DEFAULT_CONFIG_FILE};
use simarena_core::engine::{Engine, RunLauncher};
use simarena_llm::OpenAiClient;
use simarena_observer::{AppState, BroadcastHub, ServerConfig};
use simarena_store::SimulationStore;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::AppError;
use crate::hub_callback::HubCallback;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if any initialization step fails or the server stops
/// with a fatal error.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("simarena starting");

    // 2. Load configuration.
    let config = load_config()?;
    info!(
        host = config.server.host,
        port = config.server.port,
        data_dir = config.storage.data_dir,
        llm_base_url = config.llm.base_url,
        llm_model = config.llm.model,
        "Configuration loaded"
    );
    if config.llm.api_key.is_empty() {
        warn!("LLM_API_KEY is empty, completion requests will likely be rejected");
    }

    // 3. Open the store.
    let store = Arc::new(
        SimulationStore::open(&config.storage.data_dir)
            .await
            .map_err(AppError::from)?,
    );
    info!(path = %store.path().display(), "Simulation store opened");

    // 4. Completion client.
    let client = OpenAiClient::new(&config.llm).map_err(|e| AppError::LlmClient {
        message: e.to_string(),
    })?;

    // 5. Hub and engine.
    let hub = Arc::new(BroadcastHub::new());
    let engine = Engine::new(client, Arc::clone(&store), HubCallback::new(Arc::clone(&hub)))
        .map_err(AppError::from)?;
    let launcher: Arc<dyn RunLauncher> = Arc::new(engine);

    // 6. Serve.
    let state = Arc::new(AppState::new(store, hub, launcher));
    let server_config = ServerConfig {
        host: config.server.host,
        port: config.server.port,
        cors_origin: config.server.cors_origin,
    };
    simarena_observer::start_server(&server_config, state)
        .await
        .map_err(AppError::from)?;

    info!("simarena stopped");
    Ok(())
}

/// Load `simarena.yaml` from the working directory, falling back to
/// defaults, then apply environment overrides.
fn load_config() -> Result<ArenaConfig, AppError> {
    let mut config = ArenaConfig::load(Path::new(DEFAULT_CONFIG_FILE))?;
    config.apply_env(|key| std::env::var(key).ok())?;
    Ok(config)
}
