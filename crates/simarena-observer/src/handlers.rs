//! REST API endpoint handlers.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/health` | Liveness probe |
//! | `POST` | `/api/simulations` | Create a simulation and start its run |
//! | `GET` | `/api/simulations` | List all simulations |
//! | `GET` | `/api/simulations/{id}` | Get one simulation |
//! | `DELETE` | `/api/simulations/{id}` | Delete a simulation |

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use simarena_types::{CreateSimulationRequest, Simulation, SimulationId, SimulationStatus};
use tracing::{info, warn};

use crate::error::ObserverError;
use crate::state::AppState;

/// Liveness probe.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Validate the request, persist the new simulation, and start its run.
///
/// Responds immediately with the simulation in `running` status; steps are
/// produced in the background. If the run is refused, the stored record is
/// marked `failed` and the request ends with 500.
pub async fn create_simulation(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateSimulationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Simulation>), ObserverError> {
    let Json(request) = payload.map_err(|e| ObserverError::BadRequest(e.body_text()))?;
    let sim = request.into_simulation(Utc::now())?;

    state.store.create(&sim).await?;
    info!(
        simulation_id = %sim.id,
        rounds = sim.rounds,
        agents = sim.agents.len(),
        "Simulation created"
    );

    if let Err(e) = state.launcher.start(sim.clone()) {
        warn!(simulation_id = %sim.id, error = %e, "Simulation run was not started");
        let mut failed = sim;
        failed.status = SimulationStatus::Failed;
        state.store.update(&failed).await?;
        return Err(ObserverError::Internal(format!("simulation run could not be started: {e}")));
    }

    Ok((StatusCode::CREATED, Json(sim)))
}

/// List every simulation in storage order.
pub async fn list_simulations(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Simulation>>, ObserverError> {
    Ok(Json(state.store.list().await?))
}

/// Fetch one simulation with its steps so far.
pub async fn get_simulation(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
) -> Result<Json<Simulation>, ObserverError> {
    let id = parse_simulation_id(&id_str)?;
    Ok(Json(state.store.get(id).await?))
}

/// Delete a simulation. A run still in progress keeps going but its
/// writes no longer find the record.
pub async fn delete_simulation(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
) -> Result<StatusCode, ObserverError> {
    let id = parse_simulation_id(&id_str)?;
    state.store.delete(id).await?;
    info!(simulation_id = %id, "Simulation deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Parse a simulation id from a path segment.
pub(crate) fn parse_simulation_id(s: &str) -> Result<SimulationId, ObserverError> {
    s.parse::<SimulationId>()
        .map_err(|e| ObserverError::InvalidUuid(format!("{s}: {e}")))
}
