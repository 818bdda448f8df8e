//! Submission, status polling, and termination handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use uuid::Uuid;

use langforge_core::run::RunStatus;

use crate::error::ApiError;
use crate::schema::generate::{
    GenerateRequest, GenerateResponse, StatusResponse, TerminateResponse, WorkflowQuery,
};
use crate::state::AppState;

/// `POST /generate`
///
/// Creates a run for the submitted description and starts its pipeline.
/// An absent or blank prompt is a missing-input error: the request is
/// rejected before any run exists, consuming no retry budget.
pub async fn submit(
    State(state): State<AppState>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let prompt = req.prompt.as_deref().map(str::trim).unwrap_or_default();
    if prompt.is_empty() {
        return Err(ApiError::MissingInput(
            "prompt must be present and non-empty".to_string(),
        ));
    }

    let run_id = Uuid::new_v4().to_string();
    {
        state.store.lock().await.create_run(&run_id, prompt)?;
    }
    state
        .runner
        .start(Arc::clone(&state.pipeline), run_id.clone());
    tracing::info!(run_id = %run_id, "run submitted");

    Ok(Json(GenerateResponse {
        workflow_id: run_id,
    }))
}

/// `GET /generate/status?workflowId=<id>`
pub async fn status(
    State(state): State<AppState>,
    Query(query): Query<WorkflowQuery>,
) -> Result<Json<StatusResponse>, ApiError> {
    let store = state.store.lock().await;
    let run = store.get_run(&query.workflow_id)?;

    let status = run.status();
    let output = if status == RunStatus::Complete {
        store
            .get_package(&query.workflow_id)?
            .map(|bytes| BASE64.encode(bytes))
    } else {
        None
    };
    let error = if status == RunStatus::Errored {
        run.diagnostic
    } else {
        None
    };

    Ok(Json(StatusResponse {
        status,
        output,
        error,
    }))
}

/// `POST /generate/terminate?workflowId=<id>`
///
/// Moves a non-terminal run to `terminated`; the pipeline task observes
/// the terminal row at its next phase boundary and stops. Terminating an
/// already-terminal run changes nothing and reports the current status.
pub async fn terminate(
    State(state): State<AppState>,
    Query(query): Query<WorkflowQuery>,
) -> Result<Json<TerminateResponse>, ApiError> {
    let mut store = state.store.lock().await;
    let transitioned = store.terminate_run(&query.workflow_id)?;
    let run = store.get_run(&query.workflow_id)?;
    if transitioned {
        tracing::info!(run_id = %query.workflow_id, "run terminated by request");
    }

    Ok(Json(TerminateResponse {
        workflow_id: query.workflow_id,
        status: run.status(),
    }))
}
