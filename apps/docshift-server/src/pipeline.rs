//! The one conversion path shared by every endpoint
//!
//! ```text
//! Received → Materializing → Invoking ─┬─ Succeeded → Streaming ──┬─→ Cleaned
//!                                      └─ Failed → ErrorResponse ─┘
//! ```
//!
//! The workspace is closed on both branches before the response leaves the
//! handler; if the request is dropped mid-way the guard's `Drop` removes it.

use std::fmt;
use std::time::Instant;

use axum::{
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use docshift_core::TransformationJob;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ServerError;
use crate::source::Materialize;
use crate::state::AppState;
use crate::workspace::RequestWorkspace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Received,
    Materializing,
    Invoking,
    Succeeded,
    Streaming,
    Failed,
    ErrorResponse,
    Cleaned,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

fn enter(request_id: Uuid, phase: Phase) {
    debug!(%request_id, %phase, "Request phase");
}

/// Materialize, invoke, send back, clean up
pub async fn convert<M: Materialize>(state: &AppState, source: M) -> Result<Response, ServerError> {
    let request_id = Uuid::new_v4();
    enter(request_id, Phase::Received);

    let workspace =
        RequestWorkspace::create(&state.workspace_root).map_err(ServerError::Workspace)?;

    let outcome = run_in_workspace(state, &source, &workspace, request_id).await;
    if outcome.is_err() {
        enter(request_id, Phase::ErrorResponse);
    }

    workspace.close();
    enter(request_id, Phase::Cleaned);
    outcome
}

async fn run_in_workspace<M: Materialize>(
    state: &AppState,
    source: &M,
    workspace: &RequestWorkspace,
    request_id: Uuid,
) -> Result<Response, ServerError> {
    enter(request_id, Phase::Materializing);
    let input = source.materialize(workspace).await?;
    let output = workspace.output_path();

    let mut job = TransformationJob::new(source.source(), input, output);
    job.start();
    enter(request_id, Phase::Invoking);

    let started = Instant::now();
    let outcome = state
        .renderer
        .invoke(&job.input_path, &job.output_path)
        .await;
    job.finish(&outcome, started.elapsed());

    if let Err(e) = outcome {
        enter(request_id, Phase::Failed);
        warn!(%request_id, source = %job.source, kind = ?e.kind(), exit_code = ?job.exit_code, "Conversion failed");
        return Err(e.into());
    }
    enter(request_id, Phase::Succeeded);

    // Read before the workspace goes away
    let body = tokio::fs::read(&job.output_path).await?;
    enter(request_id, Phase::Streaming);
    info!(
        %request_id,
        source = %job.source,
        bytes = body.len(),
        duration_ms = job.duration.as_millis() as u64,
        "Conversion succeeded"
    );

    Ok(document_response(body, &state.naming.output_name(&source.stem())))
}

fn document_response(body: Vec<u8>, file_name: &str) -> Response {
    let disposition = HeaderValue::from_str(&format!("inline; filename=\"{}\"", file_name))
        .unwrap_or_else(|_| HeaderValue::from_static("inline"));
    (
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/html; charset=utf-8"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response()
}
