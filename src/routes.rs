use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::StatusCode;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::trace::TraceLayer;

use crate::auth::auth_middleware;
use crate::bail_runner;
use crate::error::{RunnerError, RunnerResult};
use crate::job::dispatcher::DispatcherHealth;
use crate::job::{JobHandle, JobStatus, RunRequest, RunResponse, StatusResponse, TranscriptionRequest};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let endpoint_router = Router::new()
        .route("/v2/:endpoint_id/run", post(handle_run_request))
        .route("/v2/:endpoint_id/runsync", post(handle_runsync_request))
        .route("/v2/:endpoint_id/status/:job_id", get(handle_status_request))
        .route("/v2/:endpoint_id/health", get(handle_endpoint_health_request))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    let mut router = Router::new()
        .route("/health", get(handle_health_request))
        .merge(endpoint_router);

    if state.config.local_debug {
        tracing::info!("Local debug routes enabled on /run, /runsync and /status");
        let local_router = Router::new()
            .route("/run", post(handle_local_run_request))
            .route("/runsync", post(handle_local_runsync_request))
            .route("/status/:job_id", get(handle_local_status_request))
            .route_layer(from_fn_with_state(state.clone(), auth_middleware));
        router = router.merge(local_router);
    }

    let max_request_bytes = state.config.max_request_bytes;
    router
        .layer(DefaultBodyLimit::max(max_request_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn check_endpoint(state: &AppState, endpoint_id: &str) -> RunnerResult<()> {
    if state.config.endpoint_id != endpoint_id {
        bail_runner!(StatusCode::NOT_FOUND, "Endpoint {} not found", endpoint_id);
    }
    Ok(())
}

fn validate(body: Result<Json<RunRequest>, JsonRejection>) -> RunnerResult<TranscriptionRequest> {
    let Json(request) = body.map_err(|e| {
        // well-formed JSON of the wrong shape is still a bad request
        let status = match &e {
            JsonRejection::JsonDataError(_) => StatusCode::BAD_REQUEST,
            _ => e.status(),
        };
        RunnerError::new(status, e.body_text())
    })?;
    TranscriptionRequest::try_from(request.input)
        .map_err(|e| RunnerError::new(StatusCode::BAD_REQUEST, e.to_string()))
}

fn submit(state: &AppState, body: Result<Json<RunRequest>, JsonRejection>) -> RunnerResult<Json<RunResponse>> {
    let request = validate(body)?;
    let id = state.dispatcher.submit(request);
    Ok(Json(RunResponse {
        id,
        status: JobStatus::InQueue,
    }))
}

async fn submit_and_wait(
    state: &AppState,
    body: Result<Json<RunRequest>, JsonRejection>,
) -> RunnerResult<Json<StatusResponse>> {
    let request = validate(body)?;
    let id = state.dispatcher.submit(request);
    match state.dispatcher.wait(&id, state.config.runsync_wait()).await {
        Some(status) => Ok(Json(status)),
        None => bail_runner!(StatusCode::NOT_FOUND, "Job {} not found", id),
    }
}

fn lookup(state: &AppState, job_id: String) -> RunnerResult<Json<StatusResponse>> {
    let id = JobHandle::from(job_id);
    match state.dispatcher.status(&id) {
        Some(status) => Ok(Json(status)),
        None => bail_runner!(StatusCode::NOT_FOUND, "Job {} not found", id),
    }
}

#[axum_macros::debug_handler]
async fn handle_run_request(
    State(state): State<AppState>,
    Path(endpoint_id): Path<String>,
    body: Result<Json<RunRequest>, JsonRejection>,
) -> RunnerResult<Json<RunResponse>> {
    check_endpoint(&state, &endpoint_id)?;
    submit(&state, body)
}

#[axum_macros::debug_handler]
async fn handle_runsync_request(
    State(state): State<AppState>,
    Path(endpoint_id): Path<String>,
    body: Result<Json<RunRequest>, JsonRejection>,
) -> RunnerResult<Json<StatusResponse>> {
    check_endpoint(&state, &endpoint_id)?;
    submit_and_wait(&state, body).await
}

#[axum_macros::debug_handler]
async fn handle_status_request(
    State(state): State<AppState>,
    Path((endpoint_id, job_id)): Path<(String, String)>,
) -> RunnerResult<Json<StatusResponse>> {
    check_endpoint(&state, &endpoint_id)?;
    lookup(&state, job_id)
}

#[axum_macros::debug_handler]
async fn handle_endpoint_health_request(
    State(state): State<AppState>,
    Path(endpoint_id): Path<String>,
) -> RunnerResult<Json<DispatcherHealth>> {
    check_endpoint(&state, &endpoint_id)?;
    Ok(Json(state.dispatcher.health()))
}

#[axum_macros::debug_handler]
async fn handle_health_request(State(state): State<AppState>) -> Json<DispatcherHealth> {
    Json(state.dispatcher.health())
}

#[axum_macros::debug_handler]
async fn handle_local_run_request(
    State(state): State<AppState>,
    body: Result<Json<RunRequest>, JsonRejection>,
) -> RunnerResult<Json<RunResponse>> {
    submit(&state, body)
}

#[axum_macros::debug_handler]
async fn handle_local_runsync_request(
    State(state): State<AppState>,
    body: Result<Json<RunRequest>, JsonRejection>,
) -> RunnerResult<Json<StatusResponse>> {
    submit_and_wait(&state, body).await
}

#[axum_macros::debug_handler]
async fn handle_local_status_request(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> RunnerResult<Json<StatusResponse>> {
    lookup(&state, job_id)
}
