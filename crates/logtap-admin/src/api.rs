//! Admin REST API endpoints for input health.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/api/v1/health` | 200 if every input is running, 503 otherwise |
//! | `GET` | `/api/v1/inputs` | Status and metrics of every input |
//! | `GET` | `/api/v1/inputs/{name}` | Status and metrics of one input |

use std::net::SocketAddr;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use logtap_runner::{RunnerState, StatusBoard};

/// Application state shared across all handlers.
pub type AppState = StatusBoard;

/// Creates the status REST API router.
///
/// # Arguments
///
/// * `board` - Status board of the supervised inputs.
pub fn status_router(board: AppState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/inputs", get(list_inputs))
        .route("/api/v1/inputs/{name}", get(get_input))
        .with_state(board)
}

/// Serves [`status_router`] on `addr` until `cancel` fires.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn serve(
    addr: SocketAddr,
    board: AppState,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "admin API listening");
    axum::serve(listener, status_router(board))
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
}

/// A degraded input in a health response.
#[derive(Debug, Serialize)]
struct DegradedInput {
    name: String,
    message: String,
}

/// Response for the health endpoint.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: RunnerState,
    inputs: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    degraded: Vec<DegradedInput>,
}

/// Error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, msg: impl Into<String>) -> impl IntoResponse {
    (status, Json(ErrorResponse { error: msg.into() }))
}

/// `GET /api/v1/health`
async fn health(State(board): State<AppState>) -> impl IntoResponse {
    let views = board.views();
    let inputs = views.len();
    let degraded: Vec<DegradedInput> = views
        .into_iter()
        .filter(|view| view.status.state == RunnerState::Degraded)
        .map(|view| DegradedInput {
            name: view.name,
            message: view.status.message,
        })
        .collect();

    let (code, status) = if degraded.is_empty() {
        (StatusCode::OK, RunnerState::Running)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, RunnerState::Degraded)
    };
    (
        code,
        Json(HealthResponse {
            status,
            inputs,
            degraded,
        }),
    )
}

/// `GET /api/v1/inputs`
async fn list_inputs(State(board): State<AppState>) -> impl IntoResponse {
    Json(board.views())
}

/// `GET /api/v1/inputs/{name}`
async fn get_input(State(board): State<AppState>, Path(name): Path<String>) -> impl IntoResponse {
    match board.view(&name) {
        Some(view) => Json(view).into_response(),
        None => error_response(StatusCode::NOT_FOUND, format!("input {name} not found"))
            .into_response(),
    }
}
