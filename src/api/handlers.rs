//! HTTP handlers.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use super::types::{BackgroundResponse, RunRequest};
use crate::error::BridgeError;
use crate::execution::{execute, Execution};
use crate::shutdown::ShutdownCoordinator;

/// Shared application state.
#[derive(Clone, Default)]
pub struct AppState {
    pub shutdown: ShutdownCoordinator,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shutdown(shutdown: ShutdownCoordinator) -> Self {
        Self { shutdown }
    }
}

/// `POST /api/run`: decode, launch, then stream or detach.
///
/// Everything that can fail before the process starts becomes an error
/// status. Once a foreground body is streaming, failures are reported in
/// the body instead.
pub async fn run_command(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, BridgeError> {
    if state.shutdown.is_shutting_down() {
        return Err(BridgeError::ServiceUnavailable);
    }

    let request = RunRequest::decode(&body)?;

    match execute(&request)? {
        Execution::Streaming(run) => Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            run.body.into_body(),
        )
            .into_response()),
        Execution::Background(started) => Ok((
            StatusCode::ACCEPTED,
            Json(BackgroundResponse::from_started(&started)),
        )
            .into_response()),
    }
}

/// Any verb other than POST on `/api/run`.
pub async fn method_not_allowed() -> BridgeError {
    BridgeError::MethodNotAllowed
}
