//! Error types for shell-bridge.

use std::time::Duration;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Main error type for shell-bridge operations.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Request body could not be decoded.
    #[error("invalid json: {0}")]
    InvalidRequest(String),

    /// Command was empty after trimming.
    #[error("cmd is required")]
    MissingCommand,

    /// Request used a verb other than POST.
    #[error("method not allowed")]
    MethodNotAllowed,

    /// The child process could not be started.
    #[error("start failed: {0}")]
    LaunchFailed(#[source] std::io::Error),

    /// The child process started but exited with a failure.
    #[error("exit error: {0}")]
    RuntimeExit(String),

    /// A detached process failed after its response was sent.
    #[error("background pid {pid} exited: {detail}")]
    BackgroundReap { pid: u32, detail: String },

    /// Grace period elapsed with requests still in flight.
    #[error("shutdown grace period of {0:?} elapsed with requests in flight")]
    ShutdownTimeout(Duration),

    /// Service is shutting down and no longer starts commands.
    #[error("service unavailable: shutting down")]
    ServiceUnavailable,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// HTTP status reported for this error when it reaches a caller.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::MissingCommand | Self::LaunchFailed(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::RuntimeExit(_)
            | Self::BackgroundReap { .. }
            | Self::ShutdownTimeout(_)
            | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            format!("{}\n", self),
        )
            .into_response()
    }
}

/// Convenience Result type for shell-bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_command_display() {
        let err = BridgeError::MissingCommand;
        assert_eq!(err.to_string(), "cmd is required");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_launch_failed_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = BridgeError::LaunchFailed(io_err);
        assert!(err.to_string().starts_with("start failed:"));
        assert!(err.to_string().contains("no such file"));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_runtime_exit_display() {
        let err = BridgeError::RuntimeExit("exit status: 3".into());
        assert_eq!(err.to_string(), "exit error: exit status: 3");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use");
        let err: BridgeError = io_err.into();
        assert!(matches!(err, BridgeError::Io(_)));
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            BridgeError::MethodNotAllowed.status_code(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            BridgeError::ServiceUnavailable.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            BridgeError::InvalidRequest("eof".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_into_response_is_plain_text() {
        let response = BridgeError::MissingCommand.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
    }
}
