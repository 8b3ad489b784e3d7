//! Execution outcome types.

use std::fmt;
use std::process::ExitStatus;

use crate::error::BridgeError;

/// Why a running command was stopped before it exited on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The request's timeout elapsed.
    TimedOut,
    /// The context was canceled (for foreground commands, the caller went away).
    Canceled,
}

/// Terminal state of one execution.
#[derive(Debug)]
pub enum ExitOutcome {
    /// The process exited on its own.
    Completed(ExitStatus),
    /// The process was killed because its timeout elapsed.
    TimedOut(ExitStatus),
    /// The process was killed because its context was canceled.
    Canceled(ExitStatus),
    /// Waiting on the process failed.
    WaitFailed(String),
}

impl ExitOutcome {
    /// Build the outcome of a process that was stopped for `reason`.
    pub fn stopped(reason: CancelReason, status: ExitStatus) -> Self {
        match reason {
            CancelReason::TimedOut => Self::TimedOut(status),
            CancelReason::Canceled => Self::Canceled(status),
        }
    }

    /// Exit status, if the process was reaped.
    pub fn status(&self) -> Option<ExitStatus> {
        match self {
            Self::Completed(s) | Self::TimedOut(s) | Self::Canceled(s) => Some(*s),
            Self::WaitFailed(_) => None,
        }
    }

    /// Exit code, if the process exited normally.
    pub fn exit_code(&self) -> Option<i32> {
        self.status().and_then(|s| s.code())
    }

    /// Check if the process exited with status zero.
    pub fn success(&self) -> bool {
        self.status().is_some_and(|s| s.success())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut(_))
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled(_))
    }

    /// Whether the process was stopped by its context rather than exiting.
    pub fn was_stopped(&self) -> bool {
        self.is_timeout() || self.is_canceled()
    }

    /// The failure to report for this outcome, if any.
    ///
    /// A stopped process reports its exit status like any other failing
    /// exit; the detail never says whether a timeout or the caller caused it.
    pub fn exit_error(&self) -> Option<BridgeError> {
        match self {
            Self::WaitFailed(detail) => Some(BridgeError::RuntimeExit(detail.clone())),
            _ => self
                .status()
                .filter(|s| !s.success())
                .map(|s| BridgeError::RuntimeExit(s.to_string())),
        }
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed(s) => write!(f, "completed ({s})"),
            Self::TimedOut(s) => write!(f, "timed out ({s})"),
            Self::Canceled(s) => write!(f, "canceled ({s})"),
            Self::WaitFailed(e) => write!(f, "wait failed: {e}"),
        }
    }
}
