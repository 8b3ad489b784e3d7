//! Cancellation contexts and in-flight execution state.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::{Child, ChildStderr, ChildStdout};
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, trace};

use super::result::{CancelReason, ExitOutcome};

/// Signals that a running command should be terminated.
///
/// A context combines an optional deadline with a cancellation token.
/// Foreground commands get a token whose [`DropGuard`] is owned by the
/// response body, so the command is canceled when the caller goes away.
/// Background commands get a token nobody else holds, leaving only the
/// deadline.
#[derive(Debug, Clone)]
pub struct CancelContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CancelContext {
    /// Context bounded only by the timeout.
    ///
    /// A timeout too large to represent as an instant is no deadline.
    pub fn detached(timeout: Option<Duration>) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: timeout.and_then(|t| Instant::now().checked_add(t)),
        }
    }

    /// Context bounded by the timeout and by the lifetime of the returned
    /// guard. Dropping the guard cancels the context.
    pub fn connection_bound(timeout: Option<Duration>) -> (Self, DropGuard) {
        let ctx = Self::detached(timeout);
        let guard = ctx.token.clone().drop_guard();
        (ctx, guard)
    }

    /// Cancel the context explicitly.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Resolves once the context is done, reporting why.
    pub async fn done(&self) -> CancelReason {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.token.cancelled() => CancelReason::Canceled,
                _ = tokio::time::sleep_until(deadline) => CancelReason::TimedOut,
            },
            None => {
                self.token.cancelled().await;
                CancelReason::Canceled
            }
        }
    }
}

/// Runtime state of one started command.
///
/// Owns the child process handle exclusively; it is consumed by
/// [`ExecutionContext::wait`], which is the only way to observe the exit.
#[derive(Debug)]
pub struct ExecutionContext {
    child: Child,
    pid: u32,
    working_directory: Option<PathBuf>,
    cancel: CancelContext,
    started_at: Instant,
}

impl ExecutionContext {
    pub(crate) fn new(
        child: Child,
        pid: u32,
        working_directory: Option<PathBuf>,
        cancel: CancelContext,
    ) -> Self {
        Self {
            child,
            pid,
            working_directory,
            cancel,
            started_at: Instant::now(),
        }
    }

    /// OS process id of the child.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Directory the child was started in, if one was requested.
    ///
    /// `None` means the child inherited the server's current directory.
    pub fn working_directory(&self) -> Option<&Path> {
        self.working_directory.as_deref()
    }

    /// When the child was spawned.
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Take the child's output pipes, if they were captured.
    pub fn take_output(&mut self) -> (Option<ChildStdout>, Option<ChildStderr>) {
        (self.child.stdout.take(), self.child.stderr.take())
    }

    /// Wait for the child to exit or for the context to be done.
    ///
    /// When the context finishes first the child is killed and then reaped,
    /// so no zombie is left behind either way.
    pub async fn wait(mut self) -> ExitOutcome {
        let reason = tokio::select! {
            status = self.child.wait() => {
                return match status {
                    Ok(status) => ExitOutcome::Completed(status),
                    Err(e) => ExitOutcome::WaitFailed(e.to_string()),
                };
            }
            reason = self.cancel.done() => reason,
        };

        debug!(pid = self.pid, ?reason, "stopping command");
        if let Err(e) = self.child.start_kill() {
            // Already exited; the wait below still reaps it.
            trace!(pid = self.pid, error = %e, "kill failed");
        }

        match self.child.wait().await {
            Ok(status) => ExitOutcome::stopped(reason, status),
            Err(e) => ExitOutcome::WaitFailed(e.to_string()),
        }
    }
}
