//! Execution mode controller.
//!
//! Foreground commands stream their output and hold the response open
//! until they exit; background commands answer immediately and are reaped
//! by a detached task.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::context::{CancelContext, ExecutionContext};
use super::launcher::launch;
use super::relay::{self, OutputRelay, RelayStream};
use super::request::{CommandRequest, ExecutionMode};
use super::result::ExitOutcome;
use crate::error::BridgeError;
use crate::Result;

/// How long the pumps may keep draining after a command was stopped.
///
/// A killed process can leave descendants holding its pipes open.
const STOPPED_DRAIN_GRACE: Duration = Duration::from_secs(1);

/// A started foreground command.
#[derive(Debug)]
pub struct StreamingRun {
    /// OS process id of the child.
    pub pid: u32,
    /// Response body. Dropping it cancels the command.
    pub body: RelayStream,
    /// Resolves once the child has exited and the relay is finished.
    pub completion: JoinHandle<ExitOutcome>,
}

/// A started background command.
#[derive(Debug)]
pub struct BackgroundStarted {
    /// OS process id of the child.
    pub pid: u32,
    /// Requested timeout in seconds (`0` when unbounded).
    pub timeout_secs: u64,
    /// Requested working directory, resolved. `None` when the child
    /// inherited the server's current directory.
    pub working_directory: Option<PathBuf>,
    /// Reaper task; may be dropped to detach.
    pub reaper: JoinHandle<ExitOutcome>,
}

/// Result of starting a command, one variant per mode.
#[derive(Debug)]
pub enum Execution {
    Streaming(StreamingRun),
    Background(BackgroundStarted),
}

/// Start `request` in the mode it asks for.
pub fn execute(request: &CommandRequest) -> Result<Execution> {
    match request.mode {
        ExecutionMode::Foreground => run_foreground(request).map(Execution::Streaming),
        ExecutionMode::Background => run_background(request).map(Execution::Background),
    }
}

/// Start a foreground command.
///
/// The cancellation context is tied to the returned body and to the
/// optional timeout. Output from stdout and stderr shares one relay, so the
/// two streams interleave in arrival order.
pub fn run_foreground(request: &CommandRequest) -> Result<StreamingRun> {
    let (cancel, guard) = CancelContext::connection_bound(request.timeout());
    let mut exec = launch(request, cancel)?;
    let pid = exec.pid();

    let (relay, body) = relay::channel(guard);
    let (stdout, stderr) = exec.take_output();
    let pumps: Vec<JoinHandle<()>> = stdout
        .map(|out| relay.pump(out))
        .into_iter()
        .chain(stderr.map(|err| relay.pump(err)))
        .collect();

    info!(
        pid,
        command = request.command(),
        args = ?request.arguments,
        timeout_secs = request.timeout_secs,
        "command started"
    );

    let completion = tokio::spawn(drive_foreground(exec, relay, pumps));
    Ok(StreamingRun {
        pid,
        body,
        completion,
    })
}

async fn drive_foreground(
    exec: ExecutionContext,
    relay: OutputRelay,
    pumps: Vec<JoinHandle<()>>,
) -> ExitOutcome {
    let pid = exec.pid();
    let started_at = exec.started_at();
    let outcome = exec.wait().await;

    drain(pumps, outcome.was_stopped()).await;

    if let Some(err) = outcome.exit_error() {
        // Status is already sent; the failure goes into the body.
        relay.write(format!("\n[{err}]\n")).await;
    }

    if outcome.is_canceled() && relay.is_closed() {
        info!(pid, elapsed = ?started_at.elapsed(), "command canceled: caller disconnected");
    } else {
        info!(pid, outcome = %outcome, elapsed = ?started_at.elapsed(), "command finished");
    }
    outcome
}

/// Wait for the pumps to reach EOF so every byte precedes the trailer.
async fn drain(pumps: Vec<JoinHandle<()>>, stopped: bool) {
    for mut pump in pumps {
        if stopped {
            if tokio::time::timeout(STOPPED_DRAIN_GRACE, &mut pump)
                .await
                .is_err()
            {
                debug!("abandoning output pump after stop");
                pump.abort();
            }
        } else {
            let _ = pump.await;
        }
    }
}

/// Start a background command.
///
/// Only the timeout can stop it; output is discarded and failures are
/// logged by the reaper, never reported to the caller.
pub fn run_background(request: &CommandRequest) -> Result<BackgroundStarted> {
    let cancel = CancelContext::detached(request.timeout());
    let exec = launch(request, cancel)?;
    let pid = exec.pid();
    let working_directory = exec.working_directory().map(Path::to_path_buf);

    info!(
        pid,
        command = request.command(),
        args = ?request.arguments,
        timeout_secs = request.timeout_secs,
        "background command started"
    );

    let reaper = tokio::spawn(reap_background(exec));
    Ok(BackgroundStarted {
        pid,
        timeout_secs: request.timeout_secs,
        working_directory,
        reaper,
    })
}

async fn reap_background(exec: ExecutionContext) -> ExitOutcome {
    let pid = exec.pid();
    let started_at = exec.started_at();
    let outcome = exec.wait().await;
    let elapsed = started_at.elapsed();

    match outcome.exit_error() {
        Some(err) if !outcome.is_canceled() => {
            let detail = match err {
                BridgeError::RuntimeExit(detail) => detail,
                other => other.to_string(),
            };
            warn!(
                timed_out = outcome.is_timeout(),
                ?elapsed,
                "{}",
                BridgeError::BackgroundReap { pid, detail }
            );
        }
        _ => debug!(pid, outcome = %outcome, ?elapsed, "background command finished"),
    }
    outcome
}
