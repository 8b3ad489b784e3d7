//! API request and response types.

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::execution::{BackgroundStarted, CommandRequest, ExecutionMode};
use crate::Result;

/// Body of `POST /api/run`.
///
/// Every field is optional on the wire; a missing or blank `cmd` is
/// rejected by [`RunRequest::decode`] rather than by the parser.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunRequest {
    /// Executable to run.
    #[serde(default)]
    pub cmd: Option<String>,
    /// Arguments, passed verbatim.
    #[serde(default)]
    pub args: Option<Vec<String>>,
    /// Working directory.
    #[serde(default)]
    pub workdir: Option<String>,
    /// Timeout in seconds; `0` means none.
    ///
    /// Negative values fail to decode and are answered with `400`.
    /// Values too large to schedule run without a deadline.
    #[serde(default)]
    pub timeout_sec: Option<u64>,
    /// Run detached instead of streaming.
    #[serde(default)]
    pub background: Option<bool>,
}

impl RunRequest {
    /// Decode and validate a raw request body.
    pub fn decode(body: &[u8]) -> Result<CommandRequest> {
        let req: RunRequest = serde_json::from_slice(body)
            .map_err(|e| BridgeError::InvalidRequest(e.to_string()))?;
        req.into_command()
    }

    /// Validate the wire request into a [`CommandRequest`].
    pub fn into_command(self) -> Result<CommandRequest> {
        let mut command = CommandRequest::new(self.cmd.unwrap_or_default())?
            .args(self.args.unwrap_or_default())
            .timeout_secs(self.timeout_sec.unwrap_or(0))
            .mode(ExecutionMode::from_background_flag(
                self.background.unwrap_or(false),
            ));

        if let Some(dir) = self.workdir.filter(|d| !d.is_empty()) {
            command = command.working_dir(dir);
        }
        Ok(command)
    }
}

/// `202 Accepted` body for a background command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackgroundResponse {
    /// OS process id of the child.
    pub pid: u32,
    /// Always `true`; the process was started.
    pub started: bool,
    /// Requested timeout in seconds (`0` when unbounded).
    pub timeout_sec: u64,
    /// Always `true`.
    pub background: bool,
    /// Requested working directory, resolved; empty when none was given.
    pub working_directory: String,
}

impl BackgroundResponse {
    pub fn from_started(started: &BackgroundStarted) -> Self {
        Self {
            pid: started.pid,
            started: true,
            timeout_sec: started.timeout_secs,
            background: true,
            working_directory: started
                .working_directory
                .as_ref()
                .map(|dir| dir.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }
}
