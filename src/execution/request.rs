//! Validated command requests.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::BridgeError;
use crate::Result;

/// How a command runs relative to the request that started it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Output is streamed back and the response ends when the process exits.
    /// Closing the connection cancels the command.
    #[default]
    Foreground,
    /// The response returns as soon as the process starts. The process
    /// outlives the connection and its exit is reaped in the background.
    Background,
}

impl ExecutionMode {
    /// Select a mode from the wire-level `background` flag.
    pub fn from_background_flag(background: bool) -> Self {
        if background {
            Self::Background
        } else {
            Self::Foreground
        }
    }

    pub fn is_background(self) -> bool {
        matches!(self, Self::Background)
    }
}

/// A command to be executed as a child process.
///
/// The executable name is fixed at construction and validated to be
/// non-empty; everything else can be adjusted with the builder methods.
#[derive(Debug, Clone)]
pub struct CommandRequest {
    command: String,
    /// Arguments passed verbatim, without shell interpretation.
    pub arguments: Vec<String>,
    /// Working directory override (if any).
    pub working_dir: Option<PathBuf>,
    /// Timeout in seconds; `0` means no timeout.
    pub timeout_secs: u64,
    /// Foreground or background execution.
    pub mode: ExecutionMode,
}

impl CommandRequest {
    /// Create a request for the given executable.
    ///
    /// Surrounding whitespace is trimmed; an empty name is rejected with
    /// [`BridgeError::MissingCommand`].
    pub fn new(command: impl AsRef<str>) -> Result<Self> {
        let command = command.as_ref().trim();
        if command.is_empty() {
            return Err(BridgeError::MissingCommand);
        }

        Ok(Self {
            command: command.to_string(),
            arguments: Vec::new(),
            working_dir: None,
            timeout_secs: 0,
            mode: ExecutionMode::Foreground,
        })
    }

    /// The executable to run.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.arguments.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.arguments.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set the timeout in whole seconds.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Set the execution mode.
    pub fn mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// The timeout as a duration, or `None` when unbounded.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trims_command() {
        let req = CommandRequest::new("  echo \t").unwrap();
        assert_eq!(req.command(), "echo");
        assert!(req.arguments.is_empty());
        assert!(req.working_dir.is_none());
        assert_eq!(req.mode, ExecutionMode::Foreground);
    }

    #[test]
    fn test_new_rejects_blank_command() {
        assert!(matches!(
            CommandRequest::new(""),
            Err(BridgeError::MissingCommand)
        ));
        assert!(matches!(
            CommandRequest::new(" \n\t "),
            Err(BridgeError::MissingCommand)
        ));
    }

    #[test]
    fn test_builder_chain() {
        let req = CommandRequest::new("git")
            .unwrap()
            .arg("status")
            .args(["--short", "--branch"])
            .working_dir("/project")
            .timeout_secs(30)
            .mode(ExecutionMode::Background);

        assert_eq!(req.arguments, vec!["status", "--short", "--branch"]);
        assert_eq!(req.working_dir, Some(PathBuf::from("/project")));
        assert_eq!(req.timeout(), Some(Duration::from_secs(30)));
        assert!(req.mode.is_background());
    }

    #[test]
    fn test_arguments_are_verbatim() {
        let req = CommandRequest::new("echo")
            .unwrap()
            .args(["  spaced  ", "$HOME", "a;b"]);
        assert_eq!(req.arguments, vec!["  spaced  ", "$HOME", "a;b"]);
    }

    #[test]
    fn test_zero_timeout_is_unbounded() {
        let req = CommandRequest::new("sleep").unwrap().timeout_secs(0);
        assert!(req.timeout().is_none());
    }

    #[test]
    fn test_mode_from_flag() {
        assert_eq!(
            ExecutionMode::from_background_flag(true),
            ExecutionMode::Background
        );
        assert_eq!(
            ExecutionMode::from_background_flag(false),
            ExecutionMode::Foreground
        );
    }
}
