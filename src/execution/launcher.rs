//! Child process launching.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tracing::{debug, warn};

use super::context::{CancelContext, ExecutionContext};
use super::request::{CommandRequest, ExecutionMode};
use crate::error::BridgeError;
use crate::Result;

/// Start the child process described by `request`.
///
/// Foreground commands get piped stdout and stderr for the relay;
/// background commands have both discarded. Stdin is always closed.
/// This never blocks past process creation and never retries.
pub fn launch(request: &CommandRequest, cancel: CancelContext) -> Result<ExecutionContext> {
    let mut cmd = tokio::process::Command::new(request.command());
    cmd.args(&request.arguments).stdin(Stdio::null());

    let working_directory = request.working_dir.as_deref().map(resolve_working_dir);
    if let Some(dir) = &working_directory {
        cmd.current_dir(dir);
    }

    match request.mode {
        ExecutionMode::Foreground => {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        }
        ExecutionMode::Background => {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }
    }

    let child = cmd.spawn().map_err(|e| {
        warn!(command = request.command(), error = %e, "start failed");
        BridgeError::LaunchFailed(e)
    })?;

    // Only `None` once the child has been reaped, which cannot have happened yet.
    let pid = child.id().unwrap_or_default();
    debug!(
        pid,
        command = request.command(),
        dir = ?working_directory,
        "process spawned"
    );

    Ok(ExecutionContext::new(child, pid, working_directory, cancel))
}

/// Resolve `dir` to an absolute path.
///
/// Best effort: if the current directory cannot be determined the path is
/// returned unchanged.
pub fn resolve_working_dir(dir: &Path) -> PathBuf {
    if dir.is_absolute() {
        return normalize(dir);
    }
    match std::env::current_dir() {
        Ok(cwd) => normalize(&cwd.join(dir)),
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "cannot resolve working dir");
            dir.to_path_buf()
        }
    }
}

/// Lexically drop `.` components and fold `..` into its parent.
fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_dir() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(resolve_working_dir(Path::new("sub")), cwd.join("sub"));
        assert_eq!(resolve_working_dir(Path::new("./sub/./x")), cwd.join("sub/x"));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_absolute_dir() {
        assert_eq!(
            resolve_working_dir(Path::new("/tmp/a/../b/.")),
            PathBuf::from("/tmp/b")
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_launch_reports_pid_and_dir() {
        let dir = tempfile::tempdir().unwrap();
        let request = CommandRequest::new("true")
            .unwrap()
            .working_dir(dir.path());

        let exec = launch(&request, CancelContext::detached(None)).unwrap();
        assert!(exec.pid() > 0);
        assert_eq!(exec.working_directory(), Some(dir.path()));

        let outcome = exec.wait().await;
        assert!(outcome.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_launch_without_dir_inherits() {
        let request = CommandRequest::new("true").unwrap();

        let exec = launch(&request, CancelContext::detached(None)).unwrap();
        assert!(exec.working_directory().is_none());
        assert!(exec.wait().await.success());
    }

    #[tokio::test]
    async fn test_launch_missing_binary_fails() {
        let request = CommandRequest::new("nonexistent-binary-xyz").unwrap();
        let err = launch(&request, CancelContext::detached(None)).unwrap_err();
        assert!(matches!(err, BridgeError::LaunchFailed(_)));
        assert!(err.to_string().starts_with("start failed:"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_launch_missing_working_dir_fails() {
        let request = CommandRequest::new("true")
            .unwrap()
            .working_dir("/definitely/not/a/real/dir");
        let err = launch(&request, CancelContext::detached(None)).unwrap_err();
        assert!(matches!(err, BridgeError::LaunchFailed(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_launch_times_out() {
        let request = CommandRequest::new("sleep").unwrap().arg("10");
        let ctx = CancelContext::detached(Some(std::time::Duration::from_millis(200)));
        let exec = launch(&request, ctx).unwrap();

        let outcome = tokio::time::timeout(std::time::Duration::from_secs(5), exec.wait())
            .await
            .unwrap();
        assert!(outcome.is_timeout());
        assert!(!outcome.success());
    }
}
