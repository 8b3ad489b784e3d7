//! Process-wide shutdown coordination.
//!
//! OS signals, a UI "Quit" action and listener faults all funnel into
//! [`ShutdownCoordinator::shutdown`]. Whoever gets there first starts the
//! shutdown; later calls are no-ops. Everything that has to stop observes
//! the same token.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// How long in-flight requests get to finish once shutdown starts.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// What asked for the shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownTrigger {
    /// SIGINT / Ctrl-C, or SIGTERM on unix.
    Signal,
    /// The user chose "Quit" in a UI.
    Quit,
    /// The HTTP listener failed.
    ListenerFault,
}

impl fmt::Display for ShutdownTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Signal => "signal",
            Self::Quit => "quit",
            Self::ListenerFault => "listener fault",
        })
    }
}

/// Idempotent shutdown switch shared by every trigger source.
#[derive(Debug, Clone)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    triggered: Arc<AtomicBool>,
    grace: Duration,
}

impl ShutdownCoordinator {
    /// Create a coordinator with the default grace period.
    pub fn new() -> Self {
        Self::with_grace(SHUTDOWN_GRACE)
    }

    /// Create a coordinator with a custom grace period.
    pub fn with_grace(grace: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            triggered: Arc::new(AtomicBool::new(false)),
            grace,
        }
    }

    /// Start shutting down.
    ///
    /// Returns `true` if this call started the shutdown and `false` if it
    /// was already under way.
    pub fn shutdown(&self, trigger: ShutdownTrigger) -> bool {
        if self.triggered.swap(true, Ordering::SeqCst) {
            debug!(%trigger, "shutdown already in progress");
            return false;
        }
        info!(%trigger, "shutting down");
        self.token.cancel();
        true
    }

    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once shutdown has started.
    pub async fn wait(&self) {
        self.token.cancelled().await;
    }

    /// A token cancelled when shutdown starts, for loops that select on it.
    pub fn token(&self) -> CancellationToken {
        self.token.child_token()
    }

    pub fn grace_period(&self) -> Duration {
        self.grace
    }

    /// Spawn a task that triggers shutdown on SIGINT or SIGTERM.
    ///
    /// The task exits quietly if shutdown starts some other way.
    pub fn listen_for_signals(&self) -> JoinHandle<()> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = os_signal() => {
                    coordinator.shutdown(ShutdownTrigger::Signal);
                }
                _ = coordinator.wait() => {}
            }
        })
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves on the first termination signal.
///
/// If a handler cannot be installed, that source never fires.
async fn os_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_is_idempotent() {
        let coordinator = ShutdownCoordinator::new();
        assert!(!coordinator.is_shutting_down());

        assert!(coordinator.shutdown(ShutdownTrigger::Signal));
        assert!(coordinator.is_shutting_down());

        assert!(!coordinator.shutdown(ShutdownTrigger::Quit));
        assert!(!coordinator.shutdown(ShutdownTrigger::ListenerFault));
        assert!(coordinator.is_shutting_down());
    }

    #[test]
    fn test_clones_share_state() {
        let coordinator = ShutdownCoordinator::new();
        let tray = coordinator.clone();

        assert!(tray.shutdown(ShutdownTrigger::Quit));
        assert!(coordinator.is_shutting_down());
        assert!(!coordinator.shutdown(ShutdownTrigger::Signal));
    }

    #[tokio::test]
    async fn test_wait_and_token_observe_shutdown() {
        let coordinator = ShutdownCoordinator::new();
        let token = coordinator.token();

        let waiter = {
            let c = coordinator.clone();
            tokio::spawn(async move { c.wait().await })
        };

        coordinator.shutdown(ShutdownTrigger::Quit);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_wait_pending_until_shutdown() {
        use tokio_test::{assert_pending, assert_ready, task};

        let coordinator = ShutdownCoordinator::new();
        let mut wait = task::spawn(coordinator.wait());
        assert_pending!(wait.poll());

        coordinator.shutdown(ShutdownTrigger::Signal);
        assert!(wait.is_woken());
        assert_ready!(wait.poll());
    }

    #[tokio::test]
    async fn test_signal_listener_exits_on_other_trigger() {
        let coordinator = ShutdownCoordinator::new();
        let listener = coordinator.listen_for_signals();

        coordinator.shutdown(ShutdownTrigger::Quit);
        tokio::time::timeout(Duration::from_secs(1), listener)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_grace_period() {
        assert_eq!(ShutdownCoordinator::new().grace_period(), SHUTDOWN_GRACE);
        assert_eq!(
            ShutdownCoordinator::with_grace(Duration::from_millis(10)).grace_period(),
            Duration::from_millis(10)
        );
    }

    #[test]
    fn test_trigger_display() {
        assert_eq!(ShutdownTrigger::Signal.to_string(), "signal");
        assert_eq!(ShutdownTrigger::ListenerFault.to_string(), "listener fault");
    }
}
