//! # shell-bridge
//!
//! Local HTTP gateway that runs commands as child processes.
//!
//! A caller posts a command descriptor to `/api/run`. In foreground mode
//! the combined stdout/stderr is streamed back while the process runs and
//! closing the connection kills it. In background mode the response
//! returns right away with the child's pid and the process keeps running
//! on its own.
//!
//! ## Features
//!
//! - **Streaming output**: each chunk reaches the caller as it is produced
//! - **Timeouts**: per-request, in both modes
//! - **Graceful shutdown**: signals and the control menu share one idempotent stop
//! - **Bundled UI**: a small web page served from the binary
//!
//! There is no authentication and no command filtering; bind to loopback
//! unless every client on the network is trusted.
//!
//! ## Quick Start
//!
//! ```no_run
//! use shell_bridge::api::{Service, ServerConfig};
//! use shell_bridge::shutdown::ShutdownCoordinator;
//!
//! #[tokio::main]
//! async fn main() -> shell_bridge::Result<()> {
//!     shell_bridge::logging::try_init("info").ok();
//!
//!     let shutdown = ShutdownCoordinator::new();
//!     shutdown.listen_for_signals();
//!
//!     let service = Service::bind(&ServerConfig::default(), shutdown).await?;
//!     println!("listening on {}", service.local_addr());
//!     service.run().await
//! }
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod control;
pub mod desktop;
pub mod error;
pub mod execution;
pub mod logging;
pub mod shutdown;

// Re-export commonly used types
pub use error::{BridgeError, Result};
pub use execution::{CommandRequest, Execution, ExecutionMode, ExitOutcome};
pub use shutdown::{ShutdownCoordinator, ShutdownTrigger};
