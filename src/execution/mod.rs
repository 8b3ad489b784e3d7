//! Command execution engine.
//!
//! This module turns a [`CommandRequest`] into a running child process:
//! - Process launching with working-directory and timeout control
//! - Foreground execution with output streamed to the caller
//! - Background execution reaped independently of the caller
//!
//! # Example
//!
//! ```no_run
//! use shell_bridge::execution::{execute, CommandRequest, Execution};
//!
//! # async fn demo() -> shell_bridge::Result<()> {
//! let request = CommandRequest::new("cargo")?.arg("build").timeout_secs(600);
//! match execute(&request)? {
//!     Execution::Streaming(run) => println!("streaming pid {}", run.pid),
//!     Execution::Background(started) => println!("detached pid {}", started.pid),
//! }
//! # Ok(())
//! # }
//! ```

mod context;
mod controller;
mod launcher;
pub mod relay;
mod request;
mod result;

pub use context::{CancelContext, ExecutionContext};
pub use controller::{
    execute, run_background, run_foreground, BackgroundStarted, Execution, StreamingRun,
};
pub use launcher::{launch, resolve_working_dir};
pub use relay::{OutputRelay, RelayStream};
pub use request::{CommandRequest, ExecutionMode};
pub use result::{CancelReason, ExitOutcome};
