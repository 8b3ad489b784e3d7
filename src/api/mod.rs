//! HTTP layer for shell-bridge.
//!
//! ## Endpoints
//!
//! - `POST /api/run` - Run a command. Foreground runs stream combined
//!   stdout/stderr as `text/plain`; background runs answer `202 Accepted`
//!   with the child's pid.
//! - `GET /` and `GET /app.js` - Bundled web UI
//!
//! ## Example
//!
//! ```no_run
//! use shell_bridge::api::{serve, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> shell_bridge::Result<()> {
//!     let config = ServerConfig::new("127.0.0.1", 8088);
//!     serve(config).await
//! }
//! ```

pub mod handlers;
pub mod router;
pub mod types;
pub mod ui;

// Re-export commonly used types
pub use handlers::AppState;
pub use router::{create_router, create_router_with_state, serve, ServerConfig, Service};
pub use types::{BackgroundResponse, RunRequest};
