//! API router and server lifecycle.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use hyper::body::Incoming;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinError, JoinSet};
use tower::ServiceExt;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{debug, error, info, warn, Level};

use super::handlers::{method_not_allowed, run_command, AppState};
use super::ui;
use crate::error::BridgeError;
use crate::shutdown::{ShutdownCoordinator, ShutdownTrigger};

/// Create the API router with all routes configured.
pub fn create_router() -> Router {
    create_router_with_state(AppState::new())
}

/// Create the API router with custom state.
pub fn create_router_with_state(state: AppState) -> Router {
    Router::new()
        .route("/api/run", post(run_command).fallback(method_not_allowed))
        .route("/", get(ui::index))
        .route("/app.js", get(ui::script))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host name or address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn bind_address(&self) -> String {
        join_host_port(&self.host, self.port)
    }

    /// URL a local browser should open for the UI.
    ///
    /// Wildcard bind addresses are not reachable as-is, so they map to
    /// the loopback address.
    pub fn ui_url(&self) -> String {
        let host = match self.host.as_str() {
            "" | "0.0.0.0" | "::" | "[::]" => "127.0.0.1",
            other => other,
        };
        format!("http://{}", join_host_port(host, self.port))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8088,
        }
    }
}

fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

/// A bound HTTP service.
///
/// Holds the listener from [`Service::bind`] until [`Service::run`] serves
/// on it; shutdown is driven through the shared [`ShutdownCoordinator`].
pub struct Service {
    listener: TcpListener,
    local_addr: SocketAddr,
    state: AppState,
}

impl Service {
    /// Bind the listener.
    pub async fn bind(config: &ServerConfig, shutdown: ShutdownCoordinator) -> crate::Result<Self> {
        let addr = config.bind_address();
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            error!(address = %addr, error = %e, "bind failed");
            BridgeError::Io(e)
        })?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            listener,
            local_addr,
            state: AppState::with_shutdown(shutdown),
        })
    }

    /// The address actually bound (resolves port `0`).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Handle for triggering or observing shutdown.
    pub fn shutdown_handle(&self) -> ShutdownCoordinator {
        self.state.shutdown.clone()
    }

    /// Serve until shutdown.
    ///
    /// Once shutdown starts the listener stops accepting and every open
    /// connection is asked to close after its current response. Connections
    /// still open when the grace period ends are aborted, which drops their
    /// response bodies and kills any foreground command behind them. A
    /// listener error triggers shutdown itself and is returned.
    pub async fn run(self) -> crate::Result<()> {
        let Service {
            listener,
            local_addr,
            state,
        } = self;
        let shutdown = state.shutdown.clone();
        let app = create_router_with_state(state);

        info!(address = %local_addr, "HTTP UI/API available at http://{}", local_addr);

        let mut connections: JoinSet<()> = JoinSet::new();
        let mut fault = None;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    log_connection_exit(joined);
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        connections.spawn(serve_connection(stream, peer, app.clone(), shutdown.clone()));
                    }
                    Err(e) if is_connection_error(&e) => {
                        debug!(error = %e, "accept: connection dropped before setup");
                    }
                    Err(e) => {
                        error!(error = %e, "http listener failed");
                        shutdown.shutdown(ShutdownTrigger::ListenerFault);
                        fault = Some(e);
                        break;
                    }
                },
            }
        }

        drop(listener);
        let aborted = drain_connections(&mut connections, shutdown.grace_period()).await;

        if let Some(e) = fault {
            return Err(BridgeError::Io(e));
        }
        info!(aborted, "HTTP server stopped");
        Ok(())
    }
}

/// Serve one accepted connection until it closes or shutdown asks it to.
async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    app: Router,
    shutdown: ShutdownCoordinator,
) {
    let io = TokioIo::new(stream);
    let service = hyper::service::service_fn(move |request: Request<Incoming>| {
        app.clone().oneshot(request)
    });

    let builder = auto::Builder::new(TokioExecutor::new());
    let conn = builder.serve_connection(io, service);
    let mut conn = std::pin::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        _ = shutdown.wait() => {
            conn.as_mut().graceful_shutdown();
            conn.await
        }
    };
    if let Err(e) = result {
        debug!(%peer, error = %e, "connection closed with error");
    }
}

/// Wait up to `grace` for every connection to finish, then abort the rest.
///
/// Returns how many connections had to be aborted.
async fn drain_connections(connections: &mut JoinSet<()>, grace: Duration) -> usize {
    let drained = tokio::time::timeout(grace, async {
        while let Some(joined) = connections.join_next().await {
            log_connection_exit(joined);
        }
    })
    .await;

    if drained.is_ok() {
        return 0;
    }

    let remaining = connections.len();
    warn!(
        remaining,
        "{}; closing remaining connections",
        BridgeError::ShutdownTimeout(grace)
    );
    connections.shutdown().await;
    remaining
}

fn log_connection_exit(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            error!(error = %e, "connection task panicked");
        }
    }
}

/// Errors that concern only the connection being accepted, not the listener.
fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}

/// Bind and serve with OS signal handling installed.
pub async fn serve(config: ServerConfig) -> crate::Result<()> {
    let shutdown = ShutdownCoordinator::new();
    let signals = shutdown.listen_for_signals();
    let result = Service::bind(&config, shutdown).await?.run().await;
    signals.abort();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8088);
        assert_eq!(config.bind_address(), "127.0.0.1:8088");
    }

    #[test]
    fn test_server_config_custom() {
        let config = ServerConfig::new("0.0.0.0", 8080);
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_server_config_ipv6() {
        let config = ServerConfig::new("::1", 9000);
        assert_eq!(config.bind_address(), "[::1]:9000");
    }

    #[test]
    fn test_ui_url_maps_wildcard_hosts() {
        assert_eq!(
            ServerConfig::new("0.0.0.0", 8088).ui_url(),
            "http://127.0.0.1:8088"
        );
        assert_eq!(ServerConfig::new("::", 8088).ui_url(), "http://127.0.0.1:8088");
        assert_eq!(ServerConfig::new("", 8088).ui_url(), "http://127.0.0.1:8088");
        assert_eq!(
            ServerConfig::new("localhost", 1234).ui_url(),
            "http://localhost:1234"
        );
    }

    #[test]
    fn test_router_creation() {
        let _router = create_router();
    }

    #[tokio::test]
    async fn test_service_stops_on_shutdown() {
        let shutdown = ShutdownCoordinator::with_grace(Duration::from_millis(200));
        let service = Service::bind(&ServerConfig::new("127.0.0.1", 0), shutdown.clone())
            .await
            .unwrap();
        assert_ne!(service.local_addr().port(), 0);

        let task = tokio::spawn(service.run());
        assert!(shutdown.shutdown(ShutdownTrigger::Quit));
        assert!(!shutdown.shutdown(ShutdownTrigger::Signal));

        let result = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_drain_waits_for_finishing_connections() {
        let mut connections = JoinSet::new();
        connections.spawn(tokio::time::sleep(Duration::from_millis(20)));

        let aborted = drain_connections(&mut connections, Duration::from_secs(2)).await;
        assert_eq!(aborted, 0);
        assert!(connections.is_empty());
    }

    #[tokio::test]
    async fn test_drain_aborts_connections_past_grace() {
        let mut connections = JoinSet::new();
        connections.spawn(async {});
        connections.spawn(std::future::pending::<()>());

        let aborted = drain_connections(&mut connections, Duration::from_millis(50)).await;
        assert_eq!(aborted, 1);
        assert!(connections.is_empty());
    }

    #[test]
    fn test_connection_errors_do_not_stop_listener() {
        assert!(is_connection_error(&io::Error::from(io::ErrorKind::ConnectionAborted)));
        assert!(!is_connection_error(&io::Error::from(io::ErrorKind::PermissionDenied)));
    }

    #[tokio::test]
    async fn test_bind_conflict_fails() {
        let first = Service::bind(&ServerConfig::new("127.0.0.1", 0), ShutdownCoordinator::new())
            .await
            .unwrap();
        let port = first.local_addr().port();

        let second =
            Service::bind(&ServerConfig::new("127.0.0.1", port), ShutdownCoordinator::new()).await;
        assert!(matches!(second, Err(BridgeError::Io(_))));
    }

    #[cfg(unix)]
    mod in_flight {
        use super::*;
        use std::time::Instant;
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::task::JoinHandle;

        async fn start(grace: Duration) -> (ShutdownCoordinator, SocketAddr, JoinHandle<crate::Result<()>>) {
            let shutdown = ShutdownCoordinator::with_grace(grace);
            let service = Service::bind(&ServerConfig::new("127.0.0.1", 0), shutdown.clone())
                .await
                .unwrap();
            let addr = service.local_addr();
            (shutdown, addr, tokio::spawn(service.run()))
        }

        async fn post_script(addr: SocketAddr, script: &str) -> TcpStream {
            let body = serde_json::json!({"cmd": "sh", "args": ["-c", script]}).to_string();
            let head = format!(
                "POST /api/run HTTP/1.1\r\nHost: {addr}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n",
                body.len()
            );
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(head.as_bytes()).await.unwrap();
            stream.write_all(body.as_bytes()).await.unwrap();
            stream
        }

        async fn read_until(stream: &mut TcpStream, buf: &mut Vec<u8>, needle: &[u8]) {
            let mut chunk = [0u8; 1024];
            while !buf.windows(needle.len()).any(|w| w == needle) {
                let n = stream.read(&mut chunk).await.unwrap();
                assert!(n > 0, "connection closed early");
                buf.extend_from_slice(&chunk[..n]);
            }
        }

        #[tokio::test]
        async fn test_request_within_grace_completes() {
            let (shutdown, addr, server) = start(Duration::from_secs(5)).await;
            let mut stream = post_script(addr, "echo first; sleep 1; echo second").await;
            let mut buf = Vec::new();
            tokio::time::timeout(Duration::from_secs(3), read_until(&mut stream, &mut buf, b"first\n"))
                .await
                .unwrap();

            shutdown.shutdown(ShutdownTrigger::Signal);

            tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut buf))
                .await
                .unwrap()
                .unwrap();
            let text = String::from_utf8_lossy(&buf);
            assert!(text.starts_with("HTTP/1.1 200"));
            assert!(text.contains("second\n"));
            assert!(text.ends_with("0\r\n\r\n"));

            let result = tokio::time::timeout(Duration::from_secs(2), server)
                .await
                .unwrap()
                .unwrap();
            assert!(result.is_ok());
        }

        #[tokio::test]
        async fn test_request_past_grace_is_cut_off() {
            let (shutdown, addr, server) = start(Duration::from_millis(300)).await;
            let mut stream = post_script(addr, "echo first; sleep 10").await;
            let mut buf = Vec::new();
            tokio::time::timeout(Duration::from_secs(3), read_until(&mut stream, &mut buf, b"first\n"))
                .await
                .unwrap();

            let stopped = Instant::now();
            shutdown.shutdown(ShutdownTrigger::Signal);

            let closed = tokio::time::timeout(Duration::from_secs(3), stream.read_to_end(&mut buf)).await;
            assert!(closed.is_ok(), "connection still open after the grace period");
            assert!(stopped.elapsed() < Duration::from_secs(3));
            assert!(!String::from_utf8_lossy(&buf).ends_with("0\r\n\r\n"));

            let result = tokio::time::timeout(Duration::from_secs(2), server)
                .await
                .unwrap()
                .unwrap();
            assert!(result.is_ok());
        }

        #[tokio::test]
        async fn test_idle_connection_closes_on_shutdown() {
            let (shutdown, addr, server) = start(Duration::from_millis(500)).await;
            let mut stream = TcpStream::connect(addr).await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;

            shutdown.shutdown(ShutdownTrigger::Quit);

            let mut buf = Vec::new();
            let closed = tokio::time::timeout(Duration::from_secs(2), stream.read_to_end(&mut buf)).await;
            assert!(closed.is_ok());
            assert!(tokio::time::timeout(Duration::from_secs(2), server).await.is_ok());
        }
    }
}
