//! Interactive control menu on the terminal.
//!
//! Offers the actions of a tray menu: open the UI, show where the service
//! listens, quit. Quitting goes through the shared [`ShutdownCoordinator`],
//! and the menu closes by itself when shutdown starts some other way.

use std::io::BufRead;
use std::thread;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::desktop;
use crate::shutdown::{ShutdownCoordinator, ShutdownTrigger};

/// One menu entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    OpenUi,
    Status,
    Help,
    Quit,
}

impl MenuAction {
    /// Parse a typed command. Case and surrounding whitespace are ignored.
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "o" | "open" => Some(Self::OpenUi),
            "s" | "status" => Some(Self::Status),
            "h" | "help" | "?" => Some(Self::Help),
            "q" | "quit" | "exit" => Some(Self::Quit),
            _ => None,
        }
    }
}

/// Terminal counterpart of a tray icon menu.
#[derive(Debug, Clone)]
pub struct ControlMenu {
    shutdown: ShutdownCoordinator,
    address: String,
    ui_url: String,
}

impl ControlMenu {
    pub fn new(
        shutdown: ShutdownCoordinator,
        address: impl Into<String>,
        ui_url: impl Into<String>,
    ) -> Self {
        Self {
            shutdown,
            address: address.into(),
            ui_url: ui_url.into(),
        }
    }

    pub fn status_line(&self) -> String {
        format!("Listening on {}", self.address)
    }

    /// Run the menu on the process's stdin.
    pub fn spawn_on_stdin(self) -> JoinHandle<()> {
        tokio::spawn(self.run(stdin_lines()))
    }

    /// Handle commands from `lines` until quit, end of input, or shutdown.
    pub async fn run(self, mut lines: mpsc::Receiver<String>) {
        let token = self.shutdown.token();
        println!("{}", self.status_line());
        print_usage();

        loop {
            let line = tokio::select! {
                _ = token.cancelled() => {
                    debug!("control menu closed: shutting down");
                    return;
                }
                line = lines.recv() => line,
            };
            let Some(line) = line else {
                debug!("control menu input closed");
                return;
            };
            if line.trim().is_empty() {
                continue;
            }

            match MenuAction::parse(&line) {
                Some(MenuAction::OpenUi) => {
                    let url = self.ui_url.clone();
                    tokio::task::spawn_blocking(move || desktop::open_browser(&url));
                }
                Some(MenuAction::Status) => println!("{}", self.status_line()),
                Some(MenuAction::Help) => print_usage(),
                Some(MenuAction::Quit) => {
                    info!("quit requested from control menu");
                    self.shutdown.shutdown(ShutdownTrigger::Quit);
                    return;
                }
                None => warn!(input = line.trim(), "unknown control command; type 'help'"),
            }
        }
    }
}

fn print_usage() {
    println!("Commands: open (o), status (s), help (h), quit (q)");
}

/// Forward stdin lines from a dedicated thread.
///
/// A pending stdin read would hold up runtime shutdown, so the thread is
/// detached and ends with the process.
fn stdin_lines() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(8);
    let spawned = thread::Builder::new()
        .name("control-stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        warn!(error = %e, "control menu unavailable");
    }
    rx
}
