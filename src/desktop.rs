//! Desktop integration: opening the UI and starting at login.

use std::process::{Command, Stdio};

use tracing::{debug, warn};

/// Value name under the `Run` key.
#[cfg(windows)]
const AUTOSTART_VALUE_NAME: &str = "ShellBridge";

/// Command line that opens `url` in the default browser.
pub fn browser_command(url: &str) -> Command {
    let mut cmd = if cfg!(windows) {
        let mut cmd = Command::new("rundll32");
        cmd.arg("url.dll,FileProtocolHandler");
        cmd
    } else if cfg!(target_os = "macos") {
        Command::new("open")
    } else {
        Command::new("xdg-open")
    };
    cmd.arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    cmd
}

/// Open `url` in the default browser. Failures are logged, not returned.
pub fn open_browser(url: &str) {
    match browser_command(url).spawn() {
        Ok(child) => debug!(url, pid = child.id(), "opened browser"),
        Err(e) => warn!(url, error = %e, "open browser failed"),
    }
}

/// Register the current executable to start when the user logs in.
///
/// Only Windows has a registration (the per-user `Run` key); elsewhere this
/// is a no-op.
#[cfg(windows)]
pub fn ensure_autostart() -> std::io::Result<()> {
    let exe = std::env::current_exe()?;
    let value = format!("\"{}\"", exe.display());
    let status = Command::new("reg")
        .args([
            "add",
            r"HKCU\Software\Microsoft\Windows\CurrentVersion\Run",
            "/v",
            AUTOSTART_VALUE_NAME,
            "/t",
            "REG_SZ",
            "/d",
            &value,
            "/f",
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()?;

    if status.success() {
        debug!(exe = %exe.display(), "autostart registered");
        Ok(())
    } else {
        Err(std::io::Error::other(format!("reg add exited with {status}")))
    }
}

/// Register the current executable to start when the user logs in.
///
/// Only Windows has a registration (the per-user `Run` key); elsewhere this
/// is a no-op.
#[cfg(not(windows))]
pub fn ensure_autostart() -> std::io::Result<()> {
    Ok(())
}
