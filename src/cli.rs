//! Command-line interface for shell-bridge.
//!
//! Uses lexopt for minimal binary size overhead. Options that are not
//! given stay `None`/`false` so lower-priority layers can fill them in.

use std::ffi::OsString;
use std::path::PathBuf;

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Host name or address to bind to.
    pub host: Option<String>,
    /// Port to listen on.
    pub port: Option<u16>,
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Skip autostart registration.
    pub no_autostart: bool,
    /// Open the web UI in the default browser on start.
    pub open_ui: bool,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => {
                result.help = true;
            }
            Short('V') | Long("version") => {
                result.version = true;
            }
            Short('H') | Long("host") => {
                let value: String = parser.value()?.parse()?;
                if value.trim().is_empty() {
                    return Err(ArgsError::InvalidValue("host", value));
                }
                result.host = Some(value);
            }
            Short('p') | Long("port") => {
                let value: String = parser.value()?.parse()?;
                result.port = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("port", value))?,
                );
            }
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Long("no-autostart") => {
                result.no_autostart = true;
            }
            Long("open-ui") => {
                result.open_ui = true;
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Value(val) => {
                return Err(ArgsError::UnexpectedArgument(val.to_string_lossy().into()));
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    Ok(result)
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"shell-bridge {version}
Local HTTP gateway that runs commands and streams their output

USAGE:
    shell-bridge [OPTIONS]

OPTIONS:
    -H, --host <ADDR>       Host/IP to bind (0.0.0.0 listens on all interfaces) [default: 127.0.0.1]
    -p, --port <PORT>       Port to listen on [default: 8088]
    -c, --config <FILE>     Path to configuration file (JSON)
    -l, --log-level <LVL>   Log level (error, warn, info, debug, trace)
        --no-autostart      Do not register the service to start at login
        --open-ui           Open the web UI in the default browser on start
    -h, --help              Print help
    -V, --version           Print version

ENVIRONMENT VARIABLES:
    SHELL_BRIDGE_HOST       Host address (overrides config file)
    SHELL_BRIDGE_PORT       Port number (overrides config file)
    SHELL_BRIDGE_LOG_LEVEL  Log level (overrides config file)
    RUST_LOG                Full tracing filter (overrides log level)

EXAMPLES:
    # Start with defaults (127.0.0.1:8088)
    shell-bridge

    # Listen on all interfaces and open the UI
    shell-bridge -H 0.0.0.0 -p 9000 --open-ui

    # Run a command through the API
    curl -N -d '{{"cmd":"echo","args":["hi"]}}' http://127.0.0.1:8088/api/run
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("shell-bridge {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    /// Unexpected positional argument.
    UnexpectedArgument(String),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::UnexpectedArgument(arg) => {
                write!(f, "unexpected argument: '{}'", arg)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}
