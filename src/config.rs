//! Configuration management for shell-bridge.
//!
//! Settings are resolved with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::ServerConfig;
use crate::cli::Args;

/// Directory name used under the platform config directory.
const APP_DIR: &str = "shell-bridge";

/// Contents of the JSON configuration file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Host address to bind to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Port to listen on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    /// Register the service to start at login.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autostart: Option<bool>,
    /// Open the web UI on start.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_ui: Option<bool>,
    /// Log level (error, warn, info, debug, trace).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load configuration if the file exists.
    ///
    /// A missing file is `Ok(None)`; any other failure is an error.
    pub fn load_optional(path: &Path) -> Result<Option<Self>, ConfigError> {
        match Self::from_file(path) {
            Ok(config) => Ok(Some(config)),
            Err(ConfigError::Io { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// Default location of the configuration file.
///
/// `<config dir>/shell-bridge/config.json`, where the config dir is the
/// platform's (`%APPDATA%`, `$XDG_CONFIG_HOME` or `~/.config`,
/// `~/Library/Application Support`).
pub fn default_config_path() -> PathBuf {
    config_path_in(dirs::config_dir())
}

/// Config file path under `config_dir`, or `shell-bridge.config.json` in
/// the working directory when there is no config dir.
pub fn config_path_in(config_dir: Option<PathBuf>) -> PathBuf {
    config_dir
        .map(|dir| dir.join(APP_DIR).join("config.json"))
        .unwrap_or_else(|| PathBuf::from(format!("{APP_DIR}.config.json")))
}

/// Fully resolved startup settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub autostart: bool,
    pub open_ui: bool,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        let server = ServerConfig::default();
        Self {
            host: server.host,
            port: server.port,
            autostart: true,
            open_ui: false,
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Resolve settings from all layers.
    pub fn resolve(args: &Args, file: Option<&Config>) -> Self {
        Self::resolve_with_env(args, file, |key| std::env::var(key).ok())
    }

    /// Resolve settings, reading the environment through `lookup`.
    pub fn resolve_with_env<F>(args: &Args, file: Option<&Config>, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();
        if let Some(config) = file {
            settings.apply_config(config);
        }
        settings.apply_env_from(lookup);
        settings.apply_args(args);
        settings
    }

    /// Apply values present in the configuration file.
    pub fn apply_config(&mut self, config: &Config) {
        if let Some(host) = config.host.as_ref().filter(|h| !h.is_empty()) {
            self.host = host.clone();
        }
        if let Some(port) = config.port.filter(|p| *p != 0) {
            self.port = port;
        }
        if let Some(autostart) = config.autostart {
            self.autostart = autostart;
        }
        if let Some(open_ui) = config.open_ui {
            self.open_ui = open_ui;
        }
        if let Some(level) = config.log_level.as_ref().filter(|l| !l.is_empty()) {
            self.log_level = level.clone();
        }
    }

    /// Apply environment variable overrides.
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("SHELL_BRIDGE_HOST").filter(|h| !h.is_empty()) {
            self.host = host;
        }

        if let Some(port) = lookup("SHELL_BRIDGE_PORT") {
            if let Ok(port) = port.parse() {
                self.port = port;
            }
        }

        if let Some(level) = lookup("SHELL_BRIDGE_LOG_LEVEL").filter(|l| !l.is_empty()) {
            self.log_level = level;
        }
    }

    /// Apply CLI argument overrides. Only options actually given count.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(ref host) = args.host {
            self.host = host.clone();
        }
        if let Some(port) = args.port {
            self.port = port;
        }
        if args.no_autostart {
            self.autostart = false;
        }
        if args.open_ui {
            self.open_ui = true;
        }
        if let Some(ref level) = args.log_level {
            self.log_level = level.clone();
        }
    }

    /// Convert to ServerConfig for the API server.
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig::new(self.host.clone(), self.port)
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// JSON parsing error.
    #[error("failed to parse config file {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}
