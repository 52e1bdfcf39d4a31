//! Configuration data model.
//!
//! All structs derive `Serialize`/`Deserialize` for TOML persistence.
//! Every field has a sensible default so the application works out of the box.

use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub behavior: BehaviorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// The server to connect to and the identity to register with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Hostname or IP address of the IRC server.
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Asked for at connect time when unset.
    #[serde(default)]
    pub nickname: Option<String>,
    /// Asked for at connect time when unset.
    #[serde(default)]
    pub realname: Option<String>,
    #[serde(default = "default_quit_message")]
    pub quit_message: String,
    #[serde(default)]
    pub auto_connect: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            nickname: None,
            realname: None,
            quit_message: default_quit_message(),
            auto_connect: false,
        }
    }
}

/// Engine timeouts and output formatting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorConfig {
    #[serde(default = "default_registration_timeout")]
    pub registration_timeout_secs: u64,
    /// How long a directed message waits for its ISON reply.
    #[serde(default = "default_presence_timeout")]
    pub presence_timeout_secs: u64,
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            registration_timeout_secs: default_registration_timeout(),
            presence_timeout_secs: default_presence_timeout(),
            timestamp_format: default_timestamp_format(),
        }
    }
}

impl BehaviorConfig {
    /// Replace a timestamp format chrono cannot render with the default.
    /// Returns `false` if the configured one was rejected.
    pub fn check_timestamp_format(&mut self) -> bool {
        if is_valid_timestamp_format(&self.timestamp_format) {
            return true;
        }
        self.timestamp_format = default_timestamp_format();
        false
    }
}

/// `true` if every strftime specifier in `format` is one chrono knows.
pub fn is_valid_timestamp_format(format: &str) -> bool {
    !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

/// Diagnostics level and chat transcript settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter for diagnostics on stderr when `RUST_LOG` is not set.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_true")]
    pub log_channels: bool,
    #[serde(default)]
    pub log_queries: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            enabled: false,
            log_dir: default_log_dir(),
            log_channels: true,
            log_queries: false,
        }
    }
}

fn default_host() -> String {
    "irc.libera.chat".to_string()
}
fn default_port() -> u16 {
    6667
}
fn default_true() -> bool {
    true
}
fn default_quit_message() -> String {
    "ircline".to_string()
}
fn default_registration_timeout() -> u64 {
    30
}
fn default_presence_timeout() -> u64 {
    15
}
fn default_timestamp_format() -> String {
    "%H:%M".to_string()
}
fn default_level() -> String {
    "warn".to_string()
}
fn default_log_dir() -> String {
    "~/.local/share/ircline/logs".to_string()
}
