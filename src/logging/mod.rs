//! Diagnostics and chat transcripts.
//!
//! Diagnostics go to stderr through `tracing`. When enabled, conversation
//! lines are also written to daily log files named `<target>_<date>.log` in
//! the configured log directory (default: `~/.local/share/ircline/logs/`).

use crate::app::state::ConversationTarget;
use crate::config::LoggingConfig;
use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Install the stderr subscriber. `RUST_LOG` overrides `level`.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Writes conversation lines to per-channel/query daily log files.
///
/// File handles are cached for the lifetime of the logger. A target whose
/// file cannot be opened is skipped after one warning.
pub struct ChatLogger {
    enabled: bool,
    log_dir: PathBuf,
    log_channels: bool,
    log_queries: bool,
    file_handles: HashMap<String, Option<fs::File>>,
}

impl ChatLogger {
    pub fn new(config: &LoggingConfig) -> Self {
        Self {
            enabled: config.enabled,
            log_dir: expand_home(&config.log_dir),
            log_channels: config.log_channels,
            log_queries: config.log_queries,
            file_handles: HashMap::new(),
        }
    }

    /// Append `line` to the transcript of `target`. No-op if logging is
    /// disabled or the target kind is not configured for logging.
    pub fn log_line(&mut self, target: &ConversationTarget, line: &str, now: DateTime<Local>) {
        if !self.enabled {
            return;
        }
        let name = match target {
            ConversationTarget::Channel(ch) if self.log_channels => ch,
            ConversationTarget::User(nick) if self.log_queries => nick,
            _ => return,
        };

        let filename = format!("{}_{}.log", sanitize(name), now.format("%Y-%m-%d"));
        let log_dir = &self.log_dir;
        let handle = self.file_handles.entry(filename.clone()).or_insert_with(|| {
            let path = log_dir.join(&filename);
            let opened = fs::create_dir_all(log_dir)
                .and_then(|_| OpenOptions::new().create(true).append(true).open(&path));
            match opened {
                Ok(file) => Some(file),
                Err(e) => {
                    warn!("cannot open transcript {}: {}", path.display(), e);
                    None
                }
            }
        });

        if let Some(file) = handle {
            if let Err(e) = writeln!(file, "[{}] {}", now.format("%H:%M:%S"), line) {
                warn!("transcript write failed for {}: {}", filename, e);
            }
        }
    }
}

fn sanitize(target: &str) -> String {
    target
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect()
}

fn expand_home(dir: &str) -> PathBuf {
    match dir.strip_prefix("~/") {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => PathBuf::from(dir),
        },
        None => PathBuf::from(dir),
    }
}
