use super::{DisplaySink, InputSource};
use crate::app::state::ConversationTarget;
use crate::config::model::is_valid_timestamp_format;
use crate::logging::ChatLogger;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::io::{self, Write};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

/// Prints every conversation to stdout, tagged with its target, and mirrors
/// it to the transcript logger.
pub struct TerminalDisplay {
    timestamp_format: String,
    logger: ChatLogger,
}

impl TerminalDisplay {
    /// An unrenderable `timestamp_format` falls back to `%H:%M`.
    pub fn new(timestamp_format: &str, logger: ChatLogger) -> Self {
        let timestamp_format = if is_valid_timestamp_format(timestamp_format) {
            timestamp_format
        } else {
            "%H:%M"
        };
        Self {
            timestamp_format: timestamp_format.to_string(),
            logger,
        }
    }

    fn render(&self, target: &ConversationTarget, line: &str, now: DateTime<Local>) -> String {
        let ts = now.format(&self.timestamp_format);
        match target {
            ConversationTarget::Status => format!("[{}] {}", ts, line),
            _ => format!("[{}] [{}] {}", ts, target, line),
        }
    }
}

impl DisplaySink for TerminalDisplay {
    fn append(&mut self, target: &ConversationTarget, line: &str) {
        let now = Local::now();
        println!("{}", self.render(target, line, now));
        self.logger.log_line(target, line, now);
    }

    fn open(&mut self, target: &ConversationTarget) {
        println!("*** Opened conversation: {}", target);
    }

    fn close(&mut self, target: &ConversationTarget) {
        println!("*** Closed conversation: {}", target);
    }
}

/// Line reader over stdin. Also answers the engine's prompts, so only one
/// reader of stdin ever exists.
pub struct TerminalInput {
    lines: Lines<BufReader<Stdin>>,
}

impl TerminalInput {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Next line typed by the user; `None` once stdin is closed.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        self.lines.next_line().await
    }

    async fn prompt(&mut self, prompt: &str) -> io::Result<String> {
        print!("{}", prompt);
        io::stdout().flush()?;
        self.lines
            .next_line()
            .await?
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "stdin closed"))
    }
}

#[async_trait]
impl InputSource for TerminalInput {
    async fn ask_token(&mut self, prompt: &str) -> io::Result<String> {
        let answer = self.prompt(prompt).await?;
        Ok(answer.split_whitespace().next().unwrap_or_default().to_string())
    }

    async fn ask_string(&mut self, prompt: &str) -> io::Result<String> {
        Ok(self.prompt(prompt).await?.trim().to_string())
    }
}
