//! Presentation seams used by the engine, plus the line-based terminal
//! implementation the binary ships with.

mod terminal;

pub use terminal::{TerminalDisplay, TerminalInput};

use crate::app::state::ConversationTarget;
use async_trait::async_trait;
use std::io;

/// Where conversation output goes.
pub trait DisplaySink {
    /// Append a line to the log of `target`.
    fn append(&mut self, target: &ConversationTarget, line: &str);
    /// A conversation was referenced for the first time.
    fn open(&mut self, target: &ConversationTarget);
    /// A conversation ended (channel left).
    fn close(&mut self, target: &ConversationTarget);
}

/// Blocking prompts answered by the user.
#[async_trait]
pub trait InputSource {
    /// First whitespace-delimited word of the answer.
    async fn ask_token(&mut self, prompt: &str) -> io::Result<String>;
    /// The whole answer, trimmed.
    async fn ask_string(&mut self, prompt: &str) -> io::Result<String>;
}
