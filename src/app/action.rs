use crate::app::state::ConversationTarget;
use crate::irc::message::Command;

/// Side effects requested by the dispatcher. The client applies them in
/// order after the session has been updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Append a line to a conversation log
    Display { target: ConversationTarget, text: String },
    /// Create the log for a newly referenced conversation
    OpenConversation(ConversationTarget),
    /// Destroy a conversation log
    CloseConversation(ConversationTarget),
    /// Transmit a command to the server
    Send(Command),
    /// Drop the connection
    Disconnect { reason: String },
}

impl Action {
    pub fn status(text: impl Into<String>) -> Self {
        Action::Display {
            target: ConversationTarget::Status,
            text: text.into(),
        }
    }

    pub fn display(target: ConversationTarget, text: impl Into<String>) -> Self {
        Action::Display {
            target,
            text: text.into(),
        }
    }
}
