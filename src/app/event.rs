use crate::irc::message::ParsedMessage;

/// Identifies one socket lifetime; see [`crate::irc::connection::Connection::id`].
pub type ConnectionId = u64;

#[derive(Debug)]
pub enum AppEvent {
    /// Line received from the server
    ServerMessage {
        connection_id: ConnectionId,
        message: ParsedMessage,
    },

    /// Reader stopped on end of stream or a read error
    Disconnected {
        connection_id: ConnectionId,
        reason: String,
    },

    /// Periodic housekeeping (presence-check expiry)
    Tick,
}
