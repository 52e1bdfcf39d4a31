//! IRC protocol layer: line framing, the message codec, the server
//! connection, and the user command parser.

pub mod codec;
pub mod commands;
pub mod connection;
pub mod message;
