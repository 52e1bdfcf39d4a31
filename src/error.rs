//! Error taxonomy for the protocol engine.
//!
//! None of these are fatal to the process: callers report them on the status
//! conversation and keep running.

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Transport-level failure opening, reading or writing the socket.
    #[error("connection error: {0}")]
    Connect(#[from] io::Error),

    /// The server sent more than this many bytes without a line break.
    #[error("line exceeds maximum length ({0} bytes)")]
    LineTooLong(usize),

    #[error("not connected to a server")]
    NotConnected,

    #[error("not joined to a channel")]
    NoChannelJoined,

    /// The server rejected the requested nickname (433).
    #[error("nickname {0} is already in use")]
    NameCollision(String),

    #[error("server did not complete registration within {0} seconds")]
    RegistrationTimeout(u64),

    #[error("still waiting for a presence reply about {0}")]
    PresencePending(String),

    #[error("{0} must not be empty")]
    InvalidArgument(&'static str),
}

pub type Result<T> = std::result::Result<T, EngineError>;
