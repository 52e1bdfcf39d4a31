//! Core application logic: session state, server message dispatch, and the
//! client that owns them.

pub mod action;
pub mod client;
pub mod event;
pub mod handler;
mod sender;
pub mod state;
