//! Relay Client - terminal peer for the relay chat server
//!
//! This crate provides:
//! - `connection` - TCP connection split into outgoing and incoming halves
//! - `input` - Parsing of typed lines into chat commands
//! - `terminal` - Interactive stdin/stdout loop used by the `relay` binary
//! - `error` - Client error types

pub mod connection;
pub mod error;
pub mod input;
pub mod terminal;

pub use connection::{connect, Incoming, Outgoing, RelayConnection};
pub use error::{ClientError, Result};
pub use input::InputCommand;
pub use terminal::{chat, run_terminal, TerminalConfig};
