//! Error types for the relay client.

use std::net::SocketAddr;
use std::path::PathBuf;

use relay_protocol::ProtocolError;
use thiserror::Error;

/// Errors that can occur while talking to the relay.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Failed to reach the server. Check that `relayd` is running.
    #[error("Connection refused by {addr}: {error}. Please check that the server is running.")]
    Connect { addr: SocketAddr, error: String },

    /// Reading from or writing to the server failed.
    #[error("Connection error: {0}")]
    Io(#[from] std::io::Error),

    /// A local file could not be opened or read.
    #[error("Failed to read {}: {error}", .path.display())]
    File { path: PathBuf, error: String },

    /// The file name cannot be expressed in a `FILE:` header.
    #[error("Cannot send file: {0}")]
    InvalidFile(#[from] ProtocolError),

    /// Text starting with the file prefix would be parsed as a header.
    #[error("Messages may not start with \"FILE:\"")]
    ReservedPrefix,
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
