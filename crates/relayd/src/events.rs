//! Structured relay events.
//!
//! The server core never prints. Everything worth observing is emitted as a
//! [`RelayEvent`] to an [`EventSink`] supplied by the embedder. The daemon
//! binary uses [`TracingSink`]; tests use [`ChannelSink`] to wait on
//! specific events.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::registry::ConnectionId;

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Peer closed its end of the stream.
    PeerClosed,

    /// Read from the peer failed.
    Io(String),

    /// Peer sent a malformed file header.
    Protocol(String),

    /// Peer disconnected before sending the whole declared file.
    ShortTransfer { expected: u64, received: u64 },

    /// The destination file could not be created or written.
    Sink(String),
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::PeerClosed => write!(f, "peer closed connection"),
            CloseReason::Io(e) => write!(f, "I/O error: {e}"),
            CloseReason::Protocol(e) => write!(f, "protocol error: {e}"),
            CloseReason::ShortTransfer { expected, received } => {
                write!(f, "short file transfer: {received} of {expected} bytes")
            }
            CloseReason::Sink(e) => write!(f, "file write error: {e}"),
        }
    }
}

/// Something observable that happened inside the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    /// Listening socket is bound.
    Listening { addr: SocketAddr },

    /// Accepting a connection failed; the accept loop continues.
    AcceptFailed { error: String },

    /// A client connected and was registered.
    Connected { id: ConnectionId, addr: SocketAddr },

    /// A client's session ended and it was removed from the registry.
    Disconnected {
        id: ConnectionId,
        addr: SocketAddr,
        reason: CloseReason,
    },

    /// A text line was broadcast to the other clients.
    TextRelayed {
        from: ConnectionId,
        text: String,
        delivered: usize,
        failed: usize,
    },

    /// Writing to one client failed during a broadcast.
    SendFailed { to: ConnectionId, error: String },

    /// A file header was accepted and the body is being received.
    TransferStarted {
        from: ConnectionId,
        name: String,
        size: u64,
        path: PathBuf,
    },

    /// All declared bytes of a file were written.
    TransferCompleted {
        from: ConnectionId,
        name: String,
        size: u64,
        path: PathBuf,
    },

    /// The sender went away mid-file. The partial file is left on disk.
    TransferIncomplete {
        from: ConnectionId,
        name: String,
        expected: u64,
        received: u64,
        path: PathBuf,
    },

    /// Accept loop stopped.
    Stopped,
}

/// Receiver of relay events.
pub trait EventSink: Send + Sync {
    /// Handles one event. Must not block.
    fn emit(&self, event: RelayEvent);
}

/// Shared event sink handle.
pub type SharedSink = Arc<dyn EventSink>;

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: RelayEvent) {
        match event {
            RelayEvent::Listening { addr } => {
                info!(addr = %addr, "Listening for incoming messages");
            }
            RelayEvent::AcceptFailed { error } => {
                error!(error = %error, "Failed to accept connection");
            }
            RelayEvent::Connected { id, addr } => {
                info!(conn = %id, peer = %addr, "Client connected");
            }
            RelayEvent::Disconnected { id, addr, reason } => {
                info!(conn = %id, peer = %addr, reason = %reason, "Client disconnected");
            }
            RelayEvent::TextRelayed {
                from,
                text,
                delivered,
                failed,
            } => {
                info!(conn = %from, delivered, failed, "Received: {text}");
            }
            RelayEvent::SendFailed { to, error } => {
                warn!(conn = %to, error = %error, "Error sending message");
            }
            RelayEvent::TransferStarted {
                from,
                name,
                size,
                path,
            } => {
                debug!(
                    conn = %from,
                    file = %name,
                    size,
                    path = %path.display(),
                    "Receiving file"
                );
            }
            RelayEvent::TransferCompleted {
                from,
                name,
                size,
                path,
            } => {
                info!(
                    conn = %from,
                    size,
                    path = %path.display(),
                    "File {name} received successfully"
                );
            }
            RelayEvent::TransferIncomplete {
                from,
                name,
                expected,
                received,
                path,
            } => {
                warn!(
                    conn = %from,
                    file = %name,
                    expected,
                    received,
                    path = %path.display(),
                    "File transfer ended early, partial file left on disk"
                );
            }
            RelayEvent::Stopped => {
                info!("Relay stopped accepting connections");
            }
        }
    }
}

/// Forwards events into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<RelayEvent>,
}

impl ChannelSink {
    /// Creates a sink and the receiver that observes its events.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RelayEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: RelayEvent) {
        // Receiver dropped means nobody is watching any more
        let _ = self.sender.send(event);
    }
}
