//! Per-connection receive loop.
//!
//! Each accepted client gets one `ConnectionSession` that:
//! - Reads raw chunks from the client
//! - Classifies each chunk as a text line or a file header
//! - Broadcasts text to the other clients
//! - Hands file bodies to the [`FileTransferReceiver`]
//! - On exit, deregisters the client and announces the disconnect
//!
//! ```text
//!                  text ──▶ broadcast ──┐
//!                 ▲                     │
//! AwaitingMessage ◀─────────────────────┘
//!        │    ▲
//!   FILE:│    │ body complete
//!        ▼    │
//!   ReceivingFile
//!        │
//!        ▼ EOF / error / bad header / short body
//!     Closed
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::AsyncRead;
use tracing::debug;

use relay_protocol::{classify, FileHeader, Message, DISCONNECT_NOTICE};

use crate::broadcast::Broadcaster;
use crate::events::{CloseReason, RelayEvent, SharedSink};
use crate::registry::{ClientRegistry, ConnectionId};
use crate::stream::ChunkReader;
use crate::transfer::{FileTransferReceiver, TransferError};

/// Receive state of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionState {
    AwaitingMessage,
    ReceivingFile(FileHeader),
    Closed(CloseReason),
}

/// Receive loop for a single client connection.
pub struct ConnectionSession<R> {
    id: ConnectionId,
    addr: SocketAddr,
    reader: ChunkReader<R>,
    registry: Arc<ClientRegistry>,
    broadcaster: Broadcaster,
    receiver: Arc<FileTransferReceiver>,
    events: SharedSink,
}

impl<R: AsyncRead + Unpin> ConnectionSession<R> {
    /// Creates a session for a client that is already registered.
    pub fn new(
        id: ConnectionId,
        addr: SocketAddr,
        reader: R,
        registry: Arc<ClientRegistry>,
        receiver: Arc<FileTransferReceiver>,
        events: SharedSink,
    ) -> Self {
        let broadcaster = Broadcaster::new(Arc::clone(&registry), Arc::clone(&events));
        Self {
            id,
            addr,
            reader: ChunkReader::new(reader),
            registry,
            broadcaster,
            receiver,
            events,
        }
    }

    /// Runs until the client goes away, then cleans up.
    ///
    /// Returns the reason the session closed.
    pub async fn run(mut self) -> CloseReason {
        debug!(conn = %self.id, peer = %self.addr, "Session started");

        let mut state = SessionState::AwaitingMessage;
        let reason = loop {
            state = match state {
                SessionState::AwaitingMessage => self.await_message().await,
                SessionState::ReceivingFile(header) => self.receive_file(header).await,
                SessionState::Closed(reason) => break reason,
            };
        };

        self.close(&reason).await;
        reason
    }

    async fn await_message(&mut self) -> SessionState {
        let chunk = match self.reader.next_chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => return SessionState::Closed(CloseReason::PeerClosed),
            Err(e) => return SessionState::Closed(CloseReason::Io(e.to_string())),
        };

        let classified = match classify(&chunk) {
            Ok(classified) => classified,
            Err(e) => return SessionState::Closed(CloseReason::Protocol(e.to_string())),
        };

        match classified.message {
            Message::Text(text) => {
                let report = self.broadcaster.broadcast(Some(self.id), &text).await;
                self.events.emit(RelayEvent::TextRelayed {
                    from: self.id,
                    text,
                    delivered: report.delivered,
                    failed: report.failed,
                });
                SessionState::AwaitingMessage
            }
            Message::FileHeader(header) => {
                self.reader
                    .unread(chunk.get(classified.consumed..).unwrap_or_default());
                SessionState::ReceivingFile(header)
            }
        }
    }

    async fn receive_file(&mut self, header: FileHeader) -> SessionState {
        let path = self.receiver.destination(&header);
        self.events.emit(RelayEvent::TransferStarted {
            from: self.id,
            name: header.name.clone(),
            size: header.size,
            path: path.clone(),
        });

        match self.receiver.receive(&mut self.reader, &header).await {
            Ok(outcome) => {
                self.events.emit(RelayEvent::TransferCompleted {
                    from: self.id,
                    name: header.name,
                    size: outcome.bytes,
                    path: outcome.path,
                });
                SessionState::AwaitingMessage
            }
            Err(TransferError::Sink { path, source }) => SessionState::Closed(CloseReason::Sink(
                format!("{}: {source}", path.display()),
            )),
            Err(e) => {
                let (expected, received) = e.shortfall().unwrap_or((header.size, 0));
                self.events.emit(RelayEvent::TransferIncomplete {
                    from: self.id,
                    name: header.name,
                    expected,
                    received,
                    path,
                });
                SessionState::Closed(CloseReason::ShortTransfer { expected, received })
            }
        }
    }

    /// Deregisters this client and tells everyone else it left.
    ///
    /// Only the call that actually removes the client sends the notice.
    async fn close(&self, reason: &CloseReason) {
        if !self.registry.remove(self.id).await {
            debug!(conn = %self.id, "Session closed for already-removed client");
            return;
        }

        self.events.emit(RelayEvent::Disconnected {
            id: self.id,
            addr: self.addr,
            reason: reason.clone(),
        });
        self.broadcaster.broadcast(None, DISCONNECT_NOTICE).await;
    }
}
