//! A registered connection: identity plus the shared write half.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::debug;

/// Opaque identity of a connection, unique for the lifetime of the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates an identifier from a connection number.
    pub const fn new(number: u64) -> Self {
        Self(number)
    }

    /// Returns the underlying connection number.
    pub const fn number(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Boxed write half of a peer's stream.
pub type PeerWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Shared handle to a peer, as held by the registry and broadcast snapshots.
pub type PeerHandle = Arc<Peer>;

/// Write side of one client connection.
///
/// The read side is owned by the connection's session. Writes are serialized
/// through a per-peer lock so concurrent broadcasts never interleave bytes.
pub struct Peer {
    id: ConnectionId,
    addr: SocketAddr,
    writer: Mutex<PeerWriter>,
}

impl Peer {
    /// Wraps the write half of a connection.
    pub fn new<W>(id: ConnectionId, addr: SocketAddr, writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            id,
            addr,
            writer: Mutex::new(Box::new(writer)),
        }
    }

    /// Returns the connection identity.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the remote address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Writes `bytes` to the peer and flushes.
    pub async fn send(&self, bytes: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(bytes).await?;
        writer.flush().await
    }

    /// Shuts down the write half. Errors are logged, not returned: the
    /// connection is being discarded either way.
    pub async fn close(&self) {
        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.shutdown().await {
            debug!(conn = %self.id, error = %e, "Error shutting down peer stream");
        }
    }
}

impl fmt::Debug for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Peer")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .finish_non_exhaustive()
    }
}
