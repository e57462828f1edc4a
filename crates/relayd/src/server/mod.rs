//! TCP accept loop for the relay.
//!
//! The server:
//! - Binds one listening socket with `SO_REUSEADDR` and a small backlog
//! - Registers each accepted client in the [`ClientRegistry`]
//! - Spawns a [`ConnectionSession`] task per client
//! - Stops accepting when its `CancellationToken` is triggered
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   RelayServer   │
//! │                 │
//! │   TcpListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ConnectionSession│────▶│ ClientRegistry  │
//! │   (per client)  │     │                 │
//! └───────┬─────────┘     └─────────────────┘
//!         │
//!         ├── text ──▶ Broadcaster ──▶ other clients
//!         └── FILE ──▶ FileTransferReceiver ──▶ download dir
//! ```
//!
//! Sessions are never cancelled by the server. A session ends only when its
//! client disconnects, errors, or violates the protocol.

mod session;

pub use session::ConnectionSession;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::RelayConfig;
use crate::events::{RelayEvent, SharedSink};
use crate::registry::{ClientRegistry, ConnectionId, Peer};
use crate::transfer::FileTransferReceiver;

/// Listen backlog used when none is configured.
pub const DEFAULT_BACKLOG: u32 = 5;

/// Relay server: accept loop plus shared relay state.
pub struct RelayServer {
    listener: TcpListener,
    registry: Arc<ClientRegistry>,
    receiver: Arc<FileTransferReceiver>,
    events: SharedSink,
    cancel_token: CancellationToken,
    connection_counter: AtomicU64,
}

impl RelayServer {
    /// Binds the listening socket and prepares the download directory.
    ///
    /// # Errors
    ///
    /// - `ServerError::DownloadDir` if the download directory cannot be created
    /// - `ServerError::Bind` if the address cannot be bound or listened on
    pub async fn bind(
        config: &RelayConfig,
        events: SharedSink,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        tokio::fs::create_dir_all(&config.download_dir)
            .await
            .map_err(|e| ServerError::DownloadDir {
                path: config.download_dir.clone(),
                error: e.to_string(),
            })?;

        let listener = listen(config.listen, config.backlog).map_err(|e| ServerError::Bind {
            addr: config.listen,
            error: e.to_string(),
        })?;

        let server = Self {
            listener,
            registry: Arc::new(ClientRegistry::new()),
            receiver: Arc::new(FileTransferReceiver::new(
                config.download_dir.clone(),
                config.file_prefix.clone(),
            )),
            events,
            cancel_token,
            connection_counter: AtomicU64::new(1),
        };

        server.events.emit(RelayEvent::Listening {
            addr: server.local_addr()?,
        });
        Ok(server)
    }

    /// Returns the bound address (useful when binding port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener
            .local_addr()
            .map_err(|e| ServerError::LocalAddr(e.to_string()))
    }

    /// Returns a handle to the client registry.
    pub fn registry(&self) -> Arc<ClientRegistry> {
        Arc::clone(&self.registry)
    }

    /// Accepts connections until the cancellation token is triggered.
    ///
    /// Accept errors are reported and do not stop the loop.
    pub async fn run(self) -> Result<(), ServerError> {
        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    debug!("Server shutdown requested");
                    break;
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, addr)) => self.handle_connection(stream, addr).await,
                        Err(e) => self.events.emit(RelayEvent::AcceptFailed {
                            error: e.to_string(),
                        }),
                    }
                }
            }
        }

        self.events.emit(RelayEvent::Stopped);
        Ok(())
    }

    /// Registers a new client and spawns its session.
    async fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let id = ConnectionId::new(self.connection_counter.fetch_add(1, Ordering::Relaxed));
        let (reader, writer) = stream.into_split();

        self.registry
            .add(Arc::new(Peer::new(id, addr, writer)))
            .await;
        self.events.emit(RelayEvent::Connected { id, addr });

        let session = ConnectionSession::new(
            id,
            addr,
            reader,
            Arc::clone(&self.registry),
            Arc::clone(&self.receiver),
            Arc::clone(&self.events),
        );

        tokio::spawn(async move {
            let reason = session.run().await;
            debug!(conn = %id, reason = %reason, "Session finished");
        });
    }
}

/// Creates a listening socket with address reuse and an explicit backlog.
fn listen(addr: SocketAddr, backlog: u32) -> std::io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(backlog)
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {error}")]
    Bind { addr: SocketAddr, error: String },

    #[error("Failed to create download directory {}: {error}", .path.display())]
    DownloadDir { path: PathBuf, error: String },

    #[error("Failed to read local address: {0}")]
    LocalAddr(String),
}
