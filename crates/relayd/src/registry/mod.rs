//! Thread-safe set of connected clients.
//!
//! The registry is shared by the accept loop (which adds peers), every
//! session (which removes itself on exit) and the broadcaster (which reads
//! snapshots). Its single lock is only ever held for map operations; closing
//! a removed peer and writing to snapshot members happen after release.
//!
//! A peer that is present while the lock is held may close immediately
//! afterwards. Send failures are the authoritative liveness signal.

mod peer;

pub use peer::{ConnectionId, Peer, PeerHandle, PeerWriter};

use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::debug;

/// Set of live connections, unique by [`ConnectionId`].
#[derive(Default)]
pub struct ClientRegistry {
    peers: Mutex<HashMap<ConnectionId, PeerHandle>>,
}

impl ClientRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a peer if no peer with the same id is present.
    ///
    /// Returns `true` if the peer was inserted.
    pub async fn add(&self, peer: PeerHandle) -> bool {
        let id = peer.id();
        let mut peers = self.peers.lock().await;
        if peers.contains_key(&id) {
            return false;
        }
        peers.insert(id, peer);
        debug!(conn = %id, clients = peers.len(), "Registered client");
        true
    }

    /// Removes a peer and closes its stream.
    ///
    /// Safe to call for an id that is absent or already removed. Returns
    /// `true` only for the call that actually removed the peer.
    pub async fn remove(&self, id: ConnectionId) -> bool {
        let removed = {
            let mut peers = self.peers.lock().await;
            peers.remove(&id)
        };

        match removed {
            Some(peer) => {
                peer.close().await;
                debug!(conn = %id, "Removed client");
                true
            }
            None => false,
        }
    }

    /// Returns every peer except `excluded`, as of one point in time.
    ///
    /// Peers added after the snapshot is taken are not included.
    pub async fn snapshot_except(&self, excluded: Option<ConnectionId>) -> Vec<PeerHandle> {
        let peers = self.peers.lock().await;
        peers
            .values()
            .filter(|peer| Some(peer.id()) != excluded)
            .cloned()
            .collect()
    }

    /// Returns whether a peer with this id is registered.
    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.peers.lock().await.contains_key(&id)
    }

    /// Returns the number of registered peers.
    pub async fn len(&self) -> usize {
        self.peers.lock().await.len()
    }

    /// Returns whether no peers are registered.
    pub async fn is_empty(&self) -> bool {
        self.peers.lock().await.is_empty()
    }
}
