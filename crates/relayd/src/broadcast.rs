//! Fan-out of text lines to every client except the sender.

use std::sync::Arc;

use relay_protocol::frame_line;

use crate::events::{RelayEvent, SharedSink};
use crate::registry::{ClientRegistry, ConnectionId};

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Peers the line was written to.
    pub delivered: usize,

    /// Peers whose write failed.
    pub failed: usize,
}

/// Delivers text lines to a snapshot of the registry.
///
/// A failed write to one peer is reported and skipped. The peer stays
/// registered: its own session removes it when its read side fails.
#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<ClientRegistry>,
    events: SharedSink,
}

impl Broadcaster {
    /// Creates a broadcaster over a shared registry.
    pub fn new(registry: Arc<ClientRegistry>, events: SharedSink) -> Self {
        Self { registry, events }
    }

    /// Sends `text` plus a newline to every peer except `sender`.
    ///
    /// `sender` is `None` for server-originated notices. Peers that join
    /// after the snapshot is taken do not receive this line.
    pub async fn broadcast(&self, sender: Option<ConnectionId>, text: &str) -> BroadcastReport {
        let line = frame_line(text);
        let peers = self.registry.snapshot_except(sender).await;
        let mut report = BroadcastReport::default();

        for peer in peers {
            match peer.send(&line).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    self.events.emit(RelayEvent::SendFailed {
                        to: peer.id(),
                        error: e.to_string(),
                    });
                }
            }
        }

        report
    }
}
