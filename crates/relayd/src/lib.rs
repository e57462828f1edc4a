//! Relay Daemon - TCP chat relay with in-band file transfer
//!
//! This crate provides the server side of the relay:
//! - `registry` - Thread-safe set of connected clients
//! - `broadcast` - Fan-out of text lines to every client but the sender
//! - `transfer` - Receiving `FILE:` bodies into the download directory
//! - `server` - Accept loop and per-connection sessions
//! - `events` - Structured events emitted by all of the above
//! - `config` - Daemon configuration
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         relayd                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │  RelayServer    │────▶│     ClientRegistry          │   │
//! │  │ (TcpListener)   │     │  (peer write halves)        │   │
//! │  └────────┬────────┘     └──────────────┬──────────────┘   │
//! │           │                             │ snapshot          │
//! │           │ spawn per client            ▼                   │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │ConnectionSession│────▶│       Broadcaster           │   │
//! │  │  (read half)    │     │                             │   │
//! │  └────────┬────────┘     └─────────────────────────────┘   │
//! │           │ FILE:                                           │
//! │           ▼                                                 │
//! │  ┌─────────────────────────────┐                           │
//! │  │   FileTransferReceiver      │                           │
//! │  └─────────────────────────────┘                           │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Production code has no `.unwrap()`, `.expect()` or `panic!()`. Errors
//! on one connection end that connection and nothing else.

pub mod broadcast;
pub mod config;
pub mod events;
pub mod registry;
pub mod server;
pub mod stream;
pub mod transfer;

pub use broadcast::{BroadcastReport, Broadcaster};
pub use config::{ConfigError, RelayConfig};
pub use events::{ChannelSink, CloseReason, EventSink, RelayEvent, SharedSink, TracingSink};
pub use registry::{ClientRegistry, ConnectionId, Peer, PeerHandle};
pub use server::{ConnectionSession, RelayServer, ServerError};
pub use transfer::{FileTransferReceiver, TransferError, TransferOutcome};
