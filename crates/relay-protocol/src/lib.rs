//! Relay Protocol - Wire format for the relay chat server
//!
//! The protocol has no framing layer of its own. Every read from a peer is
//! classified as either a plain text line or a file header, and a file header
//! is followed by exactly the declared number of raw bytes on the same stream.
//!
//! ```text
//! text:  <utf-8 bytes>
//! file:  FILE:<basename>:<byte-count><raw bytes ...>
//! ```

pub mod error;
pub mod header;
pub mod message;

pub use error::ProtocolError;
pub use header::{FileHeader, FILE_HEADER_PREFIX};
pub use message::{classify, frame_line, Classified, Message};

/// Default TCP port the relay listens on.
pub const DEFAULT_PORT: u16 = 5555;

/// Size of a single socket read, on both server and client side.
pub const READ_CHUNK_SIZE: usize = 1024;

/// Text line sent to the remaining peers when a client leaves.
pub const DISCONNECT_NOTICE: &str = "Client disconnected.";
