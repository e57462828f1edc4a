//! Protocol-level errors.

use thiserror::Error;

/// Errors raised while parsing data received from a peer.
///
/// Any of these is fatal to the session that produced it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Data does not start with the `FILE:` prefix.
    #[error("Not a file header")]
    NotAFileHeader,

    /// Header has no `:` separating the filename from the size.
    #[error("Malformed file header: missing size segment")]
    MissingSize,

    /// Size segment is empty, non-numeric or does not fit in 64 bits.
    #[error("Malformed file header: invalid size '{0}'")]
    InvalidSize(String),

    /// Filename is empty, not UTF-8, or would escape the download directory.
    #[error("Invalid file name: {0:?}")]
    InvalidFileName(String),
}
