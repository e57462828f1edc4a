//! Classification of raw reads into protocol messages.

use crate::{FileHeader, ProtocolError, FILE_HEADER_PREFIX};

/// A logical message received from a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// One chat line, surrounding whitespace removed.
    Text(String),

    /// Start of a file transfer; the body follows on the stream.
    FileHeader(FileHeader),
}

/// Result of classifying a chunk of bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    /// The parsed message.
    pub message: Message,

    /// How many bytes of the chunk the message occupies. For a file header,
    /// bytes after this offset are the beginning of the file body.
    pub consumed: usize,
}

/// Classifies one read from a peer.
///
/// A chunk starting with `FILE:` must be a well-formed file header; anything
/// else is a text line. Invalid UTF-8 in text is replaced rather than
/// rejected.
pub fn classify(chunk: &[u8]) -> Result<Classified, ProtocolError> {
    if chunk.starts_with(FILE_HEADER_PREFIX) {
        let (header, consumed) = FileHeader::parse(chunk)?;
        return Ok(Classified {
            message: Message::FileHeader(header),
            consumed,
        });
    }

    let text = String::from_utf8_lossy(chunk).trim().to_string();
    Ok(Classified {
        message: Message::Text(text),
        consumed: chunk.len(),
    })
}

/// Encodes a text line for delivery to a peer.
pub fn frame_line(text: &str) -> Vec<u8> {
    let mut line = Vec::with_capacity(text.len() + 1);
    line.extend_from_slice(text.as_bytes());
    line.push(b'\n');
    line
}
