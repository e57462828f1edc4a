//! `FILE:<name>:<size>` header parsing and encoding.

use std::fmt;

use crate::ProtocolError;

/// Prefix that marks a read as the start of a file transfer.
pub const FILE_HEADER_PREFIX: &[u8] = b"FILE:";

/// Header announcing a file transfer.
///
/// The header is followed on the same stream by exactly `size` raw bytes.
/// There is no terminator: the header ends at the last digit of the size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    /// Base name of the file as declared by the sender.
    pub name: String,

    /// Number of body bytes that follow the header.
    pub size: u64,
}

impl FileHeader {
    /// Creates a header after validating the file name.
    pub fn new(name: impl Into<String>, size: u64) -> Result<Self, ProtocolError> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self { name, size })
    }

    /// Parses a header at the start of `buf`.
    ///
    /// Returns the header and the number of bytes of `buf` it occupies. Any
    /// bytes after that belong to the file body.
    ///
    /// The filename runs up to the first `:` after the prefix, so names
    /// containing `:` cannot be sent.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), ProtocolError> {
        let rest = buf
            .strip_prefix(FILE_HEADER_PREFIX)
            .ok_or(ProtocolError::NotAFileHeader)?;

        let separator = rest
            .iter()
            .position(|&b| b == b':')
            .ok_or(ProtocolError::MissingSize)?;
        let name_bytes = rest.get(..separator).unwrap_or_default();
        let size_region = rest.get(separator + 1..).unwrap_or_default();

        let name = std::str::from_utf8(name_bytes)
            .map_err(|_| {
                ProtocolError::InvalidFileName(String::from_utf8_lossy(name_bytes).into_owned())
            })?
            .to_string();
        validate_name(&name)?;

        let digits = size_region
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
        let size_text = std::str::from_utf8(size_region.get(..digits).unwrap_or_default())
            .unwrap_or_default();
        if size_text.is_empty() {
            let shown: String = String::from_utf8_lossy(size_region).chars().take(32).collect();
            return Err(ProtocolError::InvalidSize(shown));
        }
        let size = size_text
            .parse::<u64>()
            .map_err(|_| ProtocolError::InvalidSize(size_text.to_string()))?;

        let consumed = FILE_HEADER_PREFIX.len() + separator + 1 + digits;
        Ok((Self { name, size }, consumed))
    }

    /// Encodes the header exactly as it goes on the wire.
    pub fn encode(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for FileHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FILE:{}:{}", self.name, self.size)
    }
}

/// Rejects names that are empty or could resolve outside a flat directory.
fn validate_name(name: &str) -> Result<(), ProtocolError> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(&['/', '\\', '\0', ':'][..]);

    if invalid {
        return Err(ProtocolError::InvalidFileName(name.to_string()));
    }
    Ok(())
}
