//! Chunked reads with push-back.
//!
//! Text messages are delimited only by read boundaries, so the session works
//! in chunks rather than lines. When a read carries more than one logical
//! message (a file header followed by body bytes, or a body followed by the
//! next message), the unused tail is pushed back and served before the
//! socket is read again.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};

use relay_protocol::READ_CHUNK_SIZE;

/// Reader that hands out chunks and accepts unconsumed bytes back.
pub struct ChunkReader<R> {
    inner: R,
    pending: Vec<u8>,
    chunk_size: usize,
}

impl<R: AsyncRead + Unpin> ChunkReader<R> {
    /// Wraps a reader using the protocol's default chunk size.
    pub fn new(inner: R) -> Self {
        Self::with_chunk_size(inner, READ_CHUNK_SIZE)
    }

    /// Wraps a reader with an explicit maximum chunk size.
    pub fn with_chunk_size(inner: R, chunk_size: usize) -> Self {
        Self {
            inner,
            pending: Vec::new(),
            chunk_size: chunk_size.max(1),
        }
    }

    /// Returns the next chunk, or `None` at end of stream.
    ///
    /// Pushed-back bytes are returned whole before the underlying reader is
    /// touched.
    pub async fn next_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        if !self.pending.is_empty() {
            return Ok(Some(std::mem::take(&mut self.pending)));
        }

        let mut buf = vec![0u8; self.chunk_size];
        let n = self.inner.read(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some(buf))
    }

    /// Returns at most `max` bytes. An empty result means end of stream.
    ///
    /// Never reads more than `max` bytes from the underlying reader, so the
    /// stream stays positioned right after the requested region.
    pub async fn read_at_most(&mut self, max: usize) -> io::Result<Vec<u8>> {
        if max == 0 {
            return Ok(Vec::new());
        }

        if !self.pending.is_empty() {
            let take = max.min(self.pending.len());
            let rest = self.pending.split_off(take);
            return Ok(std::mem::replace(&mut self.pending, rest));
        }

        let mut buf = vec![0u8; max.min(self.chunk_size)];
        let n = self.inner.read(&mut buf).await?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Pushes bytes back to be returned before anything else.
    pub fn unread(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let mut pending = Vec::with_capacity(bytes.len() + self.pending.len());
        pending.extend_from_slice(bytes);
        pending.append(&mut self.pending);
        self.pending = pending;
    }

    /// Number of pushed-back bytes waiting to be read.
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_next_chunk_reads_until_eof() {
        let mut reader = ChunkReader::with_chunk_size(&b"abcdef"[..], 4);
        assert_eq!(reader.next_chunk().await.unwrap(), Some(b"abcd".to_vec()));
        assert_eq!(reader.next_chunk().await.unwrap(), Some(b"ef".to_vec()));
        assert_eq!(reader.next_chunk().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unread_is_served_first() {
        let mut reader = ChunkReader::new(&b"tail"[..]);
        reader.unread(b"head");
        assert_eq!(reader.buffered(), 4);
        assert_eq!(reader.next_chunk().await.unwrap(), Some(b"head".to_vec()));
        assert_eq!(reader.next_chunk().await.unwrap(), Some(b"tail".to_vec()));
    }

    #[tokio::test]
    async fn test_read_at_most_respects_limit() {
        let mut reader = ChunkReader::new(&b"0123456789"[..]);
        assert_eq!(reader.read_at_most(3).await.unwrap(), b"012");
        assert_eq!(reader.next_chunk().await.unwrap(), Some(b"3456789".to_vec()));
    }

    #[tokio::test]
    async fn test_read_at_most_splits_pending() {
        let mut reader = ChunkReader::new(&b""[..]);
        reader.unread(b"bodynext");
        assert_eq!(reader.read_at_most(4).await.unwrap(), b"body");
        assert_eq!(reader.buffered(), 4);
        assert_eq!(reader.next_chunk().await.unwrap(), Some(b"next".to_vec()));
        assert_eq!(reader.read_at_most(4).await.unwrap(), Vec::<u8>::new());
    }
}
