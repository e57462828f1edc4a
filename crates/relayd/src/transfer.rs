//! Receiving file bodies into the download directory.
//!
//! A transfer consumes exactly the declared number of bytes from the
//! connection, whatever the sender's chunking, and leaves the stream
//! positioned at the next message. A transfer cut short by the peer leaves
//! the partial file where it is.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWriteExt};

use relay_protocol::FileHeader;

use crate::stream::ChunkReader;

/// Prefix prepended to received file names by default.
pub const DEFAULT_FILE_PREFIX: &str = "received_";

/// A finished transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    /// Where the file was written.
    pub path: PathBuf,

    /// Bytes written, equal to the declared size.
    pub bytes: u64,
}

/// Errors that end a file transfer.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Peer closed the stream before the declared size was reached.
    #[error("Connection closed after {received} of {expected} bytes of {}", .path.display())]
    Short {
        path: PathBuf,
        expected: u64,
        received: u64,
    },

    /// Reading from the peer failed before the declared size was reached.
    #[error("Read failed after {received} of {expected} bytes of {}: {source}", .path.display())]
    Interrupted {
        path: PathBuf,
        expected: u64,
        received: u64,
        #[source]
        source: io::Error,
    },

    /// The destination file could not be created or written.
    #[error("Failed to write {}: {source}", .path.display())]
    Sink {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl TransferError {
    /// Returns `(expected, received)` when the peer stopped sending early.
    pub fn shortfall(&self) -> Option<(u64, u64)> {
        match self {
            TransferError::Short {
                expected, received, ..
            }
            | TransferError::Interrupted {
                expected, received, ..
            } => Some((*expected, *received)),
            TransferError::Sink { .. } => None,
        }
    }
}

/// Writes file bodies announced by `FILE:` headers to disk.
#[derive(Debug, Clone)]
pub struct FileTransferReceiver {
    download_dir: PathBuf,
    prefix: String,
}

impl FileTransferReceiver {
    /// Creates a receiver writing `<download_dir>/<prefix><name>`.
    pub fn new(download_dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            download_dir: download_dir.into(),
            prefix: prefix.into(),
        }
    }

    /// Returns the directory files are written to.
    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Returns the destination path for a header.
    pub fn destination(&self, header: &FileHeader) -> PathBuf {
        self.download_dir
            .join(format!("{}{}", self.prefix, header.name))
    }

    /// Reads exactly `header.size` bytes from `reader` into the destination.
    ///
    /// An existing file at the destination is overwritten.
    pub async fn receive<R>(
        &self,
        reader: &mut ChunkReader<R>,
        header: &FileHeader,
    ) -> Result<TransferOutcome, TransferError>
    where
        R: AsyncRead + Unpin,
    {
        let path = self.destination(header);
        let mut file = File::create(&path)
            .await
            .map_err(|source| TransferError::Sink {
                path: path.clone(),
                source,
            })?;

        let expected = header.size;
        let mut received: u64 = 0;

        while received < expected {
            let remaining = usize::try_from(expected - received).unwrap_or(usize::MAX);
            let chunk = match reader.read_at_most(remaining).await {
                Ok(chunk) => chunk,
                Err(source) => {
                    finish(&mut file, &path).await?;
                    return Err(TransferError::Interrupted {
                        path,
                        expected,
                        received,
                        source,
                    });
                }
            };

            if chunk.is_empty() {
                finish(&mut file, &path).await?;
                return Err(TransferError::Short {
                    path,
                    expected,
                    received,
                });
            }

            file.write_all(&chunk)
                .await
                .map_err(|source| TransferError::Sink {
                    path: path.clone(),
                    source,
                })?;
            received += chunk.len() as u64;
        }

        finish(&mut file, &path).await?;
        Ok(TransferOutcome {
            path,
            bytes: received,
        })
    }
}

/// Flushes pending writes so the file on disk reflects every byte received.
async fn finish(file: &mut File, path: &Path) -> Result<(), TransferError> {
    file.flush().await.map_err(|source| TransferError::Sink {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(name: &str, size: u64) -> FileHeader {
        FileHeader::new(name, size).unwrap()
    }

    #[tokio::test]
    async fn test_destination_uses_prefix() {
        let receiver = FileTransferReceiver::new("/srv/files", DEFAULT_FILE_PREFIX);
        assert_eq!(
            receiver.destination(&header("cat.png", 1)),
            PathBuf::from("/srv/files/received_cat.png")
        );
    }

    #[tokio::test]
    async fn test_receive_exact_bytes_and_leave_rest() {
        let dir = tempfile::tempdir().unwrap();
        let receiver = FileTransferReceiver::new(dir.path(), DEFAULT_FILE_PREFIX);
        let mut reader = ChunkReader::new(&b"hello world"[..]);

        let outcome = receiver
            .receive(&mut reader, &header("greeting.txt", 5))
            .await
            .unwrap();

        assert_eq!(outcome.bytes, 5);
        assert_eq!(std::fs::read(&outcome.path).unwrap(), b"hello");
        assert_eq!(
            reader.next_chunk().await.unwrap(),
            Some(b" world".to_vec())
        );
    }

    #[tokio::test]
    async fn test_receive_consumes_pushed_back_body_first() {
        let dir = tempfile::tempdir().unwrap();
        let receiver = FileTransferReceiver::new(dir.path(), DEFAULT_FILE_PREFIX);
        let mut reader = ChunkReader::new(&b"lo"[..]);
        reader.unread(b"hel");

        let outcome = receiver
            .receive(&mut reader, &header("h.txt", 5))
            .await
            .unwrap();

        assert_eq!(std::fs::read(&outcome.path).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_receive_one_byte_sends() {
        let dir = tempfile::tempdir().unwrap();
        let receiver = FileTransferReceiver::new(dir.path(), DEFAULT_FILE_PREFIX);
        let (mut tx, rx) = tokio::io::duplex(1);
        let body: Vec<u8> = (0..=255u8).collect();

        let sent = body.clone();
        let writer = tokio::spawn(async move {
            for byte in sent {
                tx.write_all(&[byte]).await.unwrap();
            }
        });

        let mut reader = ChunkReader::new(rx);
        let outcome = receiver
            .receive(&mut reader, &header("bytes.bin", body.len() as u64))
            .await
            .unwrap();
        writer.await.unwrap();

        assert_eq!(std::fs::read(&outcome.path).unwrap(), body);
    }

    #[tokio::test]
    async fn test_zero_size_creates_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let receiver = FileTransferReceiver::new(dir.path(), DEFAULT_FILE_PREFIX);
        let mut reader = ChunkReader::new(&b"next message"[..]);

        let outcome = receiver
            .receive(&mut reader, &header("empty", 0))
            .await
            .unwrap();

        assert_eq!(std::fs::read(&outcome.path).unwrap(), b"");
        assert_eq!(
            reader.next_chunk().await.unwrap(),
            Some(b"next message".to_vec())
        );
    }

    #[tokio::test]
    async fn test_short_transfer_keeps_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let receiver = FileTransferReceiver::new(dir.path(), DEFAULT_FILE_PREFIX);
        let mut reader = ChunkReader::new(&b"abc"[..]);

        let err = receiver
            .receive(&mut reader, &header("partial.bin", 10))
            .await
            .unwrap_err();

        assert_eq!(err.shortfall(), Some((10, 3)));
        let partial = dir.path().join("received_partial.bin");
        assert_eq!(std::fs::read(partial).unwrap(), b"abc");
    }

    #[tokio::test]
    async fn test_missing_download_dir_is_sink_error() {
        let dir = tempfile::tempdir().unwrap();
        let receiver = FileTransferReceiver::new(dir.path().join("missing"), DEFAULT_FILE_PREFIX);
        let mut reader = ChunkReader::new(&b"abc"[..]);

        let err = receiver
            .receive(&mut reader, &header("x", 3))
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::Sink { .. }));
        assert_eq!(err.shortfall(), None);
    }
}
