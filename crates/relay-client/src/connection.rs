//! Connection to the relay server.
//!
//! Outgoing text is written raw, one write per message. Files are sent as a
//! `FILE:<name>:<size>` header write followed by the body in fixed-size
//! chunks. Incoming data is newline-terminated lines.

use std::net::SocketAddr;
use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, info};

use relay_protocol::{FileHeader, FILE_HEADER_PREFIX, READ_CHUNK_SIZE};

use crate::error::{ClientError, Result};

/// An open connection to the relay.
pub struct RelayConnection {
    incoming: Incoming,
    outgoing: Outgoing,
}

/// Connects to the relay at `addr`.
pub async fn connect(addr: SocketAddr) -> Result<RelayConnection> {
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|e| ClientError::Connect {
            addr,
            error: e.to_string(),
        })?;
    info!(server = %addr, "Connected to relay");

    let (reader, writer) = stream.into_split();
    Ok(RelayConnection {
        incoming: Incoming {
            reader: BufReader::new(reader),
        },
        outgoing: Outgoing { writer },
    })
}

impl RelayConnection {
    /// Splits the connection so reading and writing can run concurrently.
    pub fn into_split(self) -> (Incoming, Outgoing) {
        (self.incoming, self.outgoing)
    }
}

/// Sending half of a relay connection.
pub struct Outgoing {
    writer: OwnedWriteHalf,
}

impl Outgoing {
    /// Sends one chat line.
    ///
    /// Text starting with `FILE:` is refused, since the server would treat
    /// it as a file header.
    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        if text.as_bytes().starts_with(FILE_HEADER_PREFIX) {
            return Err(ClientError::ReservedPrefix);
        }
        self.write(text.as_bytes()).await
    }

    /// Sends a local file. Returns the number of body bytes sent.
    pub async fn send_file(&mut self, path: &Path) -> Result<u64> {
        let file_error = |e: std::io::Error| ClientError::File {
            path: path.to_path_buf(),
            error: e.to_string(),
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file = File::open(path).await.map_err(file_error)?;
        let size = file.metadata().await.map_err(file_error)?.len();
        let header = FileHeader::new(name, size)?;

        let sent = self.send_body(&header, file).await?;
        info!(file = %header.name, bytes = sent, "File sent");
        Ok(sent)
    }

    /// Writes a header and then exactly `header.size` bytes from `body`.
    ///
    /// The header has no terminator. If the server reads the header and the
    /// start of a body beginning with digits in one chunk, it takes those
    /// digits as part of the size.
    pub async fn send_body<R>(&mut self, header: &FileHeader, body: R) -> Result<u64>
    where
        R: AsyncRead + Unpin,
    {
        self.write(&header.encode()).await?;

        let mut body = body.take(header.size);
        let mut buf = vec![0u8; READ_CHUNK_SIZE];
        let mut sent: u64 = 0;
        loop {
            let n = body.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            self.writer.write_all(buf.get(..n).unwrap_or_default()).await?;
            sent += n as u64;
        }
        self.writer.flush().await?;

        if sent < header.size {
            debug!(expected = header.size, sent, "File shrank while sending");
        }
        Ok(sent)
    }

    /// Closes the sending direction.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

/// Receiving half of a relay connection.
pub struct Incoming {
    reader: BufReader<OwnedReadHalf>,
}

impl Incoming {
    /// Reads the next line from the server, without its terminator.
    ///
    /// Returns `None` once the server closes the connection.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        let mut buf = Vec::new();
        let n = self.reader.read_until(b'\n', &mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&buf);
        Ok(Some(line.trim_end_matches(&['\n', '\r'][..]).to_string()))
    }
}
