//! Integration tests for the relay server.
//!
//! These tests run a real `RelayServer` on an ephemeral localhost port and
//! drive it with raw TCP clients, checking broadcast delivery, sender
//! exclusion and disconnect propagation end to end.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use relay_protocol::DISCONNECT_NOTICE;
use relayd::{ChannelSink, ClientRegistry, RelayConfig, RelayEvent, RelayServer};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Constants
// ============================================================================

/// Maximum time to wait for anything the server is expected to do
const WAIT_TIMEOUT: Duration = Duration::from_secs(2);

/// How long to listen before concluding nothing was sent
const SILENCE_WINDOW: Duration = Duration::from_millis(150);

/// Interval between registry polls
const POLL_INTERVAL: Duration = Duration::from_millis(5);

// ============================================================================
// Test Helpers
// ============================================================================

struct TestServer {
    addr: SocketAddr,
    registry: Arc<ClientRegistry>,
    events: mpsc::UnboundedReceiver<RelayEvent>,
    cancel_token: CancellationToken,
    _temp_dir: TempDir,
}

impl TestServer {
    async fn spawn() -> Self {
        let temp_dir = tempfile::tempdir().expect("create temp dir");
        let config = RelayConfig {
            listen: "127.0.0.1:0".parse().unwrap(),
            download_dir: temp_dir.path().to_path_buf(),
            ..RelayConfig::default()
        };
        let (sink, events) = ChannelSink::channel();
        let cancel_token = CancellationToken::new();

        let server = RelayServer::bind(&config, Arc::new(sink), cancel_token.clone())
            .await
            .expect("bind relay server");
        let addr = server.local_addr().unwrap();
        let registry = server.registry();

        tokio::spawn(async move {
            let _ = server.run().await;
        });

        TestServer {
            addr,
            registry,
            events,
            cancel_token,
            _temp_dir: temp_dir,
        }
    }

    /// Connects a client and waits until the server has registered it.
    async fn connect(&self) -> TestClient {
        let before = self.registry.len().await;
        let stream = TcpStream::connect(self.addr).await.expect("connect");
        self.wait_for_clients(before + 1).await;
        TestClient::new(stream)
    }

    async fn wait_for_clients(&self, count: usize) {
        let start = tokio::time::Instant::now();
        while self.registry.len().await != count {
            assert!(
                start.elapsed() < WAIT_TIMEOUT,
                "registry never reached {count} clients"
            );
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Waits for the first event matching `pred`, skipping others.
    async fn wait_for_event<F>(&mut self, pred: F) -> RelayEvent
    where
        F: Fn(&RelayEvent) -> bool,
    {
        timeout(WAIT_TIMEOUT, async {
            loop {
                let event = self.events.recv().await.expect("event channel open");
                if pred(&event) {
                    return event;
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    fn shutdown(self) {
        self.cancel_token.cancel();
    }
}

struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    fn new(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    async fn send(&mut self, text: &str) {
        self.writer.write_all(text.as_bytes()).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    async fn recv_line(&mut self) -> String {
        let mut line = String::new();
        timeout(WAIT_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for line")
            .unwrap();
        line
    }

    async fn assert_silent(&mut self) {
        let mut line = String::new();
        let result = timeout(SILENCE_WINDOW, self.reader.read_line(&mut line)).await;
        assert!(result.is_err(), "expected no data, got {line:?}");
    }
}

fn notice() -> String {
    format!("{DISCONNECT_NOTICE}\n")
}

// ============================================================================
// Broadcast Tests
// ============================================================================

#[tokio::test]
async fn test_three_client_scenario() {
    let server = TestServer::spawn().await;
    let mut a = server.connect().await;
    let mut b = server.connect().await;
    let mut c = server.connect().await;

    a.send("hi").await;
    assert_eq!(b.recv_line().await, "hi\n");
    assert_eq!(c.recv_line().await, "hi\n");
    a.assert_silent().await;

    drop(b);
    assert_eq!(a.recv_line().await, notice());
    assert_eq!(c.recv_line().await, notice());
    server.wait_for_clients(2).await;

    a.send("still there?").await;
    assert_eq!(c.recv_line().await, "still there?\n");
    a.assert_silent().await;

    server.shutdown();
}

#[tokio::test]
async fn test_sender_never_receives_own_message() {
    let server = TestServer::spawn().await;
    let mut a = server.connect().await;
    let mut b = server.connect().await;

    b.send("from b").await;
    assert_eq!(a.recv_line().await, "from b\n");
    b.assert_silent().await;

    a.send("from a").await;
    assert_eq!(b.recv_line().await, "from a\n");
    a.assert_silent().await;

    server.shutdown();
}

#[tokio::test]
async fn test_first_message_is_plain_text() {
    let server = TestServer::spawn().await;
    let mut a = server.connect().await;
    let mut b = server.connect().await;

    // The join name is relayed like any other line
    a.send("alice").await;
    assert_eq!(b.recv_line().await, "alice\n");

    server.shutdown();
}

#[tokio::test]
async fn test_text_is_trimmed_before_relay() {
    let server = TestServer::spawn().await;
    let mut a = server.connect().await;
    let mut b = server.connect().await;

    a.send("  padded line \n").await;
    assert_eq!(b.recv_line().await, "padded line\n");

    server.shutdown();
}

#[tokio::test]
async fn test_lone_client_broadcasts_to_nobody() {
    let mut server = TestServer::spawn().await;
    let mut a = server.connect().await;

    a.send("anyone?").await;
    let event = server
        .wait_for_event(|e| matches!(e, RelayEvent::TextRelayed { .. }))
        .await;
    match event {
        RelayEvent::TextRelayed {
            text,
            delivered,
            failed,
            ..
        } => {
            assert_eq!(text, "anyone?");
            assert_eq!(delivered, 0);
            assert_eq!(failed, 0);
        }
        other => panic!("unexpected event {other:?}"),
    }
    a.assert_silent().await;

    server.shutdown();
}

#[tokio::test]
async fn test_late_joiner_receives_subsequent_messages() {
    let server = TestServer::spawn().await;
    let mut a = server.connect().await;
    let mut b = server.connect().await;

    a.send("before").await;
    assert_eq!(b.recv_line().await, "before\n");

    let mut late = server.connect().await;
    a.send("after").await;
    assert_eq!(b.recv_line().await, "after\n");
    assert_eq!(late.recv_line().await, "after\n");

    server.shutdown();
}

// ============================================================================
// Disconnect Tests
// ============================================================================

#[tokio::test]
async fn test_disconnect_is_announced_and_deregistered() {
    let mut server = TestServer::spawn().await;
    let mut a = server.connect().await;
    let b = server.connect().await;

    drop(b);

    assert_eq!(a.recv_line().await, notice());
    let event = server
        .wait_for_event(|e| matches!(e, RelayEvent::Disconnected { .. }))
        .await;
    match event {
        RelayEvent::Disconnected { reason, .. } => {
            assert_eq!(reason, relayd::CloseReason::PeerClosed);
        }
        other => panic!("unexpected event {other:?}"),
    }
    server.wait_for_clients(1).await;

    server.shutdown();
}

#[tokio::test]
async fn test_departed_client_absent_from_snapshots() {
    let server = TestServer::spawn().await;
    let mut a = server.connect().await;
    let b = server.connect().await;
    let _c = server.connect().await;

    drop(b);
    assert_eq!(a.recv_line().await, notice());
    server.wait_for_clients(2).await;

    let snapshot = server.registry.snapshot_except(None).await;
    assert_eq!(snapshot.len(), 2);

    server.shutdown();
}

#[tokio::test]
async fn test_rapid_connect_disconnect() {
    let server = TestServer::spawn().await;
    let mut watcher = server.connect().await;

    for _ in 0..10 {
        let client = TcpStream::connect(server.addr).await.unwrap();
        drop(client);
    }

    for _ in 0..10 {
        assert_eq!(watcher.recv_line().await, notice());
    }
    server.wait_for_clients(1).await;

    server.shutdown();
}

// ============================================================================
// Lifecycle Tests
// ============================================================================

#[tokio::test]
async fn test_shutdown_stops_accepting() {
    let mut server = TestServer::spawn().await;
    server.cancel_token.cancel();

    server
        .wait_for_event(|e| matches!(e, RelayEvent::Stopped))
        .await;

    let result = timeout(Duration::from_millis(500), TcpStream::connect(server.addr)).await;
    // Either refused outright or accepted by nobody and never registered
    if let Ok(Ok(_stream)) = result {
        sleep(SILENCE_WINDOW).await;
        assert!(server.registry.is_empty().await);
    }
}
