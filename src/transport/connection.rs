//! Connection adapter over a caller-supplied byte stream.
//!
//! The crate never dials a socket itself: it receives a [`Connector`] that
//! produces something implementing [`Connection`] for a host and port. The
//! binary passes a plain TCP connector; tests pass in-memory duplex streams.
//!
//! [`PeerClient`] splits the stream so the receive loop can sit in a
//! blocking read without starving the handshake engine's writes. The
//! `connected` flag follows single-writer-per-transition discipline: only
//! `connect`/`reconnect` raise it, only loop-detected end-of-stream and
//! `close` lower it.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{ProtocolError, Result};

/// Capability required of the underlying byte stream.
pub trait Connection: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Connection for T {}

pub type BoxedConnection = Box<dyn Connection>;

/// Factory producing a fresh stream to `host:port`. Invoked once at
/// construction and again on every reconnect attempt.
pub type Connector =
    Box<dyn Fn(String, u16) -> BoxFuture<'static, io::Result<BoxedConnection>> + Send + Sync>;

/// Stateful wrapper around the peer stream.
pub struct PeerClient {
    host: String,
    port: u16,
    connector: Connector,
    reader: Mutex<Option<ReadHalf<BoxedConnection>>>,
    writer: Mutex<Option<WriteHalf<BoxedConnection>>>,
    connected: AtomicBool,
}

impl PeerClient {
    /// Dials the peer once via `connector` and returns the connected client.
    pub async fn connect(host: impl Into<String>, port: u16, connector: Connector) -> Result<Self> {
        let client = Self {
            host: host.into(),
            port,
            connector,
            reader: Mutex::new(None),
            writer: Mutex::new(None),
            connected: AtomicBool::new(false),
        };
        client.reconnect().await?;
        Ok(client)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// One synchronous dial attempt, replacing both stream halves on
    /// success. No backoff here; the receive loop decides when to call this
    /// again.
    pub async fn reconnect(&self) -> Result<()> {
        debug!(host = %self.host, port = self.port, "connecting to node");
        let stream = (self.connector)(self.host.clone(), self.port).await?;
        let (read_half, write_half) = tokio::io::split(stream);
        *self.reader.lock().await = Some(read_half);
        *self.writer.lock().await = Some(write_half);
        self.connected.store(true, Ordering::Release);
        Ok(())
    }

    /// Writes the whole buffer to the peer.
    ///
    /// Fails immediately with [`ProtocolError::NotConnected`] when the
    /// connection is down — writes are caller-driven and never trigger an
    /// implicit reconnect or queue silently.
    pub async fn write(&self, bytes: &[u8]) -> Result<usize> {
        if !self.is_connected() {
            return Err(ProtocolError::NotConnected);
        }
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(ProtocolError::NotConnected)?;
        writer.write_all(bytes).await?;
        writer.flush().await?;
        Ok(bytes.len())
    }

    /// Reads exactly `n` bytes, blocking until they arrive.
    ///
    /// End-of-stream is not a hard error: the connected flag is lowered and
    /// `Ok(None)` returned so the receive loop can choose to reconnect on
    /// its next wake. Transport errors propagate.
    pub async fn read_exact(&self, n: usize) -> Result<Option<Vec<u8>>> {
        let mut guard = self.reader.lock().await;
        let reader = guard.as_mut().ok_or(ProtocolError::NotConnected)?;

        let mut buf = vec![0u8; n];
        match reader.read_exact(&mut buf).await {
            Ok(_) => Ok(Some(buf)),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                debug!("got EOF from node");
                self.connected.store(false, Ordering::Release);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Shuts the stream down and drops both halves.
    pub async fn close(&self) -> Result<()> {
        self.connected.store(false, Ordering::Release);
        self.reader.lock().await.take();
        if let Some(mut writer) = self.writer.lock().await.take() {
            writer.shutdown().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    /// Connector handing out the far ends of fresh duplex pipes, counting
    /// dial attempts.
    fn duplex_connector(
        streams: Vec<tokio::io::DuplexStream>,
    ) -> (Connector, Arc<AtomicUsize>) {
        let dials = Arc::new(AtomicUsize::new(0));
        let counter = dials.clone();
        let pool = std::sync::Mutex::new(streams.into_iter());
        let connector: Connector = Box::new(move |_host, _port| {
            counter.fetch_add(1, Ordering::SeqCst);
            let next = pool.lock().unwrap().next();
            Box::pin(async move {
                next.map(|s| Box::new(s) as BoxedConnection).ok_or_else(|| {
                    io::Error::new(io::ErrorKind::ConnectionRefused, "no stream available")
                })
            })
        });
        (connector, dials)
    }

    #[tokio::test]
    async fn write_after_close_is_not_connected_and_skips_transport() {
        let (local, _remote) = tokio::io::duplex(256);
        let (connector, dials) = duplex_connector(vec![local]);

        let client = PeerClient::connect("127.0.0.1", 18333, connector)
            .await
            .unwrap();
        client.close().await.unwrap();

        let err = client.write(b"version frame").await.unwrap_err();
        assert!(matches!(err, ProtocolError::NotConnected));
        // only the constructor dialed; the failed write must not reconnect
        assert_eq!(dials.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn eof_lowers_connected_flag_and_reads_none() {
        let (local, remote) = tokio::io::duplex(256);
        let (connector, _) = duplex_connector(vec![local]);

        let client = PeerClient::connect("127.0.0.1", 18333, connector)
            .await
            .unwrap();
        assert!(client.is_connected());

        drop(remote);
        assert!(client.read_exact(24).await.unwrap().is_none());
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn reconnect_serves_a_fresh_stream() {
        let (first, first_remote) = tokio::io::duplex(256);
        let (second, mut second_remote) = tokio::io::duplex(256);
        let (connector, dials) = duplex_connector(vec![first, second]);

        let client = PeerClient::connect("127.0.0.1", 18333, connector)
            .await
            .unwrap();

        drop(first_remote);
        assert!(client.read_exact(4).await.unwrap().is_none());

        client.reconnect().await.unwrap();
        assert!(client.is_connected());
        assert_eq!(dials.load(Ordering::SeqCst), 2);

        second_remote.write_all(b"ping").await.unwrap();
        let read = client.read_exact(4).await.unwrap().unwrap();
        assert_eq!(read, b"ping");
    }

    #[tokio::test]
    async fn failed_reconnect_surfaces_io_error() {
        let (local, _remote) = tokio::io::duplex(256);
        let (connector, _) = duplex_connector(vec![local]);

        let client = PeerClient::connect("127.0.0.1", 18333, connector)
            .await
            .unwrap();
        // the pool is exhausted, so the next dial is refused
        assert!(matches!(
            client.reconnect().await,
            Err(ProtocolError::Io(_))
        ));
    }
}
