//! The handshake engine.
//!
//! Drives the two-step exchange against a connected peer:
//!
//! ```text
//! Init -> VersionSent -> VersionAcked -> VerackSent -> Complete
//! ```
//!
//! with a Failed state absorbing send errors and deadline expiry from any
//! non-terminal point. The engine consumes events produced by the receive
//! loop through a bounded channel and blocks on two single-fire gates: one
//! for the peer's version message, one for its verack. Each gate is raced
//! against the cancellation token, so a caller-imposed deadline always wins.
//!
//! Ordering is deliberately relaxed: the listener fires whichever gate
//! matches the event it sees, and a peer that sends verack before version
//! still completes the handshake. This mirrors the behavior the protocol
//! tolerates in practice rather than tightening it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::HandshakeConfig;
use crate::error::{ProtocolError, Result};
use crate::protocol::generator::MessageGenerator;
use crate::transport::connection::PeerClient;
use crate::transport::receiver::{InboundEvent, ReceiveLoop};
use crate::wire::constants::HEADER_SIZE;
use crate::wire::{Command, MessageHeader, Payload, VersionPayload};

/// Coordinates the receive loop and the send sequence for one peer.
pub struct HandshakeCore {
    client: Arc<PeerClient>,
    generator: MessageGenerator,
    magic: u32,
    poll_interval: Duration,
    max_payload_size: usize,
    events_tx: mpsc::Sender<InboundEvent>,
    events_rx: Mutex<Option<mpsc::Receiver<InboundEvent>>>,
    receiver_started: AtomicBool,
}

impl HandshakeCore {
    pub fn new(
        client: Arc<PeerClient>,
        generator: MessageGenerator,
        config: &HandshakeConfig,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(config.channel_capacity);
        Self {
            client,
            generator,
            magic: config.magic,
            poll_interval: config.poll_interval,
            max_payload_size: config.max_payload_size,
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            receiver_started: AtomicBool::new(false),
        }
    }

    /// Spawns the receive loop feeding the event channel.
    ///
    /// Idempotent: the loop is started at most once per core; later calls
    /// are no-ops.
    pub fn start_receiver(&self, token: &CancellationToken) {
        if self.receiver_started.swap(true, Ordering::SeqCst) {
            debug!("receive loop already started");
            return;
        }
        tokio::spawn(
            ReceiveLoop {
                client: Arc::clone(&self.client),
                events: self.events_tx.clone(),
                token: token.clone(),
                magic: self.magic,
                poll_interval: self.poll_interval,
                max_payload_size: self.max_payload_size,
            }
            .run(),
        );
    }

    /// Performs the version/verack exchange once, returning the elapsed
    /// wall-clock time on success.
    ///
    /// The sequence is strictly: send version, await the peer's version,
    /// send verack, await the peer's verack. A send failure or the
    /// cancellation token firing aborts with that error; per-frame errors
    /// reported by the receive loop are logged and ignored. The whole
    /// attempt is one-shot — a second call on the same core fails with
    /// [`ProtocolError::AlreadyRunning`].
    pub async fn handshake(&self, token: &CancellationToken) -> Result<Duration> {
        let events = self
            .events_rx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
            .ok_or(ProtocolError::AlreadyRunning)?;

        let (version_tx, version_rx) = oneshot::channel();
        let (verack_tx, verack_rx) = oneshot::channel();
        let listener = tokio::spawn(listen(events, version_tx, verack_tx, token.clone()));

        let started = Instant::now();
        let result = self
            .exchange_messages(token, version_rx, verack_rx)
            .await;
        listener.abort();

        result.map(|_| started.elapsed())
    }

    async fn exchange_messages(
        &self,
        token: &CancellationToken,
        version_rx: oneshot::Receiver<Option<VersionPayload>>,
        verack_rx: oneshot::Receiver<()>,
    ) -> Result<()> {
        self.send_version().await.map_err(|e| {
            error!(error = %e, "err sending version message to node");
            e
        })?;

        let peer_version = tokio::select! {
            received = version_rx => received.map_err(|_| ProtocolError::Timeout)?,
            _ = token.cancelled() => {
                warn!("stopping wait for version message by cancellation");
                return Err(ProtocolError::Timeout);
            }
        };
        match peer_version {
            Some(version) => info!(
                version = version.version,
                user_agent = %version.user_agent,
                start_height = version.start_height,
                "version message received successfully, sending verack",
            ),
            None => info!("version message received successfully, sending verack"),
        }

        self.send_verack().await.map_err(|e| {
            error!(error = %e, "err sending verack message to node");
            e
        })?;

        tokio::select! {
            received = verack_rx => received.map_err(|_| ProtocolError::Timeout)?,
            _ = token.cancelled() => {
                warn!("stopping wait for verack message by cancellation");
                return Err(ProtocolError::Timeout);
            }
        }
        info!("verack message received successfully");

        Ok(())
    }

    async fn send_version(&self) -> Result<()> {
        info!("sending version message");
        // local address left as loopback:0; the node answers with our
        // white IP anyway
        let message = self.generator.version_message(
            self.client.host(),
            self.client.port(),
            "127.0.0.1",
            0,
        );
        let mut payload = Vec::new();
        message.encode(&mut payload);
        self.send_frame(Command::Version, &payload).await
    }

    async fn send_verack(&self) -> Result<()> {
        info!("sending verack message");
        self.send_frame(Command::Verack, &[]).await
    }

    /// Frames and writes one message: header (with checksum computed from
    /// the actual payload, empty included) followed by the payload bytes.
    async fn send_frame(&self, command: Command, payload: &[u8]) -> Result<()> {
        let header = MessageHeader::for_payload(self.magic, command, payload);
        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
        header.encode(&mut frame);
        frame.extend_from_slice(payload);

        let sent = self.client.write(&frame).await?;
        debug!(bytes = sent, "sent frame");
        Ok(())
    }
}

/// Consumes inbound events for the duration of one handshake.
///
/// Fires the version gate on the first clean version event and the verack
/// gate on the first clean verack event, stopping once both have fired.
/// The gates buffer their signal, so arrival order does not matter to the
/// engine's sequential waits. Event-borne errors are logged and never fatal
/// here.
async fn listen(
    mut events: mpsc::Receiver<InboundEvent>,
    version_tx: oneshot::Sender<Option<VersionPayload>>,
    verack_tx: oneshot::Sender<()>,
    token: CancellationToken,
) {
    info!("starting listening incoming messages from node");
    let mut version_tx = Some(version_tx);
    let mut verack_tx = Some(verack_tx);

    loop {
        let event = tokio::select! {
            _ = token.cancelled() => {
                warn!("stopping listening messages from node by timeout");
                return;
            }
            event = events.recv() => match event {
                Some(event) => event,
                None => {
                    debug!("event channel closed, stopping listener");
                    return;
                }
            },
        };

        if let Some(err) = &event.error {
            error!(error = %err, "got invalid message");
            continue;
        }

        match event.header.command {
            Command::Version => {
                info!("got version message");
                if let Some(gate) = version_tx.take() {
                    let payload = match event.payload {
                        Some(Payload::Version(version)) => Some(version),
                        _ => None,
                    };
                    let _ = gate.send(payload);
                }
            }
            Command::Verack => {
                info!("got verack message");
                if let Some(gate) = verack_tx.take() {
                    let _ = gate.send(());
                }
            }
            Command::Unknown(ref name) => {
                debug!(command = %name, "ignoring unrelated message");
            }
        }

        if version_tx.is_none() && verack_tx.is_none() {
            return;
        }
    }
}
