//! The receive loop: reads frames off the peer stream, validates and
//! decodes them, and publishes the results onto a bounded event channel.
//!
//! Two states: idle-reconnect while the connection is down, reading while it
//! is up. The loop wakes on a fixed poll interval or immediately on
//! cancellation; cancellation closes the connection and exits the loop for
//! good. Per-frame failures are classified and survive the stream — this
//! loop must outlive malformed or hostile input indefinitely.
//!
//! The channel's bounded capacity is the sole backpressure mechanism: a full
//! channel blocks the publish, coupling this loop's pace to the consumer's.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::ProtocolError;
use crate::transport::connection::PeerClient;
use crate::wire::constants::HEADER_SIZE;
use crate::wire::{MessageHeader, Payload};

/// One received frame, published to the event channel.
///
/// Ownership moves to the consumer; the event is immutable once published.
/// `error` carries the classification for frames that failed validation.
#[derive(Debug)]
pub struct InboundEvent {
    pub header: MessageHeader,
    pub payload: Option<Payload>,
    pub error: Option<ProtocolError>,
}

pub(crate) struct ReceiveLoop {
    pub(crate) client: Arc<PeerClient>,
    pub(crate) events: mpsc::Sender<InboundEvent>,
    pub(crate) token: CancellationToken,
    pub(crate) magic: u32,
    pub(crate) poll_interval: Duration,
    pub(crate) max_payload_size: usize,
}

impl ReceiveLoop {
    pub(crate) async fn run(self) {
        let mut tick = time::interval(self.poll_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("starting reading incoming messages from node");
        loop {
            tokio::select! {
                _ = self.token.cancelled() => break,
                _ = tick.tick() => {}
            }

            if !self.client.is_connected() {
                if let Err(e) = self.client.reconnect().await {
                    error!(error = %e, "reconnect to node failed, skipping this iteration");
                }
                continue;
            }

            // The in-flight read is raced against cancellation so a deadline
            // terminates the loop within one poll interval even while the
            // peer is silent.
            tokio::select! {
                _ = self.token.cancelled() => break,
                _ = self.receive_once() => {}
            }
        }

        warn!("stopping receive loop by cancellation");
        if let Err(e) = self.client.close().await {
            warn!(error = %e, "error while closing connection to node");
        }
    }

    /// Reads and processes at most one frame. Every early return is a
    /// skipped iteration; the loop itself decides nothing here.
    async fn receive_once(&self) {
        let header_bytes = match self.client.read_exact(HEADER_SIZE).await {
            Ok(Some(bytes)) => bytes,
            // end-of-stream: the client flagged itself disconnected, the
            // next wake retries the reconnect path
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "error reading message header");
                return;
            }
        };

        let header = match MessageHeader::decode(&mut header_bytes.as_slice()) {
            Ok(header) => header,
            Err(e) => {
                warn!(error = %e, "error parsing message header");
                return;
            }
        };

        // Magic gate before the payload is read: a frame from the wrong
        // network is reported without trusting its length field.
        if header.magic != self.magic {
            warn!(magic = header.magic, "got message with invalid magic number");
            self.publish(InboundEvent {
                error: Some(ProtocolError::InvalidMagic {
                    expected: self.magic,
                    actual: header.magic,
                }),
                header,
                payload: None,
            })
            .await;
            return;
        }

        let length = header.length as usize;
        if length > self.max_payload_size {
            let err = ProtocolError::OversizedPayload(length);
            warn!(error = %err, command = %header.command, "advertised payload exceeds size limit, skipping frame");
            return;
        }

        let payload_bytes = match self.client.read_exact(length).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!("stream ended mid-frame");
                return;
            }
            Err(e) => {
                warn!(error = %e, "error reading message payload");
                return;
            }
        };

        if let Some(err) = header.validate(&payload_bytes, self.magic).into_error() {
            warn!(error = %err, command = %header.command, "got message with invalid checksum");
            self.publish(InboundEvent {
                header,
                payload: None,
                error: Some(err),
            })
            .await;
            return;
        }

        match Payload::decode(&header.command, &mut payload_bytes.as_slice()) {
            Ok(payload) => {
                debug!(command = %header.command, "sending received node message to processing");
                self.publish(InboundEvent {
                    header,
                    payload: Some(payload),
                    error: None,
                })
                .await;
            }
            Err(e) => {
                // frame lost, stream continues
                warn!(error = %e, command = %header.command, "error parsing message payload, skipping");
            }
        }
    }

    /// Publishes one event. Blocks while the channel is full — intentional
    /// backpressure against a slow consumer.
    async fn publish(&self, event: InboundEvent) {
        if self.events.send(event).await.is_err() {
            debug!("event channel closed, dropping received message");
        }
    }
}
