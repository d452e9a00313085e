//! The stop-and-wait engine: one outstanding segment, an alternating bit,
//! unbounded retransmission.
//!
//! The sender half owns the current sequence bit and blocks the caller
//! until the matching acknowledgment arrives; the receiver half tracks the
//! next expected bit per peer and guarantees exactly-once delivery upward
//! while always re-acknowledging duplicates. Between the two sits whatever
//! loss, corruption and reordering the channel inflicts.

use crate::channel::{Channel, ChannelError};
use crate::frame::FrameError;
use crate::packet::Vip;
use crate::segment::{Segment, SeqBit};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error as ThisError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Capacity of the event queue between the reception task and the sender
/// half. Events are advisory; if nobody is waiting on them they pile up
/// here briefly and are drained before the next exchange.
pub(crate) const EVENT_QUEUE_DEPTH: usize = 8;

/// What the reception task tells the sender half about inbound traffic.
#[derive(Debug)]
pub(crate) enum ArqEvent {
    /// A structurally sound acknowledgment addressed to this station.
    Ack { from: Vip, seq: SeqBit },
    /// Inbound bytes that failed parsing or the checksum. Treated like a
    /// damaged acknowledgment: retransmit and hope for a cleaner exchange.
    Garbled,
}

/// The sender half of stop-and-wait.
///
/// At most one segment is ever outstanding: [`deliver`](Self::deliver)
/// takes `&mut self` and does not return until the segment is acknowledged
/// or the caller cancels, so a second segment cannot even be attempted
/// until the first resolves.
pub struct ArqSender {
    seq: SeqBit,
    timeout: Duration,
    events: mpsc::Receiver<ArqEvent>,
}

/// How a completed delivery went.
#[derive(Debug, Clone, Copy)]
pub struct SendReport {
    /// The sequence bit the segment was sent under.
    pub seq: SeqBit,
    /// Total transmissions, the first attempt included.
    pub attempts: u32,
}

impl ArqSender {
    pub(crate) fn new(timeout: Duration, events: mpsc::Receiver<ArqEvent>) -> Self {
        Self {
            seq: SeqBit::ZERO,
            timeout,
            events,
        }
    }

    /// The bit the next outbound segment must carry.
    pub fn current_seq(&self) -> SeqBit {
        self.seq
    }

    /// Transmits `bytes`, a fully built frame for the current sequence
    /// bit, until the matching acknowledgment arrives or `cancel` fires.
    ///
    /// Retransmissions reuse the exact same bytes, so a rebuilt frame can
    /// never diverge from what the receiver originally saw. Retries are
    /// unbounded; timeouts, wrong-bit acknowledgments and garbled inbound
    /// traffic all just trigger another transmission.
    pub(crate) async fn deliver(
        &mut self,
        channel: &Arc<dyn Channel>,
        next_hop: SocketAddr,
        bytes: Vec<u8>,
        peer: &Vip,
        cancel: &CancellationToken,
    ) -> Result<SendReport, SendError> {
        let seq = self.seq;
        let mut attempts: u32 = 0;

        // Anything still queued belongs to a previous exchange.
        while self.events.try_recv().is_ok() {}

        loop {
            if cancel.is_cancelled() {
                return Err(SendError::Cancelled);
            }
            attempts += 1;
            tracing::info!(
                target: "transport",
                %peer,
                seq = %seq,
                attempt = attempts,
                "sending segment via router"
            );
            channel.transmit(bytes.clone(), next_hop).await?;

            let outcome = tokio::select! {
                _ = cancel.cancelled() => return Err(SendError::Cancelled),
                outcome = tokio::time::timeout(self.timeout, self.events.recv()) => outcome,
            };

            match outcome {
                Err(_elapsed) => {
                    tracing::warn!(
                        target: "transport",
                        seq = %seq,
                        timeout_ms = self.timeout.as_millis() as u64,
                        "timeout waiting for ack, retransmitting"
                    );
                }
                Ok(None) => return Err(SendError::Disconnected),
                Ok(Some(ArqEvent::Garbled)) => {
                    tracing::warn!(
                        target: "transport",
                        seq = %seq,
                        "garbled reply, retransmitting"
                    );
                }
                Ok(Some(ArqEvent::Ack { from, seq: acked })) => {
                    if acked == seq {
                        tracing::info!(
                            target: "transport",
                            %from,
                            seq = %seq,
                            attempts,
                            "ack received, segment delivered"
                        );
                        self.seq = self.seq.flip();
                        return Ok(SendReport { seq, attempts });
                    }
                    tracing::warn!(
                        target: "transport",
                        %from,
                        expected = %seq,
                        got = %acked,
                        "unexpected ack bit, retransmitting"
                    );
                }
            }
        }
    }
}

/// The receiver's verdict on a data segment.
#[derive(Debug)]
pub(crate) enum Receipt {
    /// First sight of this segment; hand the payload upward.
    Deliver(serde_json::Value),
    /// A retransmission of something already delivered.
    Duplicate,
}

/// The receiver half of stop-and-wait: one expected bit per peer.
///
/// The table gains an entry per distinct peer and is never pruned; for a
/// classroom-sized topology that is a handful of entries for the life of
/// the process.
#[derive(Debug, Default)]
pub struct ArqReceiver {
    expected: DashMap<Vip, SeqBit>,
}

impl ArqReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Processes a data segment from `peer`.
    ///
    /// The returned acknowledgment must be sent regardless of the verdict:
    /// the peer cannot tell "my segment was lost" from "my segment's ack
    /// was lost", and only an acknowledgment carrying the received bit
    /// resolves that ambiguity. Duplicates are therefore re-acked even
    /// though their payload goes nowhere.
    pub(crate) fn accept(&self, peer: &Vip, segment: &Segment) -> (Segment, Receipt) {
        let ack = Segment::ack(segment.seq_num);
        let mut expected = self
            .expected
            .entry(peer.clone())
            .or_insert(SeqBit::ZERO);
        tracing::debug!(
            target: "transport",
            %peer,
            seq = %segment.seq_num,
            expected = %*expected,
            "data segment"
        );
        if segment.seq_num == *expected {
            *expected = expected.flip();
            let payload = segment
                .payload
                .clone()
                .unwrap_or(serde_json::Value::Null);
            (ack, Receipt::Deliver(payload))
        } else {
            tracing::warn!(
                target: "transport",
                %peer,
                seq = %segment.seq_num,
                "duplicate segment, payload discarded"
            );
            (ack, Receipt::Duplicate)
        }
    }
}

#[derive(Debug, ThisError)]
pub enum SendError {
    #[error("send cancelled before an acknowledgment arrived")]
    Cancelled,
    #[error("the reception task is gone")]
    Disconnected,
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Hub;
    use serde_json::json;

    fn addr(port: u16) -> SocketAddr {
        ([127, 0, 0, 1], port).into()
    }

    #[test]
    fn receiver_delivers_once_and_acks_twice() {
        let receiver = ArqReceiver::new();
        let peer = Vip::from("HOST_A");
        let segment = Segment::data(SeqBit::ZERO, json!({"message": "oi"}));

        let (ack, receipt) = receiver.accept(&peer, &segment);
        assert_eq!(ack, Segment::ack(SeqBit::ZERO));
        assert!(matches!(receipt, Receipt::Deliver(_)));

        // The same segment again: acked again, delivered never.
        let (ack, receipt) = receiver.accept(&peer, &segment);
        assert_eq!(ack, Segment::ack(SeqBit::ZERO));
        assert!(matches!(receipt, Receipt::Duplicate));
    }

    #[test]
    fn receiver_tracks_peers_independently() {
        let receiver = ArqReceiver::new();
        let first = Segment::data(SeqBit::ZERO, json!(1));

        let (_, receipt) = receiver.accept(&Vip::from("HOST_A"), &first);
        assert!(matches!(receipt, Receipt::Deliver(_)));
        // HOST_B starts at its own expected zero, unaffected by HOST_A.
        let (_, receipt) = receiver.accept(&Vip::from("HOST_B"), &first);
        assert!(matches!(receipt, Receipt::Deliver(_)));
    }

    #[tokio::test]
    async fn sender_retransmits_until_acked_and_alternates() {
        let hub = Hub::new();
        let sender_channel: Arc<dyn Channel> = Arc::new(hub.attach(addr(5001)));
        let peer_channel = hub.attach(addr(5002));

        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let mut arq = ArqSender::new(Duration::from_millis(30), events_rx);
        let cancel = CancellationToken::new();

        // A peer that ignores the first transmission and acknowledges the
        // second, like a receiver behind a channel that ate the first copy.
        let peer = tokio::spawn(async move {
            let mut seen = 0u32;
            loop {
                let datagram = peer_channel.receive().await.unwrap();
                seen += 1;
                if seen >= 2 {
                    events_tx
                        .send(ArqEvent::Ack {
                            from: Vip::from("SERVIDOR"),
                            seq: SeqBit::ZERO,
                        })
                        .await
                        .unwrap();
                    return (seen, datagram.bytes);
                }
            }
        });

        let report = arq
            .deliver(
                &sender_channel,
                addr(5002),
                b"frozen frame bytes".to_vec(),
                &Vip::from("SERVIDOR"),
                &cancel,
            )
            .await
            .unwrap();

        let (seen, last_bytes) = peer.await.unwrap();
        assert_eq!(report.attempts, 2);
        assert_eq!(seen, 2);
        // Retransmissions are byte-identical.
        assert_eq!(last_bytes, b"frozen frame bytes");
        // The bit alternated for the next exchange.
        assert_eq!(arq.current_seq(), SeqBit::ONE);
    }

    #[tokio::test]
    async fn wrong_bit_ack_triggers_retransmission() {
        let hub = Hub::new();
        let sender_channel: Arc<dyn Channel> = Arc::new(hub.attach(addr(5003)));
        let peer_channel = hub.attach(addr(5004));

        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let mut arq = ArqSender::new(Duration::from_millis(200), events_rx);
        let cancel = CancellationToken::new();

        let peer = tokio::spawn(async move {
            let mut seen = 0u32;
            loop {
                peer_channel.receive().await.unwrap();
                seen += 1;
                let seq = if seen == 1 { SeqBit::ONE } else { SeqBit::ZERO };
                events_tx
                    .send(ArqEvent::Ack {
                        from: Vip::from("SERVIDOR"),
                        seq,
                    })
                    .await
                    .unwrap();
                if seen == 2 {
                    return seen;
                }
            }
        });

        let report = arq
            .deliver(
                &sender_channel,
                addr(5004),
                b"data".to_vec(),
                &Vip::from("SERVIDOR"),
                &cancel,
            )
            .await
            .unwrap();
        assert_eq!(report.attempts, 2);
        assert_eq!(peer.await.unwrap(), 2);
    }

    #[tokio::test]
    async fn cancellation_ends_an_unacknowledged_send() {
        let hub = Hub::new();
        let sender_channel: Arc<dyn Channel> = Arc::new(hub.attach(addr(5005)));
        // Nobody attached at the destination: every transmission vanishes.

        let (_events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let mut arq = ArqSender::new(Duration::from_millis(10), events_rx);
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let outcome = arq
            .deliver(
                &sender_channel,
                addr(5999),
                b"doomed".to_vec(),
                &Vip::from("SERVIDOR"),
                &cancel,
            )
            .await;
        assert!(matches!(outcome, Err(SendError::Cancelled)));
    }
}
