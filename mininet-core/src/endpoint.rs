//! A full protocol-stack endpoint for one station.
//!
//! This is the composition layer: application payload → [`Segment`] →
//! [`Packet`] → [`Frame`] → channel on the way out, and the same unwrapping
//! in reverse on the way in. Client and server are the same endpoint with
//! different applications on top; the differences between them live
//! entirely above [`Endpoint::send`] and the delivery queue.

use crate::arq::{ArqEvent, ArqReceiver, ArqSender, Receipt, SendError, SendReport, EVENT_QUEUE_DEPTH};
use crate::channel::{Channel, Datagram};
use crate::frame::Frame;
use crate::logging;
use crate::packet::{Packet, Vip, INITIAL_TTL};
use crate::segment::Segment;
use crate::tables::AddressTable;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Fixed acknowledgment timeout. Deliberately not adaptive: this stack
/// demonstrates retransmission, not round-trip estimation.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(3);

/// The station every first hop is addressed to.
const DEFAULT_ROUTER_VIP: &str = "ROTEADOR";

/// Immutable per-station configuration, built once and handed to
/// [`Endpoint::attach`].
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// This station's logical address.
    pub vip: Vip,
    /// The router's logical address, used to resolve the first-hop MAC.
    pub router_vip: Vip,
    /// Where the router listens.
    pub router_addr: SocketAddr,
    /// Hop budget stamped on outbound packets.
    pub initial_ttl: u8,
    /// How long the sender half waits for an acknowledgment before
    /// retransmitting.
    pub ack_timeout: Duration,
}

impl NodeConfig {
    pub fn new(vip: Vip, router_addr: SocketAddr) -> Self {
        Self {
            vip,
            router_vip: Vip::from(DEFAULT_ROUTER_VIP),
            router_addr,
            initial_ttl: INITIAL_TTL,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
        }
    }

    pub fn initial_ttl(mut self, ttl: u8) -> Self {
        self.initial_ttl = ttl;
        self
    }

    pub fn ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    pub fn router_vip(mut self, vip: Vip) -> Self {
        self.router_vip = vip;
        self
    }
}

/// A payload that made it all the way up the stack, plus the station it
/// came from.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub from: Vip,
    pub payload: serde_json::Value,
}

/// A station wired to a channel: the sending side of the stack plus a
/// running reception task.
pub struct Endpoint {
    config: NodeConfig,
    addresses: Arc<AddressTable>,
    channel: Arc<dyn Channel>,
    sender: ArqSender,
    cancel: CancellationToken,
}

impl Endpoint {
    /// Wires a station to the channel.
    ///
    /// Spawns the reception task and returns the endpoint handle together
    /// with the queue of inbound application payloads. The reception task
    /// only ever reads from the channel and the send path only ever
    /// writes-then-waits, so the two sides never contend; it exits when
    /// `cancel` fires or the channel closes.
    pub fn attach(
        config: NodeConfig,
        addresses: Arc<AddressTable>,
        channel: Arc<dyn Channel>,
        cancel: CancellationToken,
    ) -> (Self, mpsc::Receiver<Delivery>) {
        let (ack_tx, ack_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let (delivery_tx, delivery_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let reception = Reception {
            vip: config.vip.clone(),
            router_vip: config.router_vip.clone(),
            router_addr: config.router_addr,
            initial_ttl: config.initial_ttl,
            addresses: addresses.clone(),
            channel: channel.clone(),
            receiver: ArqReceiver::new(),
            acks: ack_tx,
            deliveries: delivery_tx,
        };
        tokio::spawn(reception.run(cancel.clone()));

        let endpoint = Self {
            sender: ArqSender::new(config.ack_timeout, ack_rx),
            config,
            addresses,
            channel,
            cancel,
        };
        (endpoint, delivery_rx)
    }

    pub fn vip(&self) -> &Vip {
        &self.config.vip
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.channel.local_addr()
    }

    /// Sends one application payload reliably to `dst`.
    ///
    /// Builds the segment for the current sequence bit, wraps it down to a
    /// frame addressed to the router, freezes the bytes, and drives the
    /// stop-and-wait loop until the matching acknowledgment arrives or the
    /// endpoint is cancelled. Stop-and-wait serializes sends by
    /// construction: this takes `&mut self`, so segment N+1 cannot leave
    /// before segment N resolves.
    pub async fn send(
        &mut self,
        dst: Vip,
        payload: serde_json::Value,
    ) -> Result<SendReport, SendError> {
        let seq = self.sender.current_seq();
        let segment = Segment::data(seq, payload);
        let packet = Packet::new(
            self.config.vip.clone(),
            dst.clone(),
            self.config.initial_ttl,
            segment,
        );
        logging::packet_event(&packet);

        let src_mac = self.addresses.resolve(&self.config.vip);
        let router_mac = self.addresses.resolve(&self.config.router_vip);
        let frame = Frame::build(src_mac, router_mac, packet)?;
        let bytes = frame.encode()?;
        logging::frame_built_event(src_mac, router_mac);

        self.sender
            .deliver(
                &self.channel,
                self.config.router_addr,
                bytes,
                &dst,
                &self.cancel,
            )
            .await
    }
}

/// The inbound half of an endpoint, running as its own task.
struct Reception {
    vip: Vip,
    router_vip: Vip,
    router_addr: SocketAddr,
    initial_ttl: u8,
    addresses: Arc<AddressTable>,
    channel: Arc<dyn Channel>,
    receiver: ArqReceiver,
    acks: mpsc::Sender<ArqEvent>,
    deliveries: mpsc::Sender<Delivery>,
}

impl Reception {
    async fn run(self, cancel: CancellationToken) {
        loop {
            let datagram = tokio::select! {
                _ = cancel.cancelled() => return,
                received = self.channel.receive() => match received {
                    Ok(datagram) => datagram,
                    Err(_) => return,
                },
            };
            self.handle(datagram).await;
        }
    }

    async fn handle(&self, datagram: Datagram) {
        // Link layer: parse and verify before anything else sees the bytes.
        let Some(decoded) = Frame::decode(&datagram.bytes) else {
            logging::frame_garbled_event(datagram.bytes.len());
            let _ = self.acks.try_send(ArqEvent::Garbled);
            return;
        };
        if !decoded.integrity_ok {
            logging::frame_corrupt_event(decoded.frame.src_mac, decoded.frame.dst_mac);
            let _ = self.acks.try_send(ArqEvent::Garbled);
            return;
        }
        let frame = decoded.frame;
        logging::frame_ok_event(frame.src_mac, frame.dst_mac);

        // Network layer: is this packet alive, and is it for us?
        let packet = frame.data;
        logging::packet_event(&packet);
        if packet.ttl == 0 {
            tracing::error!(target: "net", "TTL expired, packet discarded");
            return;
        }
        if packet.dst_vip != self.vip {
            tracing::warn!(
                target: "net",
                dst = %packet.dst_vip,
                me = %self.vip,
                "packet not addressed to this station, ignored"
            );
            return;
        }

        // Transport layer: acknowledgments feed the sender half, data
        // segments go through the receiver half.
        let segment = packet.data;
        if segment.is_ack {
            let _ = self.acks.try_send(ArqEvent::Ack {
                from: packet.src_vip,
                seq: segment.seq_num,
            });
            return;
        }

        let peer = packet.src_vip;
        let (ack, receipt) = self.receiver.accept(&peer, &segment);
        self.send_ack(ack, &peer).await;
        match receipt {
            Receipt::Deliver(payload) => {
                // Backpressure on purpose: delivery is exactly-once, so a
                // slow application slows reception rather than losing data.
                let _ = self
                    .deliveries
                    .send(Delivery {
                        from: peer,
                        payload,
                    })
                    .await;
            }
            Receipt::Duplicate => {}
        }
    }

    /// Wraps an acknowledgment down the stack and sends it toward the
    /// peer via the router. Failures are logged and forgotten: a lost ack
    /// is just another retransmission at the far end.
    async fn send_ack(&self, ack: Segment, peer: &Vip) {
        tracing::debug!(
            target: "transport",
            seq = %ack.seq_num,
            %peer,
            "sending ack via router"
        );
        let packet = Packet::new(
            self.vip.clone(),
            peer.clone(),
            self.initial_ttl,
            ack,
        );
        let src_mac = self.addresses.resolve(&self.vip);
        let router_mac = self.addresses.resolve(&self.router_vip);
        let bytes = Frame::build(src_mac, router_mac, packet)
            .and_then(|frame| frame.encode());
        match bytes {
            Ok(bytes) => {
                if let Err(error) = self.channel.transmit(bytes, self.router_addr).await {
                    tracing::error!(target: "transport", %error, "failed to send ack");
                }
            }
            Err(error) => {
                tracing::error!(target: "transport", %error, "failed to build ack frame");
            }
        }
    }
}
