//! The network-layer forwarder.
//!
//! The router lives at the boundary between link and network: it consumes
//! each inbound frame, applies TTL and routing-table logic to the packet
//! inside, and wraps the survivor in a brand-new frame for the next hop.
//! It never looks at the transport segment; layering discipline holds
//! even though the whole system can run in one process.

use crate::channel::{Channel, ChannelError, Datagram};
use crate::frame::{Frame, Mac};
use crate::logging;
use crate::tables::{AddressTable, RoutingTable};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A static-table packet forwarder.
///
/// Every discard is silent on the wire: no reply, no error signal. The
/// original sender's retransmission timeout is the only recovery path,
/// which is precisely the behavior the transport layer is built around.
pub struct Router {
    mac: Mac,
    routes: Arc<RoutingTable>,
    addresses: Arc<AddressTable>,
    channel: Arc<dyn Channel>,
}

impl Router {
    pub fn new(
        mac: Mac,
        routes: Arc<RoutingTable>,
        addresses: Arc<AddressTable>,
        channel: Arc<dyn Channel>,
    ) -> Self {
        Self {
            mac,
            routes,
            addresses,
            channel,
        }
    }

    /// Forwards frames until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), ChannelError> {
        tracing::info!(
            target: "router",
            mac = %self.mac,
            addr = %self.channel.local_addr(),
            routes = self.routes.len(),
            "router up, waiting for frames"
        );
        loop {
            let datagram = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                received = self.channel.receive() => received?,
            };
            self.forward(datagram).await;
        }
    }

    /// One forwarding iteration. Anything that goes wrong ends with the
    /// packet on the floor and a log line; even a failed transmit is
    /// treated as loss, because that is what it looks like from the
    /// outside.
    async fn forward(&self, datagram: Datagram) {
        let Some(decoded) = Frame::decode(&datagram.bytes) else {
            logging::frame_garbled_event(datagram.bytes.len());
            return;
        };
        if !decoded.integrity_ok {
            logging::frame_corrupt_event(decoded.frame.src_mac, decoded.frame.dst_mac);
            return;
        }
        let frame = decoded.frame;
        logging::frame_ok_event(frame.src_mac, frame.dst_mac);

        let mut packet = frame.data;
        logging::packet_event(&packet);

        if packet.ttl == 0 {
            tracing::error!(
                target: "net",
                dst = %packet.dst_vip,
                "TTL expired, packet discarded"
            );
            return;
        }
        packet.ttl -= 1;
        tracing::debug!(target: "net", ttl = packet.ttl, "TTL decremented");

        let Some(next_hop) = self.routes.next_hop(&packet.dst_vip) else {
            tracing::error!(
                target: "net",
                dst = %packet.dst_vip,
                "no route to destination, packet discarded"
            );
            return;
        };

        let dst_mac = self.addresses.resolve(&packet.dst_vip);
        let fresh = match Frame::build(self.mac, dst_mac, packet) {
            Ok(frame) => frame,
            Err(error) => {
                tracing::error!(target: "link", %error, "could not re-frame packet");
                return;
            }
        };
        let bytes = match fresh.encode() {
            Ok(bytes) => bytes,
            Err(error) => {
                tracing::error!(target: "link", %error, "could not serialize frame");
                return;
            }
        };
        logging::frame_built_event(self.mac, dst_mac);
        tracing::debug!(target: "net", %next_hop, "forwarding frame");
        if let Err(error) = self.channel.transmit(bytes, next_hop).await {
            tracing::error!(target: "router", %error, "transmit failed, frame lost");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Hub;
    use crate::packet::{Packet, Vip};
    use crate::segment::{Segment, SeqBit};
    use serde_json::json;
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::time::timeout;

    fn addr(port: u16) -> SocketAddr {
        ([127, 0, 0, 1], port).into()
    }

    struct Net {
        _cancel: tokio_util::sync::DropGuard,
        hub: Arc<Hub>,
        addresses: Arc<AddressTable>,
    }

    /// A router at :5000 with a route to SERVIDOR at :6000.
    fn start_router() -> Net {
        let hub = Hub::new();
        let addresses = Arc::new(AddressTable::default_stations());
        let routes = Arc::new(
            RoutingTable::new([
                (Vip::from("SERVIDOR"), addr(6000)),
                (Vip::from("HOST_A"), addr(5001)),
            ])
            .unwrap(),
        );
        let router = Router::new(
            addresses.resolve(&Vip::from("ROTEADOR")),
            routes,
            addresses.clone(),
            Arc::new(hub.attach(addr(5000))),
        );
        let cancel = CancellationToken::new();
        let guard = cancel.clone().drop_guard();
        tokio::spawn(async move { router.run(cancel).await });
        Net {
            _cancel: guard,
            hub,
            addresses,
        }
    }

    fn data_frame(net: &Net, ttl: u8, dst: &str) -> Vec<u8> {
        let packet = Packet::new(
            Vip::from("HOST_A"),
            Vip::from(dst),
            ttl,
            Segment::data(SeqBit::ZERO, json!({"message": "oi"})),
        );
        let frame = Frame::build(
            net.addresses.resolve(&Vip::from("HOST_A")),
            net.addresses.resolve(&Vip::from("ROTEADOR")),
            packet,
        )
        .unwrap();
        frame.encode().unwrap()
    }

    #[tokio::test]
    async fn forwards_with_decremented_ttl_and_fresh_frame() {
        let net = start_router();
        let client = net.hub.attach(addr(5001));
        let server = net.hub.attach(addr(6000));

        client
            .transmit(data_frame(&net, 8, "SERVIDOR"), addr(5000))
            .await
            .unwrap();

        let datagram = timeout(Duration::from_millis(500), server.receive())
            .await
            .expect("the frame never arrived")
            .unwrap();
        let decoded = Frame::decode(&datagram.bytes).unwrap();
        assert!(decoded.integrity_ok, "the router must re-checksum");
        assert_eq!(decoded.frame.data.ttl, 7);
        assert_eq!(
            decoded.frame.src_mac,
            net.addresses.resolve(&Vip::from("ROTEADOR"))
        );
        assert_eq!(
            decoded.frame.dst_mac,
            net.addresses.resolve(&Vip::from("SERVIDOR"))
        );
    }

    #[tokio::test]
    async fn expired_ttl_is_dropped() {
        let net = start_router();
        let client = net.hub.attach(addr(5001));
        let server = net.hub.attach(addr(6000));

        client
            .transmit(data_frame(&net, 0, "SERVIDOR"), addr(5000))
            .await
            .unwrap();
        let outcome = timeout(Duration::from_millis(50), server.receive()).await;
        assert!(outcome.is_err(), "an expired packet must not be forwarded");
    }

    #[tokio::test]
    async fn unroutable_destinations_are_dropped() {
        let net = start_router();
        let client = net.hub.attach(addr(5001));
        let server = net.hub.attach(addr(6000));

        client
            .transmit(data_frame(&net, 8, "GHOST"), addr(5000))
            .await
            .unwrap();
        let outcome = timeout(Duration::from_millis(50), server.receive()).await;
        assert!(outcome.is_err());
    }

    #[tokio::test]
    async fn damaged_frames_are_dropped_without_a_reply() {
        let net = start_router();
        let client = net.hub.attach(addr(5001));
        let server = net.hub.attach(addr(6000));

        // Flip one bit inside the message text: still JSON, wrong CRC.
        let mut bytes = data_frame(&net, 8, "SERVIDOR");
        let position = bytes
            .windows(2)
            .position(|window| window == &b"oi"[..])
            .unwrap();
        bytes[position] ^= 0x01;
        client.transmit(bytes, addr(5000)).await.unwrap();

        // Total garbage as well.
        client
            .transmit(b"{{{{".to_vec(), addr(5000))
            .await
            .unwrap();

        let forwarded = timeout(Duration::from_millis(50), server.receive()).await;
        assert!(forwarded.is_err());
        let replied = timeout(Duration::from_millis(50), client.receive()).await;
        assert!(replied.is_err(), "discards must be silent, no reply");
    }
}
