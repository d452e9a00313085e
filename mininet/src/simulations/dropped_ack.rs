//! A lost acknowledgment forces a retransmission; the duplicate is
//! re-acknowledged but never re-displayed.

use super::support::{addr, DropNth, Topology};
use crate::chat::ChatPayload;
use mininet_core::endpoint::NodeConfig;
use mininet_core::packet::Vip;
use mininet_core::segment::SeqBit;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// The server's second transmission, the acknowledgment for the segment
/// with sequence bit 1, is swallowed by the channel. The client cannot
/// tell a lost segment from a lost ack, so it retransmits the identical
/// segment; the server re-acks the duplicate and displays nothing new.
pub async fn dropped_ack() {
    let topology = Topology::new();
    topology.start_router(5000, &[("HOST_A", 5001), ("SERVIDOR", 6000)]);
    let (mut client, _) = topology.endpoint("HOST_A", 5001, 5000);

    // Ack #1 covers the first message; ack #2 is the one that vanishes.
    let server_channel = Arc::new(DropNth::new(topology.tap(6000), 2));
    let (_server, mut deliveries) = topology.endpoint_on(
        NodeConfig::new(Vip::from("SERVIDOR"), addr(5000))
            .ack_timeout(Duration::from_millis(80)),
        server_channel,
    );

    let first = client
        .send(
            Vip::from("SERVIDOR"),
            ChatPayload::new("ana", "first").to_value(),
        )
        .await
        .expect("the first message goes through cleanly");
    assert_eq!(first.attempts, 1);
    assert_eq!(first.seq, SeqBit::ZERO);

    let second = client
        .send(
            Vip::from("SERVIDOR"),
            ChatPayload::new("ana", "second").to_value(),
        )
        .await
        .expect("the retransmission eventually gets its ack");
    assert_eq!(second.seq, SeqBit::ONE);
    assert_eq!(
        second.attempts, 2,
        "one timeout on the lost ack, then the duplicate's re-ack lands"
    );

    // The server displayed each message exactly once, duplicate included.
    for expected in ["first", "second"] {
        let delivery = timeout(Duration::from_millis(500), deliveries.recv())
            .await
            .expect("a message went missing")
            .expect("the delivery queue closed early");
        let chat = ChatPayload::from_value(&delivery.payload).expect("a chat payload");
        assert_eq!(chat.message, expected);
    }
    let extra = timeout(Duration::from_millis(100), deliveries.recv()).await;
    assert!(extra.is_err(), "the duplicate must not be re-displayed");
}

#[cfg(test)]
mod tests {
    #[tokio::test]
    async fn simulation() {
        super::dropped_ack().await
    }
}
