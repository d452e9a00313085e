//! One message, one router, one clean acknowledgment cycle.

use super::support::Topology;
use crate::chat::ChatPayload;
use mininet_core::packet::Vip;
use mininet_core::segment::SeqBit;
use std::time::Duration;
use tokio::time::timeout;

/// HOST_A sends "hello" to SERVIDOR through the router and sees exactly
/// one successful acknowledgment cycle; the server displays the message
/// exactly once.
pub async fn basic_delivery() {
    let topology = Topology::new();
    topology.start_router(5000, &[("HOST_A", 5001), ("SERVIDOR", 6000)]);
    let (mut client, _) = topology.endpoint("HOST_A", 5001, 5000);
    let (_server, mut deliveries) = topology.endpoint("SERVIDOR", 6000, 5000);

    let report = client
        .send(
            Vip::from("SERVIDOR"),
            ChatPayload::new("ana", "hello").to_value(),
        )
        .await
        .expect("delivery over a clean channel cannot fail");
    assert_eq!(report.attempts, 1, "a clean channel needs one attempt");
    assert_eq!(report.seq, SeqBit::ZERO);

    let delivery = timeout(Duration::from_millis(500), deliveries.recv())
        .await
        .expect("the server never saw the message")
        .expect("the delivery queue closed early");
    assert_eq!(delivery.from, Vip::from("HOST_A"));
    let chat = ChatPayload::from_value(&delivery.payload).expect("a chat payload");
    assert_eq!(chat.message, "hello");

    // Exactly once: nothing else shows up afterwards.
    let extra = timeout(Duration::from_millis(100), deliveries.recv()).await;
    assert!(extra.is_err(), "the message must be displayed exactly once");
}
