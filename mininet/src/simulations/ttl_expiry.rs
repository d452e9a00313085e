//! Hop budgets across a two-router path.

use super::support::Topology;
use crate::chat::ChatPayload;
use mininet_core::arq::SendError;
use mininet_core::channel::Channel;
use mininet_core::frame::Frame;
use mininet_core::packet::Vip;
use std::time::Duration;
use tokio::time::timeout;

/// Two chained routers. A packet minted with TTL 3 reaches the far side
/// carrying TTL 1, one decrement per hop. A packet minted with TTL 1 dies
/// at the second router, so its sender retries until the harness cancels
/// it, and nothing ever reaches the destination.
pub async fn ttl_expiry() {
    let topology = Topology::new();
    // First router forwards SERVIDOR-bound traffic to the second.
    topology.start_router(5000, &[("SERVIDOR", 5001), ("HOST_A", 5002)]);
    topology.start_router(5001, &[("SERVIDOR", 6000), ("HOST_A", 5000)]);

    // A bare wire tap plays the server so the arriving frame itself is
    // visible; it never acknowledges anything.
    let tap = topology.tap(6000);

    // Enough budget: TTL 3 minus two hops arrives as TTL 1.
    let (mut client, _) =
        topology.endpoint_with("HOST_A", 5002, 5000, |config| config.initial_ttl(3));
    let send = tokio::spawn(async move {
        client
            .send(
                Vip::from("SERVIDOR"),
                ChatPayload::new("ana", "far away").to_value(),
            )
            .await
    });

    let datagram = timeout(Duration::from_millis(500), tap.receive())
        .await
        .expect("the packet should survive two hops")
        .expect("the tap closed early");
    let decoded = Frame::decode(&datagram.bytes).expect("a parseable frame");
    assert!(decoded.integrity_ok);
    assert_eq!(decoded.frame.data.ttl, 1, "TTL 3 minus two hops");
    // The tap never acks, so put the sender out of its misery.
    topology.cancel.cancel();
    let outcome = send.await.expect("the send task must not panic");
    assert!(matches!(outcome, Err(SendError::Cancelled)));

    // Not enough budget: TTL 1 is spent after the first router, and the
    // second discards the packet instead of forwarding it.
    let topology = Topology::new();
    topology.start_router(5000, &[("SERVIDOR", 5001), ("HOST_A", 5002)]);
    topology.start_router(5001, &[("SERVIDOR", 6000), ("HOST_A", 5000)]);
    let tap = topology.tap(6000);
    let (mut client, _) =
        topology.endpoint_with("HOST_A", 5002, 5000, |config| config.initial_ttl(1));

    let cancel = topology.cancel.clone();
    let send = tokio::spawn(async move {
        client
            .send(
                Vip::from("SERVIDOR"),
                ChatPayload::new("ana", "too far").to_value(),
            )
            .await
    });

    // Let the client burn through a few retransmissions, then cancel.
    let starved = timeout(Duration::from_millis(300), tap.receive()).await;
    assert!(starved.is_err(), "an expired packet must never arrive");
    cancel.cancel();
    let outcome = send.await.expect("the send task must not panic");
    assert!(
        matches!(outcome, Err(SendError::Cancelled)),
        "only the harness ends an unacknowledgeable send"
    );
}
