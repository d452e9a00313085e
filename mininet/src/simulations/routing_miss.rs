//! Traffic for a destination the router has never heard of.

use super::support::Topology;
use crate::chat::ChatPayload;
use mininet_core::arq::SendError;
use mininet_core::packet::Vip;
use std::time::Duration;
use tokio::time::timeout;

/// The router's table knows HOST_A and SERVIDOR; the client addresses a
/// station that is in neither table. The router discards every copy
/// silently, no endpoint ever sees the payload, and the sender retries
/// until the harness cancels it.
pub async fn routing_miss() {
    let topology = Topology::new();
    topology.start_router(5000, &[("HOST_A", 5001), ("SERVIDOR", 6000)]);
    let (mut client, _) = topology.endpoint("HOST_A", 5001, 5000);
    let (_server, mut deliveries) = topology.endpoint("SERVIDOR", 6000, 5000);

    let cancel = topology.cancel.clone();
    let send = tokio::spawn(async move {
        client
            .send(
                Vip::from("FANTASMA"),
                ChatPayload::new("ana", "anyone there?").to_value(),
            )
            .await
    });

    // Give the client a few retransmission rounds to prove the point.
    let arrived = timeout(Duration::from_millis(300), deliveries.recv()).await;
    assert!(
        arrived.is_err(),
        "a packet for an unknown destination must reach no application"
    );
    cancel.cancel();
    let outcome = send.await.expect("the send task must not panic");
    assert!(matches!(outcome, Err(SendError::Cancelled)));
}

#[cfg(test)]
mod tests {
    #[tokio::test]
    async fn simulation() {
        super::routing_miss().await
    }
}
