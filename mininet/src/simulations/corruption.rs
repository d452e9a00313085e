//! Bit flips on the wire are absorbed by checksum-and-retransmit.

use super::support::{addr, Topology};
use crate::chat::ChatPayload;
use mininet_core::channel::{NoiseConfig, NoisyChannel};
use mininet_core::endpoint::NodeConfig;
use mininet_core::packet::Vip;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// The client's outbound channel flips a bit in roughly a third of its
/// datagrams. Damaged frames die at the router's checksum with no reply;
/// the client's timeout keeps retransmitting until a clean copy makes the
/// round trip. The server still displays the message exactly once.
pub async fn corruption() {
    let topology = Topology::new();
    topology.start_router(5000, &[("HOST_A", 5001), ("SERVIDOR", 6000)]);

    let client_channel = Arc::new(NoisyChannel::new(
        Arc::new(topology.tap(5001)),
        NoiseConfig {
            corruption_rate: 0.35,
            ..NoiseConfig::default()
        },
    ));
    let (mut client, _) = topology.endpoint_on(
        NodeConfig::new(Vip::from("HOST_A"), addr(5000))
            .ack_timeout(Duration::from_millis(80)),
        client_channel,
    );
    let (_server, mut deliveries) = topology.endpoint("SERVIDOR", 6000, 5000);

    let report = client
        .send(
            Vip::from("SERVIDOR"),
            ChatPayload::new("ana", "radio check").to_value(),
        )
        .await
        .expect("retransmission outlasts a lossy channel");
    assert!(report.attempts >= 1);

    let delivery = timeout(Duration::from_secs(5), deliveries.recv())
        .await
        .expect("the message never survived the noise")
        .expect("the delivery queue closed early");
    let chat = ChatPayload::from_value(&delivery.payload).expect("a chat payload");
    assert_eq!(chat.message, "radio check");

    let extra = timeout(Duration::from_millis(100), deliveries.recv()).await;
    assert!(extra.is_err(), "retransmissions must not multiply deliveries");
}

#[cfg(test)]
mod tests {
    #[tokio::test]
    async fn simulation() {
        tokio::time::timeout(std::time::Duration::from_secs(30), super::corruption())
            .await
            .expect("the scenario must converge well before this limit")
    }
}
