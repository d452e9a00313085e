//! Layer-tagged narration of stack events.
//!
//! Wrapper functions around `tracing` for the events every station emits
//! the same way, so the link and network layers narrate identically in the
//! endpoint and in the router. One target per layer; the subscriber
//! installed by the binary decides colors and formatting. No protocol
//! behavior depends on anything in here.

use crate::frame::Mac;
use crate::packet::Packet;
use tracing::{event, Level};

/// Raw bytes that would not parse into a frame at all.
pub(crate) fn frame_garbled_event(len: usize) {
    event!(
        target: "link",
        Level::ERROR,
        len,
        "unparseable frame discarded"
    );
}

/// A frame that parsed but failed its checksum. Dropped silently on the
/// wire; recovery belongs to the original sender's timeout.
pub(crate) fn frame_corrupt_event(src: Mac, dst: Mac) {
    event!(
        target: "link",
        Level::ERROR,
        src = %src,
        dst = %dst,
        "CRC mismatch, frame discarded"
    );
}

/// A frame that passed its checksum.
pub(crate) fn frame_ok_event(src: Mac, dst: Mac) {
    event!(target: "link", Level::DEBUG, src = %src, dst = %dst, "CRC ok");
}

/// A fresh frame was put together for the next hop.
pub(crate) fn frame_built_event(src: Mac, dst: Mac) {
    event!(
        target: "link",
        Level::DEBUG,
        src = %src,
        dst = %dst,
        "frame built with fresh CRC-32"
    );
}

/// Network-layer summary of a packet in hand.
pub(crate) fn packet_event(packet: &Packet) {
    let kind = if packet.data.is_ack { "ACK" } else { "DATA" };
    event!(
        target: "net",
        Level::DEBUG,
        kind,
        src = %packet.src_vip,
        dst = %packet.dst_vip,
        ttl = packet.ttl,
        "packet"
    );
}
