//! The network-layer envelope: logical addressing and a hop budget.

use crate::frame::FrameError;
use crate::segment::Segment;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Hop budget stamped on every freshly minted packet.
pub const INITIAL_TTL: u8 = 8;

/// A logical station identifier, independent of any physical transport
/// address. Routing and duplicate detection are keyed by this, never by
/// socket addresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vip(String);

impl Vip {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Vip {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Vip {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

/// A network packet: source and destination stations, remaining hops, and
/// the encapsulated transport segment.
///
/// The router is the only component that mutates a packet, and only to
/// decrement `ttl` by one per hop. A packet whose `ttl` reaches zero is
/// never forwarded again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    pub src_vip: Vip,
    pub dst_vip: Vip,
    pub ttl: u8,
    pub data: Segment,
}

impl Packet {
    pub fn new(src_vip: Vip, dst_vip: Vip, ttl: u8, data: Segment) -> Self {
        Self {
            src_vip,
            dst_vip,
            ttl,
            data,
        }
    }

    /// The canonical byte form of this packet, which the frame check
    /// sequence is computed over. Any decoder can re-serialize a parsed
    /// packet and arrive at the same bytes, so the checksum is verifiable
    /// independently of whoever produced it.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, FrameError> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::SeqBit;
    use serde_json::json;

    #[test]
    fn canonical_bytes_are_stable() {
        let packet = Packet::new(
            Vip::from("HOST_A"),
            Vip::from("SERVIDOR"),
            INITIAL_TTL,
            Segment::data(SeqBit::ZERO, json!({"message": "oi"})),
        );
        assert_eq!(
            packet.canonical_bytes().unwrap(),
            packet.clone().canonical_bytes().unwrap()
        );
    }

    #[test]
    fn reserializing_a_parsed_packet_is_canonical() {
        let packet = Packet::new(
            Vip::from("HOST_B"),
            Vip::from("SERVIDOR"),
            3,
            Segment::ack(SeqBit::ONE),
        );
        let bytes = packet.canonical_bytes().unwrap();
        let reparsed: Packet = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(reparsed.canonical_bytes().unwrap(), bytes);
    }
}
