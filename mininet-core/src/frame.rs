//! The link-layer envelope and its codec.
//!
//! A frame wraps one packet for exactly one hop: fictitious hardware
//! addresses on the outside, a CRC-32 frame check sequence over the
//! serialized packet on the inside. The checksum is per-hop, not
//! end-to-end: every participant that puts a packet back on the wire
//! (originating station or router) computes a fresh one.

use crate::packet::Packet;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use thiserror::Error as ThisError;

/// A fictitious hardware address, rendered in the usual colon-hex form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mac([u8; 6]);

impl Mac {
    /// The unknown-station sentinel: frames for stations missing from the
    /// address table are addressed here.
    pub const BROADCAST: Self = Self([0xff; 6]);

    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub const fn octets(self) -> [u8; 6] {
        self.0
    }
}

impl Display for Mac {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl FromStr for Mac {
    type Err = MacParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut parts = text.split(':');
        for octet in octets.iter_mut() {
            let part = parts
                .next()
                .ok_or_else(|| MacParseError(text.to_owned()))?;
            *octet =
                u8::from_str_radix(part, 16).map_err(|_| MacParseError(text.to_owned()))?;
        }
        if parts.next().is_some() {
            return Err(MacParseError(text.to_owned()));
        }
        Ok(Self(octets))
    }
}

impl Serialize for Mac {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Mac {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, ThisError, Clone, PartialEq, Eq)]
#[error("malformed MAC address {0:?}, expected six colon-separated hex octets")]
pub struct MacParseError(String);

/// The link envelope put on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub src_mac: Mac,
    pub dst_mac: Mac,
    pub data: Packet,
    pub crc32: u32,
}

/// A frame that parsed structurally, along with the verdict of its
/// checksum. Callers decide what to do with a damaged frame; on this stack
/// the answer is always a silent drop.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub frame: Frame,
    pub integrity_ok: bool,
}

impl Frame {
    /// Wraps `data` for one hop, computing a fresh checksum over its
    /// canonical byte form. The previous hop's checksum, if any, is gone:
    /// it proved integrity for that hop only.
    pub fn build(src_mac: Mac, dst_mac: Mac, data: Packet) -> Result<Self, FrameError> {
        let crc32 = checksum(&data)?;
        Ok(Self {
            src_mac,
            dst_mac,
            data,
            crc32,
        })
    }

    /// Serializes the whole envelope for transmission.
    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Attempts to reconstruct a frame from raw bytes.
    ///
    /// Bytes too damaged to parse at all come back as `None`. A
    /// structurally sound frame whose recomputed checksum disagrees with
    /// the transmitted one comes back with `integrity_ok == false`.
    pub fn decode(bytes: &[u8]) -> Option<DecodedFrame> {
        let frame: Frame = serde_json::from_slice(bytes).ok()?;
        let integrity_ok = checksum(&frame.data)
            .map(|computed| computed == frame.crc32)
            .unwrap_or(false);
        Some(DecodedFrame {
            frame,
            integrity_ok,
        })
    }
}

fn checksum(packet: &Packet) -> Result<u32, FrameError> {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&packet.canonical_bytes()?);
    Ok(hasher.finalize())
}

#[derive(Debug, ThisError)]
pub enum FrameError {
    #[error("frame serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{Vip, INITIAL_TTL};
    use crate::segment::{Segment, SeqBit};
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};
    use serde_json::json;

    fn sample_frame() -> Frame {
        let packet = Packet::new(
            Vip::from("HOST_A"),
            Vip::from("SERVIDOR"),
            INITIAL_TTL,
            Segment::data(SeqBit::ZERO, json!({"message": "hello"})),
        );
        Frame::build(
            Mac::new([0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0x01]),
            Mac::new([0xdd, 0xdd, 0xdd, 0xdd, 0xdd, 0x04]),
            packet,
        )
        .unwrap()
    }

    #[test]
    fn mac_display_and_parse_agree() {
        let mac = Mac::new([0xaa, 0xbb, 0x0c, 0x01, 0x02, 0x03]);
        let text = mac.to_string();
        assert_eq!(text, "AA:BB:0C:01:02:03");
        assert_eq!(text.parse::<Mac>().unwrap(), mac);
        assert!("AA:BB".parse::<Mac>().is_err());
        assert!("AA:BB:0C:01:02:03:04".parse::<Mac>().is_err());
        assert!("ZZ:BB:0C:01:02:03".parse::<Mac>().is_err());
    }

    #[test]
    fn encode_decode_round_trip() -> anyhow::Result<()> {
        let frame = sample_frame();
        let bytes = frame.encode()?;
        let decoded = Frame::decode(&bytes).expect("a clean frame parses");
        assert!(decoded.integrity_ok);
        assert_eq!(decoded.frame, frame);
        Ok(())
    }

    #[test]
    fn garbage_fails_soft() {
        assert!(Frame::decode(b"not even json").is_none());
        assert!(Frame::decode(b"").is_none());
        assert!(Frame::decode(br#"{"src_mac": "AA:AA:AA:AA:AA:01"}"#).is_none());
    }

    #[test]
    fn stale_checksum_is_reported() {
        let mut frame = sample_frame();
        frame.crc32 ^= 0xdead_beef;
        let bytes = frame.encode().unwrap();
        let decoded = Frame::decode(&bytes).unwrap();
        assert!(!decoded.integrity_ok);
    }

    #[test]
    fn bit_flips_in_the_payload_region_are_caught() {
        let frame = sample_frame();
        let bytes = frame.encode().unwrap();

        // The packet serializes identically inline and standalone, so its
        // canonical bytes locate the protected region inside the frame.
        let packet_bytes = frame.data.canonical_bytes().unwrap();
        let start = bytes
            .windows(packet_bytes.len())
            .position(|window| window == packet_bytes)
            .expect("encoded frame embeds the canonical packet bytes");

        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..200 {
            let mut damaged = bytes.clone();
            let index = start + rng.gen_range(0..packet_bytes.len());
            let bit = rng.gen_range(0..8);
            damaged[index] ^= 1 << bit;
            match Frame::decode(&damaged) {
                // Severe corruption: the envelope no longer parses.
                None => {}
                // Partial corruption: either the checksum catches it, or
                // the flip bounced the bytes back to a packet identical to
                // the original, which is not corruption at all.
                Some(decoded) => {
                    if decoded.integrity_ok {
                        assert_eq!(decoded.frame.data, frame.data);
                    }
                }
            }
        }
    }
}
