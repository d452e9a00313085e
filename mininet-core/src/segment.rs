//! The transport-layer envelope.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// A one-bit sequence number for the alternating-bit protocol.
///
/// Stop-and-wait permits a single outstanding segment, so one bit is enough
/// to tell a fresh segment from a retransmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SeqBit(u8);

impl SeqBit {
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(1);

    /// The other sequence bit.
    pub const fn flip(self) -> Self {
        Self(1 - self.0)
    }

    pub const fn as_u8(self) -> u8 {
        self.0
    }
}

impl Display for SeqBit {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for SeqBit {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.0)
    }
}

impl<'de> Deserialize<'de> for SeqBit {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match u8::deserialize(deserializer)? {
            0 => Ok(Self::ZERO),
            1 => Ok(Self::ONE),
            other => Err(serde::de::Error::custom(format!(
                "sequence number must be 0 or 1, got {other}"
            ))),
        }
    }
}

/// A transport segment: one sequence bit, an acknowledgment flag, and an
/// opaque application payload.
///
/// Acknowledgments never carry a payload; the constructors enforce this, so
/// building segments through them keeps the invariant without runtime
/// checks elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub seq_num: SeqBit,
    pub is_ack: bool,
    pub payload: Option<serde_json::Value>,
}

impl Segment {
    /// A data segment carrying an application payload.
    pub fn data(seq_num: SeqBit, payload: serde_json::Value) -> Self {
        Self {
            seq_num,
            is_ack: false,
            payload: Some(payload),
        }
    }

    /// An acknowledgment for the given sequence bit.
    pub fn ack(seq_num: SeqBit) -> Self {
        Self {
            seq_num,
            is_ack: true,
            payload: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn seq_bit_alternates() {
        assert_eq!(SeqBit::ZERO.flip(), SeqBit::ONE);
        assert_eq!(SeqBit::ONE.flip(), SeqBit::ZERO);
        assert_eq!(SeqBit::ZERO.flip().flip(), SeqBit::ZERO);
    }

    #[test]
    fn acks_carry_no_payload() {
        let ack = Segment::ack(SeqBit::ONE);
        assert!(ack.is_ack);
        assert!(ack.payload.is_none());
    }

    #[test]
    fn data_segments_round_trip() {
        let segment = Segment::data(SeqBit::ZERO, json!({"message": "hi"}));
        let bytes = serde_json::to_vec(&segment).unwrap();
        let back: Segment = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, segment);
    }

    #[test]
    fn rejects_out_of_range_sequence_numbers() {
        let result: Result<Segment, _> =
            serde_json::from_str(r#"{"seq_num": 2, "is_ack": false, "payload": null}"#);
        assert!(result.is_err());
    }
}
