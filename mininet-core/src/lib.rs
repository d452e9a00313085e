//! Mininet, a miniature layered network stack over an unreliable datagram
//! channel.
//!
//! The stack exists to make reliable-data-transfer and routing concepts
//! visible: every station narrates what each layer does to a message as it
//! travels application → transport → network → link and back up on the far
//! side. Three mechanisms carry all of the protocol logic:
//!
//! - a stop-and-wait automatic-repeat-request engine at the transport
//!   boundary ([`arq`]),
//! - a CRC-32 frame check sequence at the link boundary ([`frame`]),
//! - TTL-bounded static routing at the network boundary ([`router`]).
//!
//! # Organization
//!
//! - [`Segment`], [`Packet`] and [`Frame`] are the transport, network and
//!   link envelopes
//! - [`ArqSender`] and [`ArqReceiver`] implement the alternating-bit
//!   protocol
//! - [`Router`] forwards packets between stations using static tables
//! - [`Endpoint`] composes the whole stack for a single station
//! - [`channel`] supplies the transmission media: real UDP, an in-process
//!   hub for simulations, and a fault-injecting wrapper around either

mod logging;

pub mod arq;
pub use arq::{ArqReceiver, ArqSender, SendError, SendReport};

pub mod channel;
pub use channel::{Channel, ChannelError, Datagram};

pub mod endpoint;
pub use endpoint::{Delivery, Endpoint, NodeConfig};

pub mod frame;
pub use frame::{Frame, FrameError, Mac};

pub mod packet;
pub use packet::{Packet, Vip};

pub mod router;
pub use router::Router;

pub mod segment;
pub use segment::{Segment, SeqBit};

pub mod tables;
pub use tables::{AddressTable, RoutingTable, TableError};
