//! Datagram channels: the transmission media under the link layer.
//!
//! Everything above this module speaks in whole datagrams addressed by
//! `SocketAddr`. [`UdpChannel`] backs real processes, [`MemoryChannel`]
//! backs in-process simulations, and [`NoisyChannel`] wraps either with
//! configurable fault injection. The stack never has to know which one it
//! is standing on.

mod memory;
mod noisy;
mod udp;

pub use memory::{Hub, MemoryChannel};
pub use noisy::{NoiseConfig, NoisyChannel};
pub use udp::UdpChannel;

use async_trait::async_trait;
use std::net::SocketAddr;
use thiserror::Error as ThisError;

/// A raw datagram and the address it came from.
#[derive(Debug, Clone)]
pub struct Datagram {
    pub bytes: Vec<u8>,
    pub from: SocketAddr,
}

/// An unreliable datagram transmission medium.
#[async_trait]
pub trait Channel: Send + Sync + 'static {
    /// Hands bytes to the medium for delivery to `to`. Delivery is not
    /// guaranteed; an `Ok` return only means the medium accepted the
    /// datagram.
    async fn transmit(&self, bytes: Vec<u8>, to: SocketAddr) -> Result<(), ChannelError>;

    /// Waits for the next inbound datagram.
    async fn receive(&self) -> Result<Datagram, ChannelError>;

    /// The address this channel is reachable at.
    fn local_addr(&self) -> SocketAddr;
}

#[derive(Debug, ThisError)]
pub enum ChannelError {
    #[error("I/O failure on the datagram socket: {0}")]
    Io(#[from] std::io::Error),
    #[error("the channel is closed")]
    Closed,
}
