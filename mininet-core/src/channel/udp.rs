use super::{Channel, ChannelError, Datagram};
use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::net::UdpSocket;

/// Largest datagram we are prepared to receive.
const BUFFER_SIZE: usize = 65535;

/// A real UDP socket. One per process; the same socket carries outbound
/// traffic and inbound acknowledgments.
pub struct UdpChannel {
    socket: UdpSocket,
    local: SocketAddr,
}

impl UdpChannel {
    /// Binds a datagram socket on the given address.
    pub async fn bind(addr: SocketAddr) -> Result<Self, ChannelError> {
        let socket = UdpSocket::bind(addr).await?;
        let local = socket.local_addr()?;
        Ok(Self { socket, local })
    }
}

#[async_trait]
impl Channel for UdpChannel {
    async fn transmit(&self, bytes: Vec<u8>, to: SocketAddr) -> Result<(), ChannelError> {
        self.socket.send_to(&bytes, to).await?;
        Ok(())
    }

    async fn receive(&self) -> Result<Datagram, ChannelError> {
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let (len, from) = self.socket.recv_from(&mut buffer).await?;
        buffer.truncate(len);
        Ok(Datagram {
            bytes: buffer,
            from,
        })
    }

    fn local_addr(&self) -> SocketAddr {
        self.local
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn datagrams_travel_between_sockets() {
        let a = UdpChannel::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let b = UdpChannel::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();

        a.transmit(b"ping".to_vec(), b.local_addr()).await.unwrap();
        let received = b.receive().await.unwrap();
        assert_eq!(received.bytes, b"ping");
        assert_eq!(received.from, a.local_addr());
    }
}
