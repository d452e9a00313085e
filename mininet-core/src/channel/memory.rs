use super::{Channel, ChannelError, Datagram};
use async_trait::async_trait;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Queue depth for each attached endpoint's mailbox.
const MAILBOX_DEPTH: usize = 64;

/// An in-process datagram network.
///
/// Endpoints attach under a `SocketAddr` and exchange datagrams without
/// touching the operating system, which keeps simulations fast and lets
/// them reuse the exact routing tables a real deployment would.
#[derive(Debug, Default)]
pub struct Hub {
    mailboxes: DashMap<SocketAddr, mpsc::Sender<Datagram>>,
}

impl Hub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Attaches a new endpoint at `addr`, displacing any previous occupant
    /// of that address.
    pub fn attach(self: &Arc<Self>, addr: SocketAddr) -> MemoryChannel {
        let (sender, receiver) = mpsc::channel(MAILBOX_DEPTH);
        self.mailboxes.insert(addr, sender);
        MemoryChannel {
            hub: self.clone(),
            local: addr,
            inbox: Mutex::new(receiver),
        }
    }
}

/// One endpoint's attachment to a [`Hub`].
pub struct MemoryChannel {
    hub: Arc<Hub>,
    local: SocketAddr,
    inbox: Mutex<mpsc::Receiver<Datagram>>,
}

#[async_trait]
impl Channel for MemoryChannel {
    async fn transmit(&self, bytes: Vec<u8>, to: SocketAddr) -> Result<(), ChannelError> {
        // Nobody listening at the destination, or a receiver that already
        // hung up, behaves like UDP: the datagram simply vanishes.
        let Some(mailbox) = self.hub.mailboxes.get(&to).map(|entry| entry.clone()) else {
            return Ok(());
        };
        let datagram = Datagram {
            bytes,
            from: self.local,
        };
        let _ = mailbox.send(datagram).await;
        Ok(())
    }

    async fn receive(&self) -> Result<Datagram, ChannelError> {
        self.inbox
            .lock()
            .await
            .recv()
            .await
            .ok_or(ChannelError::Closed)
    }

    fn local_addr(&self) -> SocketAddr {
        self.local
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        ([127, 0, 0, 1], port).into()
    }

    #[tokio::test]
    async fn datagrams_reach_attached_endpoints() {
        let hub = Hub::new();
        let a = hub.attach(addr(5001));
        let b = hub.attach(addr(5002));

        a.transmit(b"oi".to_vec(), addr(5002)).await.unwrap();
        let received = b.receive().await.unwrap();
        assert_eq!(received.bytes, b"oi");
        assert_eq!(received.from, addr(5001));
    }

    #[tokio::test]
    async fn unattached_destinations_swallow_traffic() {
        let hub = Hub::new();
        let a = hub.attach(addr(5001));
        // No error, no delivery, nothing to observe. Just like UDP.
        a.transmit(b"into the void".to_vec(), addr(9999))
            .await
            .unwrap();
    }
}
