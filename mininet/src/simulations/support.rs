//! Shared scaffolding for the simulated topologies.

use async_trait::async_trait;
use mininet_core::channel::{Channel, ChannelError, Datagram, Hub, MemoryChannel};
use mininet_core::endpoint::{Delivery, Endpoint, NodeConfig};
use mininet_core::packet::Vip;
use mininet_core::router::Router;
use mininet_core::tables::{AddressTable, RoutingTable};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub fn addr(port: u16) -> SocketAddr {
    ([127, 0, 0, 1], port).into()
}

/// One in-process internet: a hub, the default address table, and a
/// cancellation token that tears everything down when the simulation is
/// dropped.
pub struct Topology {
    pub hub: Arc<Hub>,
    pub addresses: Arc<AddressTable>,
    pub cancel: CancellationToken,
    _guard: tokio_util::sync::DropGuard,
}

impl Topology {
    pub fn new() -> Self {
        let cancel = CancellationToken::new();
        Self {
            hub: Hub::new(),
            addresses: Arc::new(AddressTable::default_stations()),
            cancel: cancel.clone(),
            _guard: cancel.drop_guard(),
        }
    }

    /// Starts a router on `port` with the given routes.
    pub fn start_router(&self, port: u16, routes: &[(&str, u16)]) {
        let routes = RoutingTable::new(
            routes
                .iter()
                .map(|(vip, port)| (Vip::from(*vip), addr(*port))),
        )
        .expect("simulated routers are configured with routes");
        let router = Router::new(
            self.addresses.resolve(&Vip::from("ROTEADOR")),
            Arc::new(routes),
            self.addresses.clone(),
            Arc::new(self.hub.attach(addr(port))),
        );
        let cancel = self.cancel.clone();
        tokio::spawn(async move { router.run(cancel).await });
    }

    /// Attaches a station endpoint on `port`, talking to the router at
    /// `router_port`, with a test-friendly short ack timeout.
    pub fn endpoint(
        &self,
        vip: &str,
        port: u16,
        router_port: u16,
    ) -> (Endpoint, mpsc::Receiver<Delivery>) {
        self.endpoint_with(vip, port, router_port, |config| config)
    }

    /// Same as [`endpoint`](Self::endpoint) but lets the scenario adjust
    /// the configuration (TTL, timeout) before attaching.
    pub fn endpoint_with(
        &self,
        vip: &str,
        port: u16,
        router_port: u16,
        configure: impl FnOnce(NodeConfig) -> NodeConfig,
    ) -> (Endpoint, mpsc::Receiver<Delivery>) {
        let config = configure(
            NodeConfig::new(Vip::from(vip), addr(router_port))
                .ack_timeout(Duration::from_millis(80)),
        );
        let channel = Arc::new(self.hub.attach(addr(port)));
        self.endpoint_on(config, channel)
    }

    /// Attaches a station over an arbitrary channel, for scenarios that
    /// wrap the channel with noise or targeted fault injection.
    pub fn endpoint_on(
        &self,
        config: NodeConfig,
        channel: Arc<dyn Channel>,
    ) -> (Endpoint, mpsc::Receiver<Delivery>) {
        Endpoint::attach(config, self.addresses.clone(), channel, self.cancel.clone())
    }

    /// A raw attachment for scenarios that want to watch the wire itself.
    pub fn tap(&self, port: u16) -> MemoryChannel {
        self.hub.attach(addr(port))
    }
}

impl Default for Topology {
    fn default() -> Self {
        Self::new()
    }
}

/// A channel that swallows exactly one transmission, the `nth` (counting
/// from 1), and delegates everything else. Deterministic loss for the
/// dropped-acknowledgment scenario.
pub struct DropNth<C> {
    inner: C,
    nth: u32,
    count: AtomicU32,
}

impl<C> DropNth<C> {
    pub fn new(inner: C, nth: u32) -> Self {
        Self {
            inner,
            nth,
            count: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl<C: Channel> Channel for DropNth<C> {
    async fn transmit(&self, bytes: Vec<u8>, to: SocketAddr) -> Result<(), ChannelError> {
        let sent = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        if sent == self.nth {
            tracing::warn!(target: "channel", %to, sent, "dropping this transmission");
            return Ok(());
        }
        self.inner.transmit(bytes, to).await
    }

    async fn receive(&self) -> Result<Datagram, ChannelError> {
        self.inner.receive().await
    }

    fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr()
    }
}
