//! Static address and routing tables.
//!
//! Both tables are built once at configuration time and shared read-only
//! (wrap them in `Arc`). Nothing in the stack mutates them afterwards, so
//! they can cross task boundaries without synchronization.

use crate::frame::Mac;
use crate::packet::Vip;
use rustc_hash::FxHashMap;
use std::net::SocketAddr;
use thiserror::Error as ThisError;

/// Static station → MAC mapping, the simulated stand-in for ARP.
#[derive(Debug, Clone, Default)]
pub struct AddressTable {
    entries: FxHashMap<Vip, Mac>,
}

impl AddressTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The four stations of the default topology.
    pub fn default_stations() -> Self {
        let mut table = Self::new();
        table.insert(
            Vip::from("HOST_A"),
            Mac::new([0xaa, 0xaa, 0xaa, 0xaa, 0xaa, 0x01]),
        );
        table.insert(
            Vip::from("HOST_B"),
            Mac::new([0xbb, 0xbb, 0xbb, 0xbb, 0xbb, 0x02]),
        );
        table.insert(
            Vip::from("SERVIDOR"),
            Mac::new([0xcc, 0xcc, 0xcc, 0xcc, 0xcc, 0x03]),
        );
        table.insert(
            Vip::from("ROTEADOR"),
            Mac::new([0xdd, 0xdd, 0xdd, 0xdd, 0xdd, 0x04]),
        );
        table
    }

    pub fn insert(&mut self, vip: Vip, mac: Mac) {
        self.entries.insert(vip, mac);
    }

    /// Resolves a station's MAC, falling back to the broadcast sentinel for
    /// stations the table does not know.
    pub fn resolve(&self, vip: &Vip) -> Mac {
        self.entries.get(vip).copied().unwrap_or(Mac::BROADCAST)
    }
}

/// Static destination station → next-hop socket address mapping, consulted
/// by the router on every packet it forwards.
#[derive(Debug, Clone)]
pub struct RoutingTable {
    routes: FxHashMap<Vip, SocketAddr>,
}

impl RoutingTable {
    /// Builds the table from configured entries.
    ///
    /// An empty table is refused outright: a router with no routes can only
    /// discard traffic, which is a configuration mistake better caught at
    /// startup than discovered one timeout at a time.
    pub fn new(
        entries: impl IntoIterator<Item = (Vip, SocketAddr)>,
    ) -> Result<Self, TableError> {
        let routes: FxHashMap<_, _> = entries.into_iter().collect();
        if routes.is_empty() {
            return Err(TableError::EmptyRoutingTable);
        }
        Ok(Self { routes })
    }

    /// Where packets for `vip` should be sent next, if anywhere.
    pub fn next_hop(&self, vip: &Vip) -> Option<SocketAddr> {
        self.routes.get(vip).copied()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Vip, &SocketAddr)> {
        self.routes.iter()
    }
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum TableError {
    #[error("the routing table has no entries")]
    EmptyRoutingTable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_stations_resolve_to_broadcast() {
        let table = AddressTable::default_stations();
        assert_ne!(table.resolve(&Vip::from("HOST_A")), Mac::BROADCAST);
        assert_eq!(table.resolve(&Vip::from("GHOST")), Mac::BROADCAST);
    }

    #[test]
    fn empty_routing_table_is_refused() {
        assert_eq!(
            RoutingTable::new([]).unwrap_err(),
            TableError::EmptyRoutingTable
        );
    }

    #[test]
    fn next_hop_lookup() {
        let destination: SocketAddr = "127.0.0.1:6000".parse().unwrap();
        let table = RoutingTable::new([(Vip::from("SERVIDOR"), destination)]).unwrap();
        assert_eq!(table.next_hop(&Vip::from("SERVIDOR")), Some(destination));
        assert_eq!(table.next_hop(&Vip::from("HOST_A")), None);
    }
}
