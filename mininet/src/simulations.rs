//! End-to-end scenarios over the in-process hub.
//!
//! Each simulation is an async function that builds a topology, runs the
//! scenario, and asserts what the stack promised; a `#[tokio::test]`
//! wrapper in the same file runs it under `cargo test`. Because the hub
//! speaks `SocketAddr`, these topologies use the very same routing tables
//! a deployment over real UDP sockets would.

pub mod basic_delivery;
pub mod corruption;
pub mod dropped_ack;
pub mod routing_miss;
pub mod support;
pub mod ttl_expiry;
