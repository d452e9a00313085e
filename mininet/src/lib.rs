//! The mininet application layer: chat payloads, the three station roles
//! (client, server, router), the command line that launches them, and the
//! in-process simulations that double as end-to-end tests.

pub mod chat;
pub mod cli;
pub mod roles;
pub mod simulations;
