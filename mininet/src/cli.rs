//! Command-line surface for the three station roles.

use clap::{Args, Parser, Subcommand};
use mininet_core::channel::NoiseConfig;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "mininet", about = "A miniature layered network stack over UDP")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactive sender: reads lines and delivers them reliably.
    Client {
        /// Port this station binds on.
        #[arg(long)]
        port: u16,
        /// This station's logical address, e.g. HOST_A.
        #[arg(long)]
        vip: String,
        /// The router's address, e.g. 127.0.0.1:5000.
        #[arg(long)]
        router: SocketAddr,
        /// Logical address the messages are for.
        #[arg(long, default_value = "SERVIDOR")]
        to: String,
        /// Display name stamped on every chat message.
        #[arg(long)]
        name: String,
        /// Seconds to wait for an acknowledgment before retransmitting.
        #[arg(long, default_value_t = 3.0)]
        timeout: f64,
        #[command(flatten)]
        noise: NoiseArgs,
    },
    /// Display endpoint: prints every delivered message.
    Server {
        #[arg(long)]
        port: u16,
        #[arg(long, default_value = "SERVIDOR")]
        vip: String,
        #[arg(long)]
        router: SocketAddr,
        #[command(flatten)]
        noise: NoiseArgs,
    },
    /// Static-table packet forwarder.
    Router {
        #[arg(long)]
        port: u16,
        /// A routing entry, VIP=IP:PORT. Repeatable. With no entries the
        /// router prompts for them interactively.
        #[arg(long = "route", value_parser = parse_route)]
        routes: Vec<(String, SocketAddr)>,
        #[command(flatten)]
        noise: NoiseArgs,
    },
}

/// Fault-injection flags shared by every role; each process damages its
/// own outbound traffic, like the original noisy send primitive.
#[derive(Debug, Args, Clone, Copy)]
pub struct NoiseArgs {
    /// Probability that an outbound datagram is dropped.
    #[arg(long, default_value_t = 0.0)]
    pub loss: f64,
    /// Probability that one bit of an outbound datagram is flipped.
    #[arg(long, default_value_t = 0.0)]
    pub corruption: f64,
    /// Probability that an outbound datagram is delayed past later ones.
    #[arg(long, default_value_t = 0.0)]
    pub reorder: f64,
}

impl NoiseArgs {
    pub fn to_config(self) -> NoiseConfig {
        NoiseConfig {
            loss_rate: self.loss,
            corruption_rate: self.corruption,
            reorder_rate: self.reorder,
            ..NoiseConfig::default()
        }
    }
}

pub fn parse_route(text: &str) -> Result<(String, SocketAddr), String> {
    let (vip, addr) = text
        .split_once('=')
        .ok_or_else(|| format!("expected VIP=IP:PORT, got {text:?}"))?;
    if vip.is_empty() {
        return Err(format!("empty VIP in route {text:?}"));
    }
    let addr: SocketAddr = addr
        .parse()
        .map_err(|_| format!("bad socket address in route {text:?}"))?;
    Ok((vip.to_owned(), addr))
}

pub fn timeout_from_secs(seconds: f64) -> Duration {
    Duration::from_millis((seconds * 1000.0) as u64)
}
