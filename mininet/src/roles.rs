//! The three station roles, each a thin application over the core stack.
//!
//! All of the protocol behavior lives in `mininet-core`; these functions
//! only wire configuration, sockets and the console together.

use crate::chat::ChatPayload;
use crate::cli::NoiseArgs;
use mininet_core::arq::SendError;
use mininet_core::channel::{Channel, NoisyChannel, UdpChannel};
use mininet_core::endpoint::{Endpoint, NodeConfig};
use mininet_core::packet::Vip;
use mininet_core::router::Router;
use mininet_core::tables::{AddressTable, RoutingTable, TableError};
use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

/// Binds a UDP socket on `port` and wraps it with the configured noise.
async fn noisy_udp(
    port: u16,
    noise: NoiseArgs,
) -> Result<Arc<dyn Channel>, mininet_core::ChannelError> {
    let udp = UdpChannel::bind(([127, 0, 0, 1], port).into()).await?;
    Ok(Arc::new(NoisyChannel::new(
        Arc::new(udp),
        noise.to_config(),
    )))
}

/// Cancels the returned token when the user interrupts the process.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!(target: "app", "interrupted, shutting down");
            trigger.cancel();
        }
    });
    cancel
}

/// The interactive chat sender.
pub async fn run_client(
    port: u16,
    vip: String,
    router: SocketAddr,
    to: String,
    name: String,
    timeout: Duration,
    noise: NoiseArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let addresses = Arc::new(AddressTable::default_stations());
    let channel = noisy_udp(port, noise).await?;
    let cancel = cancel_on_ctrl_c();

    let vip = Vip::new(vip);
    let dst = Vip::new(to);
    tracing::info!(
        target: "app",
        %vip,
        mac = %addresses.resolve(&vip),
        port,
        "client up"
    );
    tracing::info!(target: "app", %dst, %router, "sending via router");

    let config = NodeConfig::new(vip, router).ack_timeout(timeout);
    let (mut endpoint, mut deliveries) =
        Endpoint::attach(config, addresses, channel, cancel.clone());

    // Unsolicited inbound traffic (another station chatting at us) gets
    // printed from its own task so the send loop never has to poll for it.
    tokio::spawn(async move {
        while let Some(delivery) = deliveries.recv().await {
            match ChatPayload::from_value(&delivery.payload) {
                Some(chat) => println!("{}", chat.display_line()),
                None => println!("[{}] {}", delivery.from, delivery.payload),
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{name}> ");
        std::io::stdout().flush()?;
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }

        let payload = ChatPayload::new(name.clone(), text);
        match endpoint.send(dst.clone(), payload.to_value()).await {
            Ok(report) => {
                tracing::info!(
                    target: "app",
                    attempts = report.attempts,
                    "message delivered"
                );
            }
            Err(SendError::Cancelled) => break,
            Err(error) => return Err(error.into()),
        }
    }
    tracing::info!(target: "app", "client done");
    Ok(())
}

/// The display endpoint.
pub async fn run_server(
    port: u16,
    vip: String,
    router: SocketAddr,
    noise: NoiseArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let addresses = Arc::new(AddressTable::default_stations());
    let channel = noisy_udp(port, noise).await?;
    let cancel = cancel_on_ctrl_c();

    let vip = Vip::new(vip);
    tracing::info!(
        target: "app",
        %vip,
        mac = %addresses.resolve(&vip),
        port,
        %router,
        "server up, waiting for messages"
    );

    let config = NodeConfig::new(vip, router);
    let (_endpoint, mut deliveries) =
        Endpoint::attach(config, addresses, channel, cancel.clone());

    loop {
        let delivery = tokio::select! {
            _ = cancel.cancelled() => break,
            delivery = deliveries.recv() => delivery,
        };
        let Some(delivery) = delivery else { break };
        match ChatPayload::from_value(&delivery.payload) {
            Some(chat) => {
                tracing::info!(target: "app", from = %delivery.from, "message delivered");
                println!("{}", chat.display_line());
            }
            None => println!("[{}] {}", delivery.from, delivery.payload),
        }
    }
    tracing::info!(target: "app", "server done");
    Ok(())
}

/// The packet forwarder.
pub async fn run_router(
    port: u16,
    routes: Vec<(String, SocketAddr)>,
    noise: NoiseArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let routes = if routes.is_empty() {
        prompt_for_routes()?
    } else {
        routes
    };
    let routes = RoutingTable::new(
        routes
            .into_iter()
            .map(|(vip, addr)| (Vip::new(vip), addr)),
    )?;
    for (vip, addr) in routes.iter() {
        tracing::info!(target: "router", %vip, %addr, "route");
    }

    let addresses = Arc::new(AddressTable::default_stations());
    let mac = addresses.resolve(&Vip::from("ROTEADOR"));
    let channel = noisy_udp(port, noise).await?;
    let cancel = cancel_on_ctrl_c();

    let router = Router::new(mac, Arc::new(routes), addresses, channel);
    router.run(cancel).await?;
    tracing::info!(target: "router", "router done");
    Ok(())
}

/// The original's interactive table entry: one "VIP IP PORT" line at a
/// time, an empty line ends the list. Runs before the router starts, so
/// plain blocking stdin is fine here.
fn prompt_for_routes() -> Result<Vec<(String, SocketAddr)>, TableError> {
    println!("Static routing table. One entry per line: VIP IP PORT");
    println!("Example: SERVIDOR 127.0.0.1 6000");
    println!("Empty line to finish.");

    let mut routes = Vec::new();
    let stdin = std::io::stdin();
    loop {
        print!("route> ");
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        if stdin.read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        let [vip, ip, port] = parts[..] else {
            println!("  bad entry, use: VIP IP PORT");
            continue;
        };
        let Ok(addr) = format!("{ip}:{port}").parse::<SocketAddr>() else {
            println!("  bad address or port");
            continue;
        };
        println!("  {vip} -> {addr}");
        routes.push((vip.to_owned(), addr));
    }
    if routes.is_empty() {
        return Err(TableError::EmptyRoutingTable);
    }
    Ok(routes)
}
