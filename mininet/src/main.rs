use clap::Parser;
use mininet::cli::{timeout_from_secs, Cli, Command};
use mininet::roles;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Command::Client {
            port,
            vip,
            router,
            to,
            name,
            timeout,
            noise,
        } => {
            roles::run_client(
                port,
                vip,
                router,
                to,
                name,
                timeout_from_secs(timeout),
                noise,
            )
            .await
        }
        Command::Server {
            port,
            vip,
            router,
            noise,
        } => roles::run_server(port, vip, router, noise).await,
        Command::Router {
            port,
            routes,
            noise,
        } => roles::run_router(port, routes, noise).await,
    };

    if let Err(error) = outcome {
        eprintln!("fatal: {error}");
        std::process::exit(1);
    }
}
