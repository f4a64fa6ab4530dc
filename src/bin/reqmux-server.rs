//! Runs a `reqmux` dispatcher against a real upstream target.
//!
//! Wires together everything the core dispatcher treats as an external
//! collaborator: socket binding, CLI parsing, logging, and the upstream
//! TCP connection. None of that lives in the library crate.

use anyhow::Context;
use clap::Parser;
use reqmux::config::DispatcherConfig;
use reqmux::upstream::tcp::TcpUpstream;
use reqmux::Dispatcher;
use tokio::net::TcpListener;
use tracing::info;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 7878;

#[derive(Debug, Parser)]
#[command(name = "reqmux-server", version, author)]
/// Accept client connections and forward every request to a single
/// upstream target.
struct Cli {
    /// Address(es) to listen on, e.g. `0.0.0.0:7878`. May be repeated.
    #[arg(long = "listen", default_value_t = format!("{DEFAULT_HOST}:{DEFAULT_PORT}"))]
    listen: String,
    /// Address of the single upstream target to forward requests to.
    #[arg(long)]
    upstream: std::net::SocketAddr,
    /// Maximum number of concurrently admitted client connections.
    #[arg(long, default_value_t = DispatcherConfig::default().max_active)]
    max_active: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let listener = TcpListener::bind(&cli.listen)
        .await
        .with_context(|| format!("failed to bind {}", cli.listen))?;
    info!(listen = %cli.listen, upstream = %cli.upstream, "starting reqmux");

    let upstream = TcpUpstream::connect(cli.upstream)
        .await
        .with_context(|| format!("failed to connect to upstream {}", cli.upstream))?;

    let config = DispatcherConfig {
        max_active: cli.max_active,
        ..DispatcherConfig::default()
    };

    let dispatcher = Dispatcher::new(vec![listener], upstream, config)
        .context("failed to construct dispatcher")?;

    tokio::select! {
        () = dispatcher.closed() => {
            info!("upstream failed, dispatcher drained");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("ctrl-c received, entering drain");
            dispatcher.enter_drain();
            dispatcher.closed().await;
        }
    }

    dispatcher.join().await;
    Ok(())
}
