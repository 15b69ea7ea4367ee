//! Kickcan server binary

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;
use tracing_subscriber::EnvFilter;

use kickcan_server::{Server, ServerConfig, ServerRunner, Session, TransportConfig, PROTOCOL_ID};

#[derive(Parser, Debug)]
#[command(name = "kickcan-server", version, about = "Authoritative kick-the-can server")]
struct Cli {
    /// YAML configuration file; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides the configured bind address
    #[arg(short, long)]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("kickcan_server=info,kickcan_core=info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.bind_address = bind;
    }

    let session = Session::new(&config).context("building session")?;
    let mut server = Server::new(session);

    let mut transport = ServerRunner::new(TransportConfig::try_from(&config)?)
        .context("creating transport")?;

    info!("Kickcan Server v{}", env!("CARGO_PKG_VERSION"));
    if let Some(addr) = transport.local_addr() {
        info!("Listening on {}", addr);
    }
    info!("Protocol ID: {:016x}", PROTOCOL_ID);

    let tick_duration = config.tick_interval();
    let mut ticker = interval(tick_duration);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last = Instant::now();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Instant::now();
                let delta = now.duration_since(last);
                last = now;

                server.update(&mut transport, delta);
            }
            result = &mut shutdown => {
                result.context("waiting for ctrl-c")?;
                info!("Shutting down");
                break;
            }
        }
    }

    Ok(())
}
