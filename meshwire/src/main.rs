#![forbid(unsafe_code)]

use clap::Parser;
use meshwire_lib::{load_from_path, ShapedUdpTransport, TransportConfig};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Meshwire shaped UDP node")]
struct Cli {
    /// Path to configuration TOML file; defaults apply when omitted
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    let config = match cli.config {
        Some(path) => match load_from_path(&path) {
            Ok(cfg) => cfg,
            Err(err) => {
                error!(%err, "failed to load configuration");
                std::process::exit(1);
            }
        },
        None => TransportConfig::default(),
    };
    info!(
        host = %config.host,
        port = config.port,
        profile = %config.traffic_profile,
        obfuscation = %config.obfuscation,
        "configuration loaded"
    );

    let transport = ShapedUdpTransport::new(config);
    transport.on_receive(|payload, addr| {
        info!(%addr, bytes = payload.len(), "data received");
    });
    transport.on_peer_timeout(|addr| {
        info!(%addr, "peer timed out");
    });

    if let Err(err) = transport.start().await {
        error!(%err, "transport failed to start");
        std::process::exit(1);
    }

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(%err, "failed to listen for shutdown signal");
    }

    if let Ok(stats) = serde_json::to_string(&transport.get_stats()) {
        info!(%stats, "final stats");
    }
    transport.stop().await;
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}
