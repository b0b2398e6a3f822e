//! Polychaeta Relay
//!
//! Run with: cargo run -- [--config relay.toml]
//!
//! Environment variables override config values (see `polychaeta-relay config`).
//! `RUST_LOG` overrides the configured log level.

use anyhow::Context;
use clap::{Parser, Subcommand};
use polychaeta_relay::config::{generate_default_config, Config, LoadedConfig};
use polychaeta_relay::{
    api, logging, AppState, BrokerClient, ConnectionHub, DeviceRegistry, EventNormalizer,
    EventSink, LatestReadingStore, QueryApi,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Parser)]
#[command(name = "polychaeta-relay")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "MQTT to WebSocket relay for the Polychaeta sensor dashboard")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (default: search standard locations)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay (default)
    Run,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Config { output } => {
            let content = generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, content)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("Config written to {}", path.display());
                }
                None => print!("{}", content),
            }
            Ok(())
        }
        Commands::Run => {
            let loaded = match &cli.config {
                Some(path) => Config::load_with_env(path)?,
                None => Config::load_default(),
            };
            run(loaded).await
        }
    }
}

async fn run(loaded: LoadedConfig) -> anyhow::Result<()> {
    logging::init(&loaded.config.logging).context("initializing logging")?;
    loaded.log();
    let config = loaded.config;

    tracing::info!("Starting Polychaeta relay v{}", env!("CARGO_PKG_VERSION"));

    // Relay state, rebuilt empty on every start
    let registry = Arc::new(DeviceRegistry::new());
    let readings = Arc::new(LatestReadingStore::new());

    let hub = Arc::new(ConnectionHub::new(
        config.websocket.hub_config(),
        Arc::clone(&registry),
        Arc::clone(&readings),
    ));
    let normalizer = Arc::new(EventNormalizer::new(
        Arc::clone(&registry),
        Arc::clone(&readings),
        Arc::clone(&hub) as Arc<dyn EventSink>,
    ));

    let broker = BrokerClient::new(&config.broker);
    let state = AppState::new(QueryApi::new(registry, readings), hub, broker.status());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        api::shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let broker_task = broker.start(normalizer, shutdown_rx.clone());

    // Bind failures abort startup
    let served = api::serve(state, &config.api, &config.websocket, shutdown_rx).await;
    if let Err(e) = served {
        broker_task.abort();
        return Err(e).context("HTTP/WebSocket server failed");
    }

    if let Err(e) = broker_task.await {
        tracing::warn!("Broker task ended abnormally: {}", e);
    }

    tracing::info!("Polychaeta relay stopped");
    Ok(())
}
