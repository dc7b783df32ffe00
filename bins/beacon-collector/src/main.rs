use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use beacon_api_server::RecordingHost;
use beacon_config_hcl::HclParser;
use beacon_engine::config::{HarnessConfig, TomlParser};
use beacon_engine::BeaconSession;

#[derive(Parser)]
#[command(name = "beacon-collector", about = "Beacon capture and validation collector")]
struct Cli {
    /// Path to configuration file (.toml or .hcl).
    #[arg(long, default_value = "collector.toml", env = "BEACON_CONFIG")]
    config: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    tracing::info!(config = %cli.config, "loading configuration");
    let config = match HarnessConfig::load_with(&cli.config, &[&TomlParser, &HclParser]) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "failed to load config");
            std::process::exit(1);
        }
    };

    let host = Arc::new(RecordingHost::new(&config.capabilities));
    let session = Arc::new(BeaconSession::new(config, host.clone()));

    let shutdown = CancellationToken::new();
    let mut server = tokio::spawn(beacon_api_server::run(session.clone(), host, shutdown.clone()));

    let res = tokio::select! {
        res = &mut server => res,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down...");
            shutdown.cancel();
            server.await
        }
    };

    match res {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::error!(error = %e, "collector failed");
            std::process::exit(1);
        }
        Err(e) => {
            tracing::error!(error = %e, "collector task panicked");
            std::process::exit(1);
        }
    }

    tracing::info!(beacons = session.store().count(), "beacon-collector stopped");
}
