use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use auto_swapd::clients::EvmClient;
use auto_swapd::config::{load_config, load_private_keys};
use auto_swapd::logging;
use auto_swapd::metrics::MetricsCollector;
use auto_swapd::orchestrator::Orchestrator;
use auto_swapd::wallet::load_wallets;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine, the environment may already be populated
    let _ = dotenvy::dotenv();

    let config = load_config();
    let _log_guards = match logging::init(&config.logging) {
        Ok(guards) => guards,
        Err(e) => {
            logging::init_console(&config.logging.level);
            error!("Failed to initialize log files: {:#}", e);
            return Err(e);
        }
    };
    info!("Starting auto transfer and swap bot...");
    config.log_warnings();
    debug!("Configuration: {}", serde_json::to_string(&config)?);

    if config.router.router_address.is_none() {
        warn!("SWAP_ROUTER is not set, swap operations will be skipped");
    }

    let wallets = load_private_keys()
        .and_then(|keys| load_wallets(&keys))
        .map_err(|e| {
            error!("Error setting up wallets: {}", e);
            e
        })?;

    let client = Arc::new(EvmClient::new(&config.chain)?);
    info!("Connecting to {} (chain id {})", config.chain.rpc_url, client.chain_id());
    let metrics = Arc::new(MetricsCollector::new()?);

    let mut orchestrator = Orchestrator::new(config, client, wallets, metrics);

    tokio::select! {
        _ = orchestrator.run() => {},
        _ = shutdown_signal() => info!("Shutting down..."),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C signal"),
        _ = terminate => info!("Received SIGTERM signal"),
    }
}
