//! Attested Bridge Devnet Node
//!
//! Runs every configured chain in-process and the off-chain actors around
//! them:
//!
//! 1. A user burns on the source chain; the transmitter emits a Sent message
//! 2. Each attester worker signs the message hash and publishes it
//! 3. The relayer waits for a quorum the destination registry accepts
//! 4. The destination transmitter verifies, dedupes, and mints
//!
//! The HTTP API exposes health, Prometheus metrics, and a read surface over
//! registries, balances, the lock ledger, and message status.

use bridge_node::config::{Config, LogFormat};
use bridge_node::node::Node;
use bridge_node::server;
use tracing::{error, info};

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> eyre::Result<()> {
    init_logging(LogFormat::from_env());

    info!("Starting Attested Bridge Node");

    let config = Config::load()?;
    info!(
        domains = config.domains.len(),
        attesters = config.attester_keys.len(),
        quorum = %format!("{}-of-{}", config.quorum_min_signatures, config.quorum_total),
        "Configuration loaded"
    );

    let node = Node::spawn(&config)?;

    let state = node.app_state();
    let bind_address = config.api_bind_address.clone();
    let port = config.api_port;
    let api = tokio::spawn(async move {
        if let Err(e) = server::start_server(&bind_address, port, state).await {
            error!(error = %e, "API server failed");
        }
    });

    wait_for_shutdown_signal().await;

    api.abort();
    node.shutdown().await;

    info!("Attested Bridge Node stopped");
    Ok(())
}

/// Initialize tracing/logging with structured output
fn init_logging(format: LogFormat) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,bridge_node=debug,bridge_core=debug"));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json().with_target(true)).init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init(),
    }
}

/// Wait for shutdown signals (SIGINT/SIGTERM)
async fn wait_for_shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}
