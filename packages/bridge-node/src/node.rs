//! Node assembly
//!
//! Builds the devnet from config and spawns the off-chain actors: one
//! attester worker per key and one relayer. The HTTP server is started
//! separately so tests can bind it to an ephemeral port.

use eyre::Result;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::attester::AttesterWorker;
use crate::config::Config;
use crate::metrics::Metrics;
use crate::network::Network;
use crate::relayer::{Relayer, RelayerStats, SharedStats};
use crate::server::AppState;
use crate::store::AttestationStore;

pub struct Node {
    pub network: Arc<Network>,
    pub store: Arc<AttestationStore>,
    pub metrics: Arc<Metrics>,
    pub stats: SharedStats,
    shutdown_tx: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
}

impl Node {
    /// Build the devnet and spawn attester workers and the relayer.
    pub fn spawn(config: &Config) -> Result<Self> {
        let network = Arc::new(Network::from_config(config)?);
        let store = Arc::new(AttestationStore::new());
        let metrics = Arc::new(Metrics::new());
        let stats: SharedStats = Arc::new(RwLock::new(RelayerStats::default()));
        let (shutdown_tx, _) = broadcast::channel(1);

        if !network.quorum_attainable() {
            warn!("Some domains have fewer attesters than their signature threshold; their messages will stay pending");
        }

        let mut tasks = Vec::new();
        for signer in config.attester_signers()? {
            let worker = AttesterWorker::new(signer, store.clone(), metrics.clone());
            tasks.push(tokio::spawn(
                worker.run(network.subscribe(), shutdown_tx.subscribe()),
            ));
        }

        let relayer = Relayer::new(
            network.clone(),
            store.clone(),
            metrics.clone(),
            stats.clone(),
            config.retry_config(),
            config.poll_interval(),
            config.settled_cache_size,
            std::time::Duration::from_secs(config.settled_cache_ttl_secs),
        );
        tasks.push(tokio::spawn(
            relayer.run(network.subscribe(), shutdown_tx.subscribe()),
        ));

        info!(
            attesters = config.attester_keys.len(),
            domains = network.domains().len(),
            "Node started"
        );

        Ok(Self {
            network,
            store,
            metrics,
            stats,
            shutdown_tx,
            tasks,
        })
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            network: self.network.clone(),
            store: self.store.clone(),
            stats: self.stats.clone(),
            metrics: self.metrics.clone(),
        }
    }

    /// Signal every task and wait for them to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        for result in futures::future::join_all(self.tasks).await {
            if let Err(e) = result {
                warn!(error = %e, "Node task ended abnormally");
            }
        }
        info!("Node stopped");
    }
}
