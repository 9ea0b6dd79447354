//! Relayer
//!
//! Learns about Sent messages, waits until the attestation store holds a
//! quorum that the destination registry will accept, and submits. Multiple
//! relayers may race on one message; the loser gets `DuplicateNonce` and
//! treats the message as settled.
//!
//! Messages never expire: a message below quorum stays pending with capped
//! exponential backoff between attempts.

use alloy::primitives::B256;
use bridge_core::{BridgeError, Message, ProcessedMessage};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::RwLock;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::bounded_cache::BoundedCache;
use crate::metrics::Metrics;
use crate::network::Network;
use crate::retry::{RetryAction, RetryConfig};
use crate::store::AttestationStore;

/// Relayer statistics shared with the HTTP server
#[derive(Debug, Default, Clone, Serialize)]
pub struct RelayerStats {
    pub started: bool,
    pub pending: usize,
    pub delivered: u64,
    pub abandoned: u64,
    pub last_poll: Option<DateTime<Utc>>,
}

pub type SharedStats = Arc<RwLock<RelayerStats>>;

#[derive(Debug, Clone)]
struct PendingDelivery {
    message: Message,
    attempt: u32,
    next_attempt: Instant,
}

/// Result of one delivery attempt, for callers driving the relayer by hand
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered(ProcessedMessage),
    /// Still below quorum or temporarily refused
    Deferred,
    /// Already processed elsewhere
    Settled,
    Abandoned(BridgeError),
}

pub struct Relayer {
    network: Arc<Network>,
    store: Arc<AttestationStore>,
    metrics: Arc<Metrics>,
    stats: SharedStats,
    retry: RetryConfig,
    poll_interval: Duration,
    pending: BTreeMap<B256, PendingDelivery>,
    settled: BoundedCache<B256>,
    abandoned: BoundedCache<B256>,
}

impl Relayer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        network: Arc<Network>,
        store: Arc<AttestationStore>,
        metrics: Arc<Metrics>,
        stats: SharedStats,
        retry: RetryConfig,
        poll_interval: Duration,
        settled_cache_size: usize,
        settled_cache_ttl: Duration,
    ) -> Self {
        Self {
            network,
            store,
            metrics,
            stats,
            retry,
            poll_interval,
            pending: BTreeMap::new(),
            settled: BoundedCache::new(settled_cache_size, settled_cache_ttl),
            abandoned: BoundedCache::new(settled_cache_size, settled_cache_ttl),
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Queue a Sent message. Known, settled, and abandoned messages are ignored.
    pub fn track(&mut self, message: Message) -> bool {
        let hash = B256::from(message.hash());
        if self.settled.contains(&hash)
            || self.abandoned.contains(&hash)
            || self.pending.contains_key(&hash)
        {
            return false;
        }

        debug!(
            source = %message.source_domain,
            dest = %message.dest_domain,
            nonce = message.nonce,
            "Tracking message"
        );
        self.metrics.messages_sent_total.inc();
        self.pending.insert(
            hash,
            PendingDelivery {
                message,
                attempt: 0,
                next_attempt: Instant::now(),
            },
        );
        true
    }

    /// Pick up anything sent but not yet processed on its destination.
    pub async fn resync(&mut self) -> usize {
        let mut added = 0;
        for message in self.network.undelivered().await {
            if self.track(message) {
                added += 1;
            }
        }
        if added > 0 {
            info!(added, "Resynced undelivered messages");
        }
        added
    }

    /// One attempt for `message` against the current attestation set.
    pub async fn try_deliver(&self, message: &Message, attempt: u32) -> (DeliveryOutcome, Option<Duration>) {
        let hash = B256::from(message.hash());

        // Delivered by someone else: settled whatever the registry looks like now.
        match self
            .network
            .processed(message.dest_domain, message.source_domain, message.nonce)
            .await
        {
            Ok(Some(_)) => return (DeliveryOutcome::Settled, None),
            Ok(None) => {}
            Err(e) => return (DeliveryOutcome::Abandoned(e), None),
        }

        let attestations = self.store.attestations_for(&hash).await;

        // Pre-check through the same verification path the destination uses,
        // so below-quorum messages do not cost a submission.
        let registry = match self.network.registry(message.dest_domain) {
            Ok(r) => r,
            Err(e) => return (DeliveryOutcome::Abandoned(e), None),
        };
        if let Err(e) = registry.verify_quorum(&hash, &attestations) {
            let backoff = self.retry.backoff_for_attempt(attempt);
            debug!(nonce = message.nonce, error = %e, ?backoff, "Below quorum, deferring");
            return (DeliveryOutcome::Deferred, Some(backoff));
        }

        match self.network.deliver(message, &attestations).await {
            Ok(record) => (DeliveryOutcome::Delivered(record), None),
            Err(e) => {
                self.metrics.record_delivery_failure(e.kind());
                match self.retry.next_action(&e, attempt) {
                    RetryAction::RetryAfter(backoff) => {
                        warn!(nonce = message.nonce, error = %e, ?backoff, "Delivery deferred");
                        (DeliveryOutcome::Deferred, Some(backoff))
                    }
                    RetryAction::Settled => (DeliveryOutcome::Settled, None),
                    RetryAction::Abandon => (DeliveryOutcome::Abandoned(e), None),
                }
            }
        }
    }

    /// Attempt every pending message that is due. Returns how many were delivered.
    pub async fn poll_once(&mut self) -> usize {
        let now = Instant::now();
        let due: Vec<B256> = self
            .pending
            .iter()
            .filter(|(_, p)| p.next_attempt <= now)
            .map(|(h, _)| *h)
            .collect();

        let mut delivered = 0;
        let mut abandoned = 0;

        for hash in due {
            let Some(entry) = self.pending.get(&hash).cloned() else {
                continue;
            };
            let message = &entry.message;
            let (outcome, backoff) = self.try_deliver(message, entry.attempt).await;

            match outcome {
                DeliveryOutcome::Delivered(record) => {
                    info!(
                        source = %record.source_domain,
                        dest = %message.dest_domain,
                        nonce = record.nonce,
                        attempts = entry.attempt + 1,
                        "Message delivered"
                    );
                    self.metrics.messages_delivered_total.inc();
                    self.settle(hash);
                    delivered += 1;
                }
                DeliveryOutcome::Settled => {
                    info!(
                        source = %message.source_domain,
                        nonce = message.nonce,
                        "Message already processed on destination"
                    );
                    self.settle(hash);
                }
                DeliveryOutcome::Abandoned(e) => {
                    error!(
                        source = %message.source_domain,
                        dest = %message.dest_domain,
                        nonce = message.nonce,
                        error = %e,
                        kind = e.kind(),
                        "Abandoning undeliverable message"
                    );
                    self.metrics.messages_abandoned_total.inc();
                    self.pending.remove(&hash);
                    self.abandoned.insert(hash);
                    abandoned += 1;
                }
                DeliveryOutcome::Deferred => {
                    if let Some(p) = self.pending.get_mut(&hash) {
                        p.attempt = p.attempt.saturating_add(1);
                        p.next_attempt = Instant::now() + backoff.unwrap_or(self.poll_interval);
                    }
                }
            }
        }

        self.publish_stats(delivered, abandoned).await;
        delivered
    }

    fn settle(&mut self, hash: B256) {
        self.pending.remove(&hash);
        self.settled.insert(hash);
    }

    async fn publish_stats(&self, delivered: usize, abandoned: usize) {
        self.metrics.pending_queue_depth.set(self.pending.len() as i64);
        self.metrics.settled_cache_size.set(self.settled.len() as i64);
        self.metrics.set_total_locked(self.network.ledger().total_locked());

        let mut stats = self.stats.write().await;
        stats.pending = self.pending.len();
        stats.delivered += delivered as u64;
        stats.abandoned += abandoned as u64;
        stats.last_poll = Some(Utc::now());
    }

    pub async fn run(
        mut self,
        mut sent: broadcast::Receiver<Message>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        info!(poll_interval = ?self.poll_interval, "Relayer starting");
        self.resync().await;
        self.stats.write().await.started = true;

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!(pending = self.pending.len(), "Shutdown signal received");
                    break;
                }
                event = sent.recv() => match event {
                    Ok(message) => {
                        self.track(message);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Relayer lagged behind Sent events, resyncing");
                        self.resync().await;
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
            }
        }
    }
}
