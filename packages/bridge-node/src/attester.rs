//! Attester worker
//!
//! One task per attester key. Each worker independently observes Sent events,
//! signs the message hash, and publishes the attestation to the store.
//! Workers share nothing but the store, so any one of them can stall or crash
//! without blocking the others.

use alloy::primitives::Address;
use bridge_core::{AttestationSigner, Message};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, warn};

use crate::metrics::Metrics;
use crate::store::AttestationStore;

pub struct AttesterWorker {
    signer: AttestationSigner,
    store: Arc<AttestationStore>,
    metrics: Arc<Metrics>,
}

impl AttesterWorker {
    pub fn new(signer: AttestationSigner, store: Arc<AttestationStore>, metrics: Arc<Metrics>) -> Self {
        Self {
            signer,
            store,
            metrics,
        }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Sign and publish one message. Returns false if already published.
    pub async fn attest(&self, message: &Message) -> eyre::Result<bool> {
        let attestation = self.signer.attest(message)?;
        let fresh = self.store.publish(attestation).await;
        if fresh {
            self.metrics.attestations_signed_total.inc();
            debug!(
                attester = %self.address(),
                source = %message.source_domain,
                nonce = message.nonce,
                "Attestation published"
            );
        }
        Ok(fresh)
    }

    pub async fn run(
        self,
        mut sent: broadcast::Receiver<Message>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        info!(attester = %self.address(), "Attester worker starting");

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!(attester = %self.address(), "Shutdown signal received");
                    break;
                }
                event = sent.recv() => match event {
                    Ok(message) => {
                        if let Err(e) = self.attest(&message).await {
                            error!(attester = %self.address(), error = %e, "Failed to attest message");
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(attester = %self.address(), skipped, "Attester lagged behind Sent events");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::B256;
    use alloy::signers::local::PrivateKeySigner;
    use bridge_core::DomainId;

    fn worker(seed: u8, store: Arc<AttestationStore>, metrics: Arc<Metrics>) -> AttesterWorker {
        let signer = AttestationSigner::new(PrivateKeySigner::from_bytes(&B256::repeat_byte(seed)).unwrap());
        AttesterWorker::new(signer, store, metrics)
    }

    fn message(nonce: u64) -> Message {
        Message::new(
            DomainId::from_u32(1),
            DomainId::from_u32(2),
            nonce,
            [1u8; 32],
            [2u8; 32],
            vec![0u8; 64],
        )
    }

    #[tokio::test]
    async fn test_attest_once_per_message() {
        let store = Arc::new(AttestationStore::new());
        let metrics = Arc::new(Metrics::new());
        let w = worker(1, store.clone(), metrics.clone());

        assert!(w.attest(&message(0)).await.unwrap());
        assert!(!w.attest(&message(0)).await.unwrap());
        assert_eq!(metrics.attestations_signed_total.get(), 1);

        let stored = store.attestations_for(&B256::from(message(0).hash())).await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].attester, w.address());
    }

    #[tokio::test]
    async fn test_workers_sign_from_broadcast_until_shutdown() {
        let store = Arc::new(AttestationStore::new());
        let metrics = Arc::new(Metrics::new());
        let (sent_tx, _) = broadcast::channel(16);
        let (shutdown_tx, _) = broadcast::channel(1);

        let handles: Vec<_> = (1..=3u8)
            .map(|seed| {
                let w = worker(seed, store.clone(), metrics.clone());
                tokio::spawn(w.run(sent_tx.subscribe(), shutdown_tx.subscribe()))
            })
            .collect();

        sent_tx.send(message(7)).unwrap();

        let hash = B256::from(message(7).hash());
        for _ in 0..100 {
            if store.count_for(&hash).await == 3 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(store.count_for(&hash).await, 3);

        shutdown_tx.send(()).unwrap();
        for h in handles {
            h.await.unwrap();
        }
    }
}
