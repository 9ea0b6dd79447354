//! Append-only attestation store
//!
//! Attester workers publish here and the relayer reads from here. Entries are
//! keyed by `(message_hash, attester)` and never change once written, so a
//! worker that signs the same message twice is a no-op.

use alloy::primitives::{Address, B256};
use bridge_core::Attestation;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct AttestationStore {
    by_message: RwLock<HashMap<B256, BTreeMap<Address, Attestation>>>,
}

impl AttestationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if this attester already published for this message.
    pub async fn publish(&self, attestation: Attestation) -> bool {
        let mut map = self.by_message.write().await;
        let entry = map.entry(attestation.message_hash).or_default();
        if entry.contains_key(&attestation.attester) {
            return false;
        }
        entry.insert(attestation.attester, attestation);
        true
    }

    /// All attestations for `message_hash`, in attester order
    pub async fn attestations_for(&self, message_hash: &B256) -> Vec<Attestation> {
        self.by_message
            .read()
            .await
            .get(message_hash)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn count_for(&self, message_hash: &B256) -> usize {
        self.by_message
            .read()
            .await
            .get(message_hash)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    /// Number of messages with at least one attestation
    pub async fn message_count(&self) -> usize {
        self.by_message.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Bytes;

    fn att(hash: u8, attester: u8) -> Attestation {
        Attestation {
            message_hash: B256::repeat_byte(hash),
            attester: Address::repeat_byte(attester),
            signature: Bytes::from(vec![attester; 65]),
        }
    }

    #[tokio::test]
    async fn test_publish_is_idempotent_per_attester() {
        let store = AttestationStore::new();
        assert!(store.publish(att(1, 1)).await);
        assert!(!store.publish(att(1, 1)).await);
        assert!(store.publish(att(1, 2)).await);
        assert!(store.publish(att(2, 1)).await);

        assert_eq!(store.count_for(&B256::repeat_byte(1)).await, 2);
        assert_eq!(store.message_count().await, 2);
        assert!(store.attestations_for(&B256::repeat_byte(3)).await.is_empty());
    }

    #[tokio::test]
    async fn test_first_write_wins() {
        let store = AttestationStore::new();
        store.publish(att(1, 1)).await;

        let mut replacement = att(1, 1);
        replacement.signature = Bytes::from(vec![0u8; 65]);
        store.publish(replacement).await;

        let stored = store.attestations_for(&B256::repeat_byte(1)).await;
        assert_eq!(stored, vec![att(1, 1)]);
    }
}
