//! Lock ledger
//!
//! Per-source-chain accounting of value in transit. A burn on chain `S`
//! increments `S`'s entry and parks a [`BurnEvent`] under `(S, nonce)`. The
//! matching mint on the destination consumes that burn and decrements `S`'s
//! entry again. At every observable point the sum of the entries equals the
//! sum of unconsumed burns.

use alloy::primitives::{Address, B256};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error};

use crate::error::BridgeError;
use crate::types::DomainId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BurnEvent {
    pub amount: u128,
    /// Account whose balance was burned on the source chain
    pub account: Address,
    /// Hash of the message carrying the burn
    pub tx_ref: B256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MintEvent {
    pub amount: u128,
    /// Recipient credited on the destination chain
    pub account: Address,
    /// Must equal the burn's `tx_ref`
    pub tx_ref: B256,
}

/// One in-transit burn, for the read surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InTransit {
    pub source_domain: DomainId,
    pub nonce: u64,
    pub burn: BurnEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub chain_id: DomainId,
    pub total_locked: u128,
}

#[derive(Debug, Default, Clone)]
pub struct LockLedger {
    locked: BTreeMap<DomainId, u128>,
    pending: BTreeMap<(DomainId, u64), BurnEvent>,
    settled: u64,
}

impl LockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_burn(
        &mut self,
        source_domain: DomainId,
        nonce: u64,
        burn: BurnEvent,
    ) -> Result<(), BridgeError> {
        // Nonces are never reused, so a second burn under the same key is a
        // transmitter bug; refuse rather than overwrite.
        if self.pending.contains_key(&(source_domain, nonce)) {
            return Err(BridgeError::DuplicateNonce {
                source_domain,
                nonce,
            });
        }

        let current = self.locked_for_chain(source_domain);
        let updated = current
            .checked_add(burn.amount)
            .ok_or(BridgeError::LedgerOverflow {
                domain: source_domain,
            })?;

        self.locked.insert(source_domain, updated);
        self.pending.insert((source_domain, nonce), burn);

        debug!(
            source = %source_domain,
            nonce,
            amount = burn.amount,
            total_locked = updated,
            "Burn recorded"
        );
        Ok(())
    }

    /// Pair a mint with its burn and release the locked amount.
    pub fn consume_burn(
        &mut self,
        source_domain: DomainId,
        nonce: u64,
        mint: MintEvent,
    ) -> Result<BurnEvent, BridgeError> {
        let unmatched = BridgeError::UnmatchedMint {
            source_domain,
            nonce,
        };

        let burn = *self.pending.get(&(source_domain, nonce)).ok_or(unmatched.clone())?;
        if burn.amount != mint.amount || burn.tx_ref != mint.tx_ref {
            error!(
                source = %source_domain,
                nonce,
                burned = burn.amount,
                minted = mint.amount,
                "Mint does not match recorded burn"
            );
            return Err(unmatched);
        }

        let updated = self
            .locked_for_chain(source_domain)
            .checked_sub(mint.amount)
            .ok_or(BridgeError::LedgerOverflow {
                domain: source_domain,
            })?;

        self.locked.insert(source_domain, updated);
        self.pending.remove(&(source_domain, nonce));
        self.settled += 1;

        debug!(
            source = %source_domain,
            nonce,
            amount = mint.amount,
            total_locked = updated,
            "Burn consumed by mint"
        );
        Ok(burn)
    }

    /// True if `(source_domain, nonce)` has an unconsumed burn
    pub fn has_burn(&self, source_domain: DomainId, nonce: u64) -> bool {
        self.pending.contains_key(&(source_domain, nonce))
    }

    pub fn locked_for_chain(&self, domain: DomainId) -> u128 {
        self.locked.get(&domain).copied().unwrap_or(0)
    }

    /// Sum over all entries. Saturates; individual entries are overflow-checked.
    pub fn total_locked(&self) -> u128 {
        self.locked
            .values()
            .fold(0u128, |acc, v| acc.saturating_add(*v))
    }

    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.locked
            .iter()
            .map(|(chain_id, total_locked)| LedgerEntry {
                chain_id: *chain_id,
                total_locked: *total_locked,
            })
            .collect()
    }

    pub fn in_transit(&self) -> Vec<InTransit> {
        self.pending
            .iter()
            .map(|((source_domain, nonce), burn)| InTransit {
                source_domain: *source_domain,
                nonce: *nonce,
                burn: *burn,
            })
            .collect()
    }

    /// Number of burns paired with a mint so far
    pub fn settled_count(&self) -> u64 {
        self.settled
    }

    /// Unconsumed burns sum to the ledger total, per chain and overall.
    pub fn check_conservation(&self) -> bool {
        let mut expected: BTreeMap<DomainId, u128> = BTreeMap::new();
        for ((source, _), burn) in &self.pending {
            let slot = expected.entry(*source).or_default();
            *slot = slot.saturating_add(burn.amount);
        }

        let nonzero_locked: BTreeMap<DomainId, u128> = self
            .locked
            .iter()
            .filter(|(_, v)| **v != 0)
            .map(|(k, v)| (*k, *v))
            .collect();

        expected == nonzero_locked
    }
}

/// Shared handle to one deployment's ledger
#[derive(Debug, Clone, Default)]
pub struct LedgerHandle {
    inner: Arc<RwLock<LockLedger>>,
}

impl LedgerHandle {
    pub fn new(ledger: LockLedger) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ledger)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, LockLedger> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, LockLedger> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record_burn(
        &self,
        source_domain: DomainId,
        nonce: u64,
        burn: BurnEvent,
    ) -> Result<(), BridgeError> {
        self.write().record_burn(source_domain, nonce, burn)
    }

    pub fn consume_burn(
        &self,
        source_domain: DomainId,
        nonce: u64,
        mint: MintEvent,
    ) -> Result<BurnEvent, BridgeError> {
        self.write().consume_burn(source_domain, nonce, mint)
    }

    pub fn has_burn(&self, source_domain: DomainId, nonce: u64) -> bool {
        self.read().has_burn(source_domain, nonce)
    }

    pub fn locked_for_chain(&self, domain: DomainId) -> u128 {
        self.read().locked_for_chain(domain)
    }

    pub fn total_locked(&self) -> u128 {
        self.read().total_locked()
    }

    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.read().entries()
    }

    pub fn in_transit(&self) -> Vec<InTransit> {
        self.read().in_transit()
    }

    pub fn settled_count(&self) -> u64 {
        self.read().settled_count()
    }

    pub fn check_conservation(&self) -> bool {
        self.read().check_conservation()
    }
}
