//! Attester registry
//!
//! The registry exclusively owns the set of authorized attesters and the
//! immutable [`QuorumPolicy`] it was deployed with. It is shared through two
//! capabilities:
//!
//! - [`RegistryHandle`]: the single writer, held by the admin surface
//! - [`RegistryView`]: read-only, held by transmitters and relayers
//!
//! Both point at the same live state, so a removal is visible to every
//! verifier on its next read. Trust decisions go through exactly one function,
//! [`RegistryView::verify_quorum`].

use alloy::primitives::{Address, B256};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

use crate::attestation::Attestation;
use crate::error::BridgeError;
use crate::policy::QuorumPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attester {
    pub address: Address,
    pub active: bool,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AttesterRegistry {
    admin: Address,
    policy: QuorumPolicy,
    attesters: BTreeMap<Address, Attester>,
}

impl AttesterRegistry {
    pub fn new(admin: Address, policy: QuorumPolicy) -> Self {
        Self {
            admin,
            policy,
            attesters: BTreeMap::new(),
        }
    }

    pub fn admin(&self) -> Address {
        self.admin
    }

    pub fn policy(&self) -> QuorumPolicy {
        self.policy
    }

    fn ensure_admin(&self, caller: Address) -> Result<(), BridgeError> {
        if caller != self.admin {
            return Err(BridgeError::Unauthorized);
        }
        Ok(())
    }

    pub fn register_attester(&mut self, caller: Address, address: Address) -> Result<(), BridgeError> {
        self.ensure_admin(caller)?;
        self.check_registrable(std::slice::from_ref(&address))?;
        self.insert_attester(address);
        self.warn_if_quorum_unattainable();
        Ok(())
    }

    /// Register a whole set at once; all or nothing.
    ///
    /// The quorum warning is evaluated once, after the last insert, so a
    /// genesis set does not warn on each intermediate count.
    pub fn register_attesters(&mut self, caller: Address, addresses: &[Address]) -> Result<(), BridgeError> {
        self.ensure_admin(caller)?;
        self.check_registrable(addresses)?;
        for &address in addresses {
            self.insert_attester(address);
        }
        self.warn_if_quorum_unattainable();
        Ok(())
    }

    fn check_registrable(&self, addresses: &[Address]) -> Result<(), BridgeError> {
        let mut batch = HashSet::with_capacity(addresses.len());
        for &address in addresses {
            if self.is_attester(address) || !batch.insert(address) {
                return Err(BridgeError::AlreadyRegistered { attester: address });
            }
        }

        let capacity = self.policy.total_attesters();
        if self.attester_count() + addresses.len() > capacity as usize {
            return Err(BridgeError::AttesterSetFull { capacity });
        }
        Ok(())
    }

    fn insert_attester(&mut self, address: Address) {
        // A previously removed attester gets its record reactivated.
        self.attesters.insert(
            address,
            Attester {
                address,
                active: true,
                registered_at: Utc::now(),
            },
        );

        info!(
            attester = %address,
            active = self.attester_count(),
            policy = %self.policy,
            "Attester registered"
        );
    }

    pub fn remove_attester(&mut self, caller: Address, address: Address) -> Result<(), BridgeError> {
        self.ensure_admin(caller)?;

        match self.attesters.get_mut(&address) {
            Some(record) if record.active => record.active = false,
            _ => return Err(BridgeError::UnknownAttester { attester: address }),
        }

        info!(
            attester = %address,
            active = self.attester_count(),
            policy = %self.policy,
            "Attester removed"
        );
        self.warn_if_quorum_unattainable();
        Ok(())
    }

    /// Hand admin rights to a new address, usually a freshly derived multisig.
    pub fn transfer_admin(&mut self, caller: Address, new_admin: Address) -> Result<(), BridgeError> {
        self.ensure_admin(caller)?;
        info!(old_admin = %self.admin, new_admin = %new_admin, "Registry admin transferred");
        self.admin = new_admin;
        Ok(())
    }

    pub fn is_attester(&self, address: Address) -> bool {
        self.attesters
            .get(&address)
            .map(|a| a.active)
            .unwrap_or(false)
    }

    pub fn attester_count(&self) -> usize {
        self.attesters.values().filter(|a| a.active).count()
    }

    /// Active attesters in address order
    pub fn attesters(&self) -> Vec<Attester> {
        self.attesters.values().filter(|a| a.active).cloned().collect()
    }

    /// Record for `address`, including deactivated ones
    pub fn attester(&self, address: Address) -> Option<&Attester> {
        self.attesters.get(&address)
    }

    pub fn quorum_attainable(&self) -> bool {
        self.policy.is_met(self.attester_count())
    }

    fn warn_if_quorum_unattainable(&self) {
        if !self.quorum_attainable() {
            warn!(
                active = self.attester_count(),
                required = self.policy.min_signatures(),
                "Quorum unattainable: fewer active attesters than the signature threshold"
            );
        }
    }

    /// Count distinct active signers with a valid signature over `message_hash`.
    ///
    /// Attestations that fail any check are skipped, not reported.
    pub fn count_valid(&self, message_hash: &B256, attestations: &[Attestation]) -> usize {
        let mut signers: HashSet<Address> = HashSet::with_capacity(attestations.len());
        for att in attestations {
            if signers.contains(&att.attester) {
                continue;
            }
            if !self.is_attester(att.attester) {
                debug!(attester = %att.attester, "Skipping attestation from inactive signer");
                continue;
            }
            if !att.is_signed_over(message_hash) {
                debug!(attester = %att.attester, "Skipping attestation with invalid signature");
                continue;
            }
            signers.insert(att.attester);
        }
        signers.len()
    }

    pub fn verify_quorum(
        &self,
        message_hash: &B256,
        attestations: &[Attestation],
    ) -> Result<QuorumReport, BridgeError> {
        let valid = self.count_valid(message_hash, attestations) as u32;
        let required = self.policy.min_signatures();
        if !self.policy.is_met(valid as usize) {
            return Err(BridgeError::InsufficientAttestations {
                got: valid,
                required,
            });
        }
        Ok(QuorumReport {
            distinct_signers: valid,
            required,
            submitted: attestations.len(),
        })
    }
}

/// Outcome of a successful quorum check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuorumReport {
    pub distinct_signers: u32,
    pub required: u32,
    /// Attestations supplied, including invalid and duplicate ones
    pub submitted: usize,
}

// ============================================================================
// Shared capabilities
// ============================================================================

/// Exclusive write capability over a registry
///
/// Dereferences to [`RegistryView`] for reads.
#[derive(Debug)]
pub struct RegistryHandle {
    view: RegistryView,
}

impl RegistryHandle {
    pub fn new(registry: AttesterRegistry) -> Self {
        Self {
            view: RegistryView {
                inner: Arc::new(RwLock::new(registry)),
            },
        }
    }

    pub fn view(&self) -> RegistryView {
        self.view.clone()
    }

    fn write(&self) -> RwLockWriteGuard<'_, AttesterRegistry> {
        self.view
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register_attester(&self, caller: Address, address: Address) -> Result<(), BridgeError> {
        self.write().register_attester(caller, address)
    }

    pub fn remove_attester(&self, caller: Address, address: Address) -> Result<(), BridgeError> {
        self.write().remove_attester(caller, address)
    }

    pub fn register_attesters(&self, caller: Address, addresses: &[Address]) -> Result<(), BridgeError> {
        self.write().register_attesters(caller, addresses)
    }

    pub fn transfer_admin(&self, caller: Address, new_admin: Address) -> Result<(), BridgeError> {
        self.write().transfer_admin(caller, new_admin)
    }
}

impl std::ops::Deref for RegistryHandle {
    type Target = RegistryView;

    fn deref(&self) -> &RegistryView {
        &self.view
    }
}

/// Read-only capability over a registry; always observes live state
#[derive(Debug, Clone)]
pub struct RegistryView {
    inner: Arc<RwLock<AttesterRegistry>>,
}

impl RegistryView {
    fn read(&self) -> RwLockReadGuard<'_, AttesterRegistry> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn admin(&self) -> Address {
        self.read().admin()
    }

    pub fn policy(&self) -> QuorumPolicy {
        self.read().policy()
    }

    pub fn is_attester(&self, address: Address) -> bool {
        self.read().is_attester(address)
    }

    pub fn attester_count(&self) -> usize {
        self.read().attester_count()
    }

    pub fn attesters(&self) -> Vec<Attester> {
        self.read().attesters()
    }

    pub fn attester(&self, address: Address) -> Option<Attester> {
        self.read().attester(address).cloned()
    }

    pub fn count_valid(&self, message_hash: &B256, attestations: &[Attestation]) -> usize {
        self.read().count_valid(message_hash, attestations)
    }

    pub fn verify_quorum(
        &self,
        message_hash: &B256,
        attestations: &[Attestation],
    ) -> Result<QuorumReport, BridgeError> {
        self.read().verify_quorum(message_hash, attestations)
    }
}
