//! In-process devnet
//!
//! Hosts one [`ChainBridge`] per configured domain. Each chain sits behind its
//! own async mutex so every mutation on a chain is applied atomically, while
//! chains progress independently. All chains share one lock ledger, and every
//! message a chain sends is broadcast as a Sent event for attesters and
//! relayers to pick up.

use alloy::primitives::Address;
use bridge_core::{
    Attestation, BridgeError, ChainBridge, DomainId, DomainTable, LedgerHandle, Message,
    MultisigSpec, ProcessedMessage, RegistryView, TransmitterConfig, AttesterRegistry,
};
use eyre::{Result, WrapErr};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::info;

use crate::config::Config;

/// Sent events buffered per subscriber before it starts lagging
const SENT_CHANNEL_CAPACITY: usize = 1024;

pub struct Network {
    domains: DomainTable,
    chains: BTreeMap<DomainId, Arc<Mutex<ChainBridge>>>,
    /// Read capabilities, usable without taking a chain lock
    registries: BTreeMap<DomainId, RegistryView>,
    ledger: LedgerHandle,
    governance: Address,
    sent_tx: broadcast::Sender<Message>,
}

impl Network {
    /// Build the devnet: derive the governance address, deploy one bridge per
    /// domain with it as admin, and register every configured attester.
    pub fn from_config(config: &Config) -> Result<Self> {
        let governance_spec = config.governance_spec()?;
        let governance = log_governance(&governance_spec, &config.governance_hrp)?;

        let domains = config.domain_table()?;
        let attesters: Vec<Address> = config
            .attester_signers()?
            .iter()
            .map(|s| s.address())
            .collect();

        let ledger = LedgerHandle::default();
        let (sent_tx, _) = broadcast::channel(SENT_CHANNEL_CAPACITY);
        let mut chains = BTreeMap::new();
        let mut registries = BTreeMap::new();

        for (domain, name) in domains.iter() {
            let policy = config.policy_for(domain)?;
            let transmitter_config = TransmitterConfig {
                local_domain: domain,
                max_message_body_size: config.max_message_body_size,
            };
            let bridge = ChainBridge::new(
                transmitter_config,
                name,
                AttesterRegistry::new(governance, policy),
                ledger.clone(),
            );

            bridge
                .registry()
                .register_attesters(governance, &attesters)
                .wrap_err_with(|| format!("Failed to register attesters on {}", name))?;

            info!(
                domain = %domain,
                name,
                policy = %policy,
                attesters = bridge.registry().attester_count(),
                "Chain deployed"
            );

            registries.insert(domain, bridge.registry().view());
            chains.insert(domain, Arc::new(Mutex::new(bridge)));
        }

        Ok(Self {
            domains,
            chains,
            registries,
            ledger,
            governance,
            sent_tx,
        })
    }

    pub fn domains(&self) -> &DomainTable {
        &self.domains
    }

    pub fn governance(&self) -> Address {
        self.governance
    }

    pub fn ledger(&self) -> &LedgerHandle {
        &self.ledger
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.sent_tx.subscribe()
    }

    pub fn chain(&self, domain: DomainId) -> Result<&Arc<Mutex<ChainBridge>>, BridgeError> {
        self.chains
            .get(&domain)
            .ok_or(BridgeError::UnknownDomain { domain })
    }

    pub fn registry(&self, domain: DomainId) -> Result<&RegistryView, BridgeError> {
        self.registries
            .get(&domain)
            .ok_or(BridgeError::UnknownDomain { domain })
    }

    fn publish_sent(&self, message: &Message) {
        // No subscribers is fine; nobody is relaying yet.
        let _ = self.sent_tx.send(message.clone());
    }

    /// Governance credit on `domain`
    pub async fn fund(&self, domain: DomainId, account: Address, amount: u128) -> Result<u128, BridgeError> {
        let mut chain = self.chain(domain)?.lock().await;
        chain.fund(self.governance, account, amount)
    }

    pub async fn deposit_for_burn(
        &self,
        source: DomainId,
        caller: Address,
        amount: u128,
        dest: DomainId,
        recipient: Address,
    ) -> Result<Message, BridgeError> {
        if !self.domains.contains(dest) {
            return Err(BridgeError::UnknownDomain { domain: dest });
        }
        let message = {
            let mut chain = self.chain(source)?.lock().await;
            chain.deposit_for_burn(caller, amount, dest, recipient)?
        };
        self.publish_sent(&message);
        Ok(message)
    }

    /// Submit `(message, attestations)` to the destination transmitter.
    pub async fn deliver(
        &self,
        message: &Message,
        attestations: &[Attestation],
    ) -> Result<ProcessedMessage, BridgeError> {
        let mut chain = self.chain(message.dest_domain)?.lock().await;
        chain.receive_message(message, attestations)
    }

    pub async fn sent_message(&self, source: DomainId, nonce: u64) -> Result<Option<Message>, BridgeError> {
        let chain = self.chain(source)?.lock().await;
        Ok(chain.transmitter().sent_message(nonce).cloned())
    }

    pub async fn processed(
        &self,
        dest: DomainId,
        source: DomainId,
        nonce: u64,
    ) -> Result<Option<ProcessedMessage>, BridgeError> {
        let chain = self.chain(dest)?.lock().await;
        Ok(chain.transmitter().processed(source, nonce).cloned())
    }

    pub async fn balance_of(&self, domain: DomainId, account: Address) -> Result<u128, BridgeError> {
        let chain = self.chain(domain)?.lock().await;
        Ok(chain.messenger().balance_of(account))
    }

    pub async fn pause(&self, domain: DomainId) -> Result<(), BridgeError> {
        self.chain(domain)?.lock().await.pause(self.governance)
    }

    pub async fn unpause(&self, domain: DomainId) -> Result<(), BridgeError> {
        self.chain(domain)?.lock().await.unpause(self.governance)
    }

    pub async fn remove_attester(&self, domain: DomainId, attester: Address) -> Result<(), BridgeError> {
        let chain = self.chain(domain)?.lock().await;
        chain.registry().remove_attester(self.governance, attester)
    }

    pub async fn register_attester(&self, domain: DomainId, attester: Address) -> Result<(), BridgeError> {
        let chain = self.chain(domain)?.lock().await;
        chain.registry().register_attester(self.governance, attester)
    }

    /// Sent messages whose destination has not processed them yet, for
    /// relayers that start late or fall behind the Sent stream.
    pub async fn undelivered(&self) -> Vec<Message> {
        let mut sent = Vec::new();
        for chain in self.chains.values() {
            let chain = chain.lock().await;
            let transmitter = chain.transmitter();
            sent.extend((0..transmitter.next_nonce()).filter_map(|n| transmitter.sent_message(n).cloned()));
        }

        let mut undelivered = Vec::with_capacity(sent.len());
        for message in sent {
            let Ok(dest) = self.chain(message.dest_domain) else {
                continue;
            };
            let processed = dest
                .lock()
                .await
                .transmitter()
                .is_processed(message.source_domain, message.nonce);
            if !processed {
                undelivered.push(message);
            }
        }
        undelivered
    }

    /// Every hosted domain has at least k active attesters
    pub fn quorum_attainable(&self) -> bool {
        self.registries
            .values()
            .all(|view| view.policy().is_met(view.attester_count()))
    }
}

/// Derive and log the governance address for audit.
fn log_governance(spec: &MultisigSpec, hrp: &str) -> Result<Address> {
    let derived = spec.derive();
    let evm = derived.to_evm();
    let bech32 = derived.to_bech32(hrp)?;
    info!(
        evm = %evm,
        bech32 = %bech32,
        threshold = spec.threshold(),
        signers = spec.signers().len(),
        "Governance multisig derived"
    );
    Ok(evm)
}
