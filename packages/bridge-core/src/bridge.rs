//! One chain's bridge deployment
//!
//! A [`ChainBridge`] wires together the pieces a single domain runs: its
//! attester registry, its transmitter, and a token messenger registered as the
//! transmitter's handler. All of them share one admin (the registry's).

use alloy::primitives::Address;

use crate::attestation::Attestation;
use crate::error::BridgeError;
use crate::ledger::LedgerHandle;
use crate::message::Message;
use crate::messenger::TokenMessenger;
use crate::policy::QuorumPolicy;
use crate::registry::{AttesterRegistry, RegistryHandle};
use crate::transmitter::{MessageTransmitter, ProcessedMessage, TransmitterConfig};
use crate::types::DomainId;

#[derive(Debug)]
pub struct ChainBridge {
    domain: DomainId,
    name: String,
    registry: RegistryHandle,
    transmitter: MessageTransmitter,
    messenger: TokenMessenger,
}

impl ChainBridge {
    pub fn new(
        config: TransmitterConfig,
        name: impl Into<String>,
        registry: AttesterRegistry,
        ledger: LedgerHandle,
    ) -> Self {
        let domain = config.local_domain;
        let registry = RegistryHandle::new(registry);
        let transmitter = MessageTransmitter::new(config, registry.view());
        let messenger = TokenMessenger::new(domain, registry.view(), ledger);
        Self {
            domain,
            name: name.into(),
            registry,
            transmitter,
            messenger,
        }
    }

    /// Deployment with a generic `policy`
    pub fn with_policy(
        config: TransmitterConfig,
        name: impl Into<String>,
        admin: Address,
        policy: QuorumPolicy,
        ledger: LedgerHandle,
    ) -> Self {
        Self::new(config, name, AttesterRegistry::new(admin, policy), ledger)
    }

    pub fn domain(&self) -> DomainId {
        self.domain
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn registry(&self) -> &RegistryHandle {
        &self.registry
    }

    pub fn transmitter(&self) -> &MessageTransmitter {
        &self.transmitter
    }

    pub fn messenger(&self) -> &TokenMessenger {
        &self.messenger
    }

    pub fn fund(&mut self, caller: Address, account: Address, amount: u128) -> Result<u128, BridgeError> {
        self.messenger.fund(caller, account, amount)
    }

    pub fn deposit_for_burn(
        &mut self,
        caller: Address,
        amount: u128,
        dest_domain: DomainId,
        recipient: Address,
    ) -> Result<Message, BridgeError> {
        self.messenger
            .deposit_for_burn(&mut self.transmitter, caller, amount, dest_domain, recipient)
    }

    /// Generic message send; the body is not interpreted by the messenger.
    pub fn send_message(
        &mut self,
        caller: Address,
        dest_domain: DomainId,
        recipient: [u8; 32],
        body: Vec<u8>,
    ) -> Result<Message, BridgeError> {
        self.transmitter
            .send_message(caller, dest_domain, recipient, body)
    }

    pub fn receive_message(
        &mut self,
        message: &Message,
        attestations: &[Attestation],
    ) -> Result<ProcessedMessage, BridgeError> {
        self.transmitter
            .receive_message(message, attestations, &mut self.messenger)
    }

    pub fn receive_raw(
        &mut self,
        bytes: &[u8],
        attestations: &[Attestation],
    ) -> Result<ProcessedMessage, BridgeError> {
        self.transmitter
            .receive_raw(bytes, attestations, &mut self.messenger)
    }

    pub fn pause(&mut self, caller: Address) -> Result<(), BridgeError> {
        self.transmitter.pause(caller)
    }

    pub fn unpause(&mut self, caller: Address) -> Result<(), BridgeError> {
        self.transmitter.unpause(caller)
    }
}
