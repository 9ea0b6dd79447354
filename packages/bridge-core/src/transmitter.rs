//! Message transmitter
//!
//! One transmitter per domain. On the sending side it assigns monotonic
//! nonces and keeps an outbox of Sent descriptors. On the receiving side it
//! is the only component that checks trust: it rejects replays, recomputes
//! the message hash, verifies the attester quorum through the registry view,
//! and only then dispatches to a [`MessageHandler`].
//!
//! ## Receive Flow
//!
//! 1. Reject if paused or `(source_domain, nonce)` was already processed
//! 2. Validate the envelope against the local domain
//! 3. Verify k distinct active signers over the recomputed hash
//! 4. Dispatch to the handler
//! 5. Write the [`ProcessedMessage`] record, only if the handler succeeded

use alloy::primitives::{Address, B256};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

use crate::address_codec::account_to_bytes32;
use crate::attestation::Attestation;
use crate::error::BridgeError;
use crate::message::Message;
use crate::registry::{QuorumReport, RegistryView};
use crate::types::DomainId;

/// Default upper bound on message body length
pub const DEFAULT_MAX_MESSAGE_BODY_SIZE: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransmitterConfig {
    pub local_domain: DomainId,
    pub max_message_body_size: usize,
}

impl TransmitterConfig {
    pub fn new(local_domain: DomainId) -> Self {
        Self {
            local_domain,
            max_message_body_size: DEFAULT_MAX_MESSAGE_BODY_SIZE,
        }
    }
}

/// Write-once replay record keyed by `(source_domain, nonce)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedMessage {
    pub source_domain: DomainId,
    pub nonce: u64,
    pub message_hash: B256,
    pub processed_at: DateTime<Utc>,
}

/// A message whose quorum has been verified by the local transmitter.
///
/// Only this crate's transmitter can construct one, so any handler that
/// requires it (minting in particular) is unreachable without a verified
/// quorum.
#[derive(Debug)]
pub struct VerifiedMessage<'a> {
    message: &'a Message,
    message_hash: B256,
    report: QuorumReport,
}

impl<'a> VerifiedMessage<'a> {
    pub(crate) fn new(message: &'a Message, message_hash: B256, report: QuorumReport) -> Self {
        Self {
            message,
            message_hash,
            report,
        }
    }

    pub fn message(&self) -> &Message {
        self.message
    }

    pub fn message_hash(&self) -> B256 {
        self.message_hash
    }

    pub fn report(&self) -> QuorumReport {
        self.report
    }
}

/// Application logic that runs once a message is verified
pub trait MessageHandler {
    fn handle_receive_message(&mut self, verified: &VerifiedMessage<'_>) -> Result<(), BridgeError>;
}

#[derive(Debug)]
pub struct MessageTransmitter {
    config: TransmitterConfig,
    registry: RegistryView,
    paused: bool,
    next_nonce: u64,
    outbox: BTreeMap<u64, Message>,
    processed: HashMap<(DomainId, u64), ProcessedMessage>,
}

impl MessageTransmitter {
    pub fn new(config: TransmitterConfig, registry: RegistryView) -> Self {
        Self {
            config,
            registry,
            paused: false,
            next_nonce: 0,
            outbox: BTreeMap::new(),
            processed: HashMap::new(),
        }
    }

    pub fn local_domain(&self) -> DomainId {
        self.config.local_domain
    }

    pub fn config(&self) -> &TransmitterConfig {
        &self.config
    }

    pub fn registry(&self) -> &RegistryView {
        &self.registry
    }

    // ========================================================================
    // Sending
    // ========================================================================

    /// Build the next outbound message without committing it.
    ///
    /// Callers that must update other state atomically with the send check
    /// that state against the returned message, then call
    /// [`Self::commit_message`].
    pub fn prepare_message(
        &self,
        caller: Address,
        dest_domain: DomainId,
        recipient: [u8; 32],
        body: Vec<u8>,
    ) -> Result<Message, BridgeError> {
        if self.paused {
            return Err(BridgeError::BridgePaused);
        }
        if dest_domain == self.config.local_domain {
            return Err(BridgeError::InvalidDestination {
                domain: dest_domain,
            });
        }
        if body.len() > self.config.max_message_body_size {
            return Err(BridgeError::MessageBodyTooLarge {
                size: body.len(),
                max: self.config.max_message_body_size,
            });
        }
        if self.next_nonce == u64::MAX {
            return Err(BridgeError::malformed("nonce space exhausted"));
        }

        Ok(Message::new(
            self.config.local_domain,
            dest_domain,
            self.next_nonce,
            account_to_bytes32(&caller),
            recipient,
            body,
        ))
    }

    /// Record a message produced by [`Self::prepare_message`] and advance the nonce.
    pub(crate) fn commit_message(&mut self, message: Message) {
        debug_assert_eq!(message.nonce, self.next_nonce);
        self.next_nonce = message.nonce + 1;

        info!(
            source = %message.source_domain,
            dest = %message.dest_domain,
            nonce = message.nonce,
            hash = %message.hash_hex(),
            "Message sent"
        );
        self.outbox.insert(message.nonce, message);
    }

    pub fn send_message(
        &mut self,
        caller: Address,
        dest_domain: DomainId,
        recipient: [u8; 32],
        body: Vec<u8>,
    ) -> Result<Message, BridgeError> {
        let message = self.prepare_message(caller, dest_domain, recipient, body)?;
        self.commit_message(message.clone());
        Ok(message)
    }

    pub fn next_nonce(&self) -> u64 {
        self.next_nonce
    }

    pub fn sent_message(&self, nonce: u64) -> Option<&Message> {
        self.outbox.get(&nonce)
    }

    pub fn sent_count(&self) -> usize {
        self.outbox.len()
    }

    // ========================================================================
    // Receiving
    // ========================================================================

    pub fn receive_message<H: MessageHandler + ?Sized>(
        &mut self,
        message: &Message,
        attestations: &[Attestation],
        handler: &mut H,
    ) -> Result<ProcessedMessage, BridgeError> {
        if self.paused {
            return Err(BridgeError::BridgePaused);
        }

        let key = (message.source_domain, message.nonce);
        if self.processed.contains_key(&key) {
            return Err(BridgeError::DuplicateNonce {
                source_domain: message.source_domain,
                nonce: message.nonce,
            });
        }

        message.validate_for(self.config.local_domain)?;

        let message_hash = B256::from(message.hash());
        let report = self.registry.verify_quorum(&message_hash, attestations)?;

        let verified = VerifiedMessage::new(message, message_hash, report);
        if let Err(e) = handler.handle_receive_message(&verified) {
            warn!(
                source = %message.source_domain,
                nonce = message.nonce,
                error = %e,
                "Handler rejected verified message, no record written"
            );
            return Err(e);
        }

        let record = ProcessedMessage {
            source_domain: message.source_domain,
            nonce: message.nonce,
            message_hash,
            processed_at: Utc::now(),
        };
        self.processed.insert(key, record.clone());

        info!(
            source = %message.source_domain,
            nonce = message.nonce,
            signers = report.distinct_signers,
            required = report.required,
            "Message processed"
        );
        Ok(record)
    }

    /// Decode the wire form, then receive it.
    pub fn receive_raw<H: MessageHandler + ?Sized>(
        &mut self,
        bytes: &[u8],
        attestations: &[Attestation],
        handler: &mut H,
    ) -> Result<ProcessedMessage, BridgeError> {
        let message = Message::decode(bytes)?;
        self.receive_message(&message, attestations, handler)
    }

    pub fn is_processed(&self, source_domain: DomainId, nonce: u64) -> bool {
        self.processed.contains_key(&(source_domain, nonce))
    }

    pub fn processed(&self, source_domain: DomainId, nonce: u64) -> Option<&ProcessedMessage> {
        self.processed.get(&(source_domain, nonce))
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    // ========================================================================
    // Circuit breaker
    // ========================================================================

    pub fn pause(&mut self, caller: Address) -> Result<(), BridgeError> {
        if caller != self.registry.admin() {
            return Err(BridgeError::Unauthorized);
        }
        self.paused = true;
        warn!(domain = %self.config.local_domain, "Transmitter paused");
        Ok(())
    }

    pub fn unpause(&mut self, caller: Address) -> Result<(), BridgeError> {
        if caller != self.registry.admin() {
            return Err(BridgeError::Unauthorized);
        }
        self.paused = false;
        info!(domain = %self.config.local_domain, "Transmitter unpaused");
        Ok(())
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }
}
