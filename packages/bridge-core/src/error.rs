//! Error types for the attested bridge
//!
//! Every rejected registry mutation, message submission, or burn surfaces one of
//! these variants so callers can decide whether to correct input, retry, or
//! abandon.

use alloy::primitives::Address;
use thiserror::Error;

use crate::types::DomainId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    // ========================================================================
    // Authorization Errors
    // ========================================================================
    #[error("Unauthorized: only admin can perform this action")]
    Unauthorized,

    // ========================================================================
    // Registry Errors
    // ========================================================================
    #[error("Attester already registered: {attester}")]
    AlreadyRegistered { attester: Address },

    #[error("Unknown attester: {attester}")]
    UnknownAttester { attester: Address },

    #[error("Attester set is full: capacity {capacity}")]
    AttesterSetFull { capacity: u32 },

    #[error("Invalid quorum policy: {min_signatures}-of-{total_attesters}")]
    InvalidPolicy {
        min_signatures: u32,
        total_attesters: u32,
    },

    // ========================================================================
    // Message Verification Errors
    // ========================================================================
    #[error("Nonce already processed: source domain {source_domain}, nonce {nonce}")]
    DuplicateNonce { source_domain: DomainId, nonce: u64 },

    #[error("Malformed message: {reason}")]
    MalformedMessage { reason: String },

    #[error("Insufficient attestations: got {got}, need {required}")]
    InsufficientAttestations { got: u32, required: u32 },

    // ========================================================================
    // Transmitter Errors
    // ========================================================================
    #[error("Bridge is paused")]
    BridgePaused,

    #[error("Invalid destination domain: {domain}")]
    InvalidDestination { domain: DomainId },

    #[error("Message body too large: {size} bytes, max {max}")]
    MessageBodyTooLarge { size: usize, max: usize },

    // ========================================================================
    // Amount & Funds Errors
    // ========================================================================
    #[error("Insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance { available: u128, requested: u128 },

    #[error("Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    // ========================================================================
    // Ledger Errors
    // ========================================================================
    #[error("No unconsumed burn for source domain {source_domain}, nonce {nonce}")]
    UnmatchedMint { source_domain: DomainId, nonce: u64 },

    #[error("Ledger overflow on domain {domain}")]
    LedgerOverflow { domain: DomainId },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    #[error("Invalid multisig: {reason}")]
    InvalidMultisig { reason: String },

    #[error("Domain conflict on {domain}: {reason}")]
    DomainConflict { domain: DomainId, reason: String },

    #[error("Unknown domain: {domain}")]
    UnknownDomain { domain: DomainId },
}

/// How a caller should react to a [`BridgeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// More signatures may still arrive; resubmit later
    Retryable,
    /// The nonce can never be processed by this submission path; do not retry
    Terminal,
    /// Caller must correct its input or authorization
    CallerError,
}

impl BridgeError {
    pub fn class(&self) -> ErrorClass {
        match self {
            BridgeError::InsufficientAttestations { .. } => ErrorClass::Retryable,
            BridgeError::DuplicateNonce { .. }
            | BridgeError::MalformedMessage { .. }
            | BridgeError::UnmatchedMint { .. }
            | BridgeError::LedgerOverflow { .. } => ErrorClass::Terminal,
            _ => ErrorClass::CallerError,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Retryable
    }

    /// Short label for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::Unauthorized => "unauthorized",
            BridgeError::AlreadyRegistered { .. } => "already_registered",
            BridgeError::UnknownAttester { .. } => "unknown_attester",
            BridgeError::AttesterSetFull { .. } => "attester_set_full",
            BridgeError::InvalidPolicy { .. } => "invalid_policy",
            BridgeError::DuplicateNonce { .. } => "duplicate_nonce",
            BridgeError::MalformedMessage { .. } => "malformed_message",
            BridgeError::InsufficientAttestations { .. } => "insufficient_attestations",
            BridgeError::BridgePaused => "bridge_paused",
            BridgeError::InvalidDestination { .. } => "invalid_destination",
            BridgeError::MessageBodyTooLarge { .. } => "message_body_too_large",
            BridgeError::InsufficientBalance { .. } => "insufficient_balance",
            BridgeError::InvalidAmount { .. } => "invalid_amount",
            BridgeError::UnmatchedMint { .. } => "unmatched_mint",
            BridgeError::LedgerOverflow { .. } => "ledger_overflow",
            BridgeError::InvalidMultisig { .. } => "invalid_multisig",
            BridgeError::DomainConflict { .. } => "domain_conflict",
            BridgeError::UnknownDomain { .. } => "unknown_domain",
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        BridgeError::MalformedMessage {
            reason: reason.into(),
        }
    }
}
