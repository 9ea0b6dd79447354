//! Attester signatures over message hashes
//!
//! Attestations are recoverable secp256k1 signatures over the raw 32-byte
//! message hash. They are immutable facts: signing the same message twice
//! yields an attestation from the same signer, which quorum counting
//! de-duplicates.

use alloy::primitives::{Address, Bytes, PrimitiveSignature, B256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use eyre::{eyre, Result};
use serde::{Deserialize, Serialize};

use crate::message::Message;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attestation {
    pub message_hash: B256,
    pub attester: Address,
    /// 65-byte `r || s || v` signature
    pub signature: Bytes,
}

impl Attestation {
    /// Recover the address that produced `signature` over `message_hash`.
    pub fn recover_signer(&self) -> Option<Address> {
        let signature = PrimitiveSignature::try_from(self.signature.as_ref()).ok()?;
        signature
            .recover_address_from_prehash(&self.message_hash)
            .ok()
    }

    /// True if this attestation is over `expected_hash` and signed by the
    /// claimed attester. Registry membership is checked separately.
    pub fn is_signed_over(&self, expected_hash: &B256) -> bool {
        if &self.message_hash != expected_hash {
            return false;
        }
        self.recover_signer() == Some(self.attester)
    }
}

/// Off-chain signing key of one attester
pub struct AttestationSigner {
    signer: PrivateKeySigner,
}

impl AttestationSigner {
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self { signer }
    }

    /// Create from a hex private key (with or without 0x prefix)
    pub fn from_private_key(private_key: &str) -> Result<Self> {
        let signer: PrivateKeySigner = private_key
            .trim()
            .parse()
            .map_err(|e| eyre!("Invalid attester private key: {}", e))?;
        Ok(Self::new(signer))
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn sign_hash(&self, message_hash: B256) -> Result<Attestation> {
        let signature = self
            .signer
            .sign_hash_sync(&message_hash)
            .map_err(|e| eyre!("Failed to sign message hash: {}", e))?;

        Ok(Attestation {
            message_hash,
            attester: self.address(),
            signature: Bytes::from(signature.as_bytes().to_vec()),
        })
    }

    pub fn attest(&self, message: &Message) -> Result<Attestation> {
        self.sign_hash(B256::from(message.hash()))
    }
}

impl std::fmt::Debug for AttestationSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttestationSigner")
            .field("address", &self.address())
            .field("private_key", &"<redacted>")
            .finish()
    }
}
