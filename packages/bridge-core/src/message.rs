//! Cross-domain message envelope
//!
//! A [`Message`] is domain-agnostic: the transmitter only cares about the
//! header and the body hash, while the body itself is interpreted by the
//! registered handler (the token messenger for burn/mint transfers).
//!
//! Wire form is the packed 116-byte header followed by the raw body.

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::hash::{bytes32_to_hex, compute_message_hash, keccak256, pack_message_header, MESSAGE_HEADER_LEN};
use crate::types::DomainId;

/// Envelope version understood by this implementation
pub const MESSAGE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub version: u32,
    pub source_domain: DomainId,
    pub dest_domain: DomainId,
    pub nonce: u64,
    /// Universal 32-byte sender account
    pub sender: [u8; 32],
    /// Universal 32-byte recipient account
    pub recipient: [u8; 32],
    /// keccak256 of `body`, committed to by the message hash
    pub body_hash: [u8; 32],
    #[serde(with = "hex_body")]
    pub body: Vec<u8>,
}

impl Message {
    /// Build a message, committing to the body hash.
    pub fn new(
        source_domain: DomainId,
        dest_domain: DomainId,
        nonce: u64,
        sender: [u8; 32],
        recipient: [u8; 32],
        body: Vec<u8>,
    ) -> Self {
        Self {
            version: MESSAGE_VERSION,
            source_domain,
            dest_domain,
            nonce,
            sender,
            recipient,
            body_hash: keccak256(&body),
            body,
        }
    }

    /// Hash attesters sign. Commits to the declared `body_hash`, not the body.
    pub fn hash(&self) -> [u8; 32] {
        compute_message_hash(
            self.version,
            self.source_domain.as_bytes(),
            self.dest_domain.as_bytes(),
            self.nonce,
            &self.sender,
            &self.recipient,
            &self.body_hash,
        )
    }

    pub fn hash_hex(&self) -> String {
        bytes32_to_hex(&self.hash())
    }

    /// Check the envelope is internally consistent and addressed to `local_domain`.
    pub fn validate_for(&self, local_domain: DomainId) -> Result<(), BridgeError> {
        if self.version != MESSAGE_VERSION {
            return Err(BridgeError::malformed(format!(
                "unsupported version {}",
                self.version
            )));
        }
        if self.dest_domain != local_domain {
            return Err(BridgeError::malformed(format!(
                "addressed to domain {}, this is domain {}",
                self.dest_domain, local_domain
            )));
        }
        if keccak256(&self.body) != self.body_hash {
            return Err(BridgeError::malformed("body does not match body hash"));
        }
        Ok(())
    }

    pub fn encode(&self) -> Vec<u8> {
        let header = pack_message_header(
            self.version,
            self.source_domain.as_bytes(),
            self.dest_domain.as_bytes(),
            self.nonce,
            &self.sender,
            &self.recipient,
            &self.body_hash,
        );
        let mut out = Vec::with_capacity(MESSAGE_HEADER_LEN + self.body.len());
        out.extend_from_slice(&header);
        out.extend_from_slice(&self.body);
        out
    }

    /// Decode the wire form. Body/hash consistency is checked on receive, not here.
    pub fn decode(bytes: &[u8]) -> Result<Self, BridgeError> {
        if bytes.len() < MESSAGE_HEADER_LEN {
            return Err(BridgeError::malformed(format!(
                "message too short: {} bytes, header is {}",
                bytes.len(),
                MESSAGE_HEADER_LEN
            )));
        }

        let version = u32::from_be_bytes(read_array(bytes, 0));
        let source_domain = DomainId(read_array(bytes, 4));
        let dest_domain = DomainId(read_array(bytes, 8));
        let nonce = u64::from_be_bytes(read_array(bytes, 12));

        Ok(Self {
            version,
            source_domain,
            dest_domain,
            nonce,
            sender: read_array(bytes, 20),
            recipient: read_array(bytes, 52),
            body_hash: read_array(bytes, 84),
            body: bytes[MESSAGE_HEADER_LEN..].to_vec(),
        })
    }
}

/// Copy `N` bytes at `offset`; callers have already checked the length.
fn read_array<const N: usize>(bytes: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[offset..offset + N]);
    out
}

mod hex_body {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(body)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(serde::de::Error::custom)
    }
}
