//! Common types for cross-domain messaging
//!
//! Domain identifiers, message status, and the append-only domain table.

use eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::BridgeError;

// ============================================================================
// Domain ID (4 bytes)
// ============================================================================

/// 4-byte domain identifier for a chain participating in the bridge.
///
/// Domains are small sequential integers stored big-endian so that they hash
/// the same way on every chain.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct DomainId(pub [u8; 4]);

impl DomainId {
    /// Create from u32
    pub fn from_u32(id: u32) -> Self {
        DomainId(id.to_be_bytes())
    }

    /// Convert to u32
    pub fn to_u32(&self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Create from hex string (with or without 0x prefix)
    pub fn from_hex(hex: &str) -> Result<Self> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let bytes = hex::decode(hex)?;
        if bytes.len() != 4 {
            return Err(eyre!("DomainId must be 4 bytes, got {}", bytes.len()));
        }
        let mut result = [0u8; 4];
        result.copy_from_slice(&bytes);
        Ok(DomainId(result))
    }

    /// Convert to hex string with 0x prefix
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_u32())
    }
}

impl From<u32> for DomainId {
    fn from(id: u32) -> Self {
        DomainId::from_u32(id)
    }
}

impl From<[u8; 4]> for DomainId {
    fn from(bytes: [u8; 4]) -> Self {
        DomainId(bytes)
    }
}

// ============================================================================
// Message Status
// ============================================================================

/// Lifecycle of a cross-domain message as seen by the read surface.
///
/// `Attested` is an off-chain observation (quorum of signatures staged in the
/// attestation store); only `Processed` is recorded on the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Attested,
    Processed,
}

impl MessageStatus {
    /// Get the status as a lowercase string
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Sent => "sent",
            MessageStatus::Attested => "attested",
            MessageStatus::Processed => "processed",
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Domain Table
// ============================================================================

/// Stable, append-only mapping between domain ids and chain names.
///
/// Once an id is bound to a name neither side can be rebound.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainTable {
    by_id: BTreeMap<DomainId, String>,
}

impl DomainTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `id` to `name`. Re-registering the exact same pair is a no-op.
    pub fn register(&mut self, id: DomainId, name: &str) -> Result<(), BridgeError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BridgeError::DomainConflict {
                domain: id,
                reason: "domain name cannot be empty".to_string(),
            });
        }

        if let Some(existing) = self.by_id.get(&id) {
            if existing == name {
                return Ok(());
            }
            return Err(BridgeError::DomainConflict {
                domain: id,
                reason: format!("already bound to '{}'", existing),
            });
        }

        if let Some(other) = self.id_of(name) {
            return Err(BridgeError::DomainConflict {
                domain: id,
                reason: format!("name '{}' already bound to domain {}", name, other),
            });
        }

        self.by_id.insert(id, name.to_string());
        Ok(())
    }

    pub fn name_of(&self, id: DomainId) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }

    pub fn id_of(&self, name: &str) -> Option<DomainId> {
        self.by_id
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(id, _)| *id)
    }

    pub fn contains(&self, id: DomainId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Domains in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = (DomainId, &str)> {
        self.by_id.iter().map(|(id, name)| (*id, name.as_str()))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
