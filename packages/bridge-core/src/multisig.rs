//! Deterministic multisig address derivation
//!
//! Governance addresses are derived, not generated: every chain and every
//! auditor computes the same address from the same signer keys and threshold,
//! independent of the order the keys were supplied in.
//!
//! ```text
//! digest = keccak256("attested-bridge/multisig/v1" || threshold (u16 BE)
//!                    || signer_count (u16 BE) || sorted_signer_keys...)
//! ```
//!
//! The EVM address is the last 20 bytes of the digest; the bech32 form
//! encodes the same 20 bytes under a chain prefix.

use alloy::primitives::Address;
use eyre::Result;
use serde::Serialize;

use crate::address_codec::encode_bech32_address;
use crate::error::BridgeError;
use crate::hash::keccak256;

/// Fixed prefix separating multisig digests from every other keccak use
pub const MULTISIG_DOMAIN_PREFIX: &[u8] = b"attested-bridge/multisig/v1";

fn invalid(reason: impl Into<String>) -> BridgeError {
    BridgeError::InvalidMultisig {
        reason: reason.into(),
    }
}

/// Canonical signer set and threshold
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MultisigSpec {
    sorted_signers: Vec<Vec<u8>>,
    threshold: u16,
}

impl MultisigSpec {
    /// Validate and canonicalize. Keys are opaque encoded public keys and
    /// must all share one encoding length.
    pub fn new(signers: Vec<Vec<u8>>, threshold: u16) -> Result<Self, BridgeError> {
        if signers.is_empty() {
            return Err(invalid("signer set cannot be empty"));
        }
        let count = u16::try_from(signers.len())
            .map_err(|_| invalid(format!("too many signers: {}", signers.len())))?;
        if threshold == 0 {
            return Err(invalid("threshold must be at least 1"));
        }
        if threshold > count {
            return Err(invalid(format!(
                "threshold {} exceeds signer count {}",
                threshold, count
            )));
        }

        let key_len = signers[0].len();
        if key_len == 0 {
            return Err(invalid("signer key cannot be empty"));
        }
        if signers.iter().any(|k| k.len() != key_len) {
            return Err(invalid("signer keys must share one encoding length"));
        }

        let mut sorted_signers = signers;
        sorted_signers.sort();
        if sorted_signers.windows(2).any(|w| w[0] == w[1]) {
            return Err(invalid("duplicate signer key"));
        }

        Ok(Self {
            sorted_signers,
            threshold,
        })
    }

    /// Parse hex-encoded keys (with or without 0x prefix).
    pub fn from_hex_keys<S: AsRef<str>>(keys: &[S], threshold: u16) -> Result<Self> {
        let signers = keys
            .iter()
            .map(|k| {
                let k = k.as_ref().trim();
                hex::decode(k.strip_prefix("0x").unwrap_or(k))
                    .map_err(|e| eyre::eyre!("Invalid signer key '{}': {}", k, e))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(signers, threshold)?)
    }

    pub fn threshold(&self) -> u16 {
        self.threshold
    }

    pub fn signers(&self) -> &[Vec<u8>] {
        &self.sorted_signers
    }

    pub fn derive(&self) -> DerivedAddress {
        let count = self.sorted_signers.len() as u16;
        let mut preimage = Vec::with_capacity(
            MULTISIG_DOMAIN_PREFIX.len() + 4 + self.sorted_signers.iter().map(Vec::len).sum::<usize>(),
        );
        preimage.extend_from_slice(MULTISIG_DOMAIN_PREFIX);
        preimage.extend_from_slice(&self.threshold.to_be_bytes());
        preimage.extend_from_slice(&count.to_be_bytes());
        for key in &self.sorted_signers {
            preimage.extend_from_slice(key);
        }

        DerivedAddress {
            digest: keccak256(&preimage),
        }
    }

    /// Re-derive and compare, for audit of a deployed governance address.
    pub fn verify(&self, expected: Address) -> bool {
        self.derive().to_evm() == expected
    }
}

/// Convenience wrapper: validate, canonicalize, derive.
pub fn derive(signers: Vec<Vec<u8>>, threshold: u16) -> Result<DerivedAddress, BridgeError> {
    Ok(MultisigSpec::new(signers, threshold)?.derive())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DerivedAddress {
    digest: [u8; 32],
}

impl DerivedAddress {
    pub fn digest(&self) -> [u8; 32] {
        self.digest
    }

    fn tail(&self) -> [u8; 20] {
        let mut out = [0u8; 20];
        out.copy_from_slice(&self.digest[12..]);
        out
    }

    pub fn to_evm(&self) -> Address {
        Address::from(self.tail())
    }

    pub fn to_bech32(&self, hrp: &str) -> Result<String> {
        encode_bech32_address(&self.tail(), hrp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address_codec::decode_bech32_address;

    fn keys() -> Vec<Vec<u8>> {
        vec![vec![0x03; 33], vec![0x02; 33], vec![0x04; 33]]
    }

    #[test]
    fn test_order_independent() {
        let a = derive(keys(), 2).unwrap();
        let mut reversed = keys();
        reversed.reverse();
        let b = derive(reversed, 2).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_threshold_and_membership_change_address() {
        let base = derive(keys(), 2).unwrap();
        assert_ne!(base, derive(keys(), 3).unwrap());

        let mut other = keys();
        other[0][5] ^= 1;
        assert_ne!(base, derive(other, 2).unwrap());

        let mut fewer = keys();
        fewer.pop();
        assert_ne!(base, derive(fewer, 2).unwrap());
    }

    #[test]
    fn test_invalid_specs() {
        assert!(derive(vec![], 1).is_err());
        assert!(derive(keys(), 0).is_err());
        assert!(derive(keys(), 4).is_err());

        let mut dup = keys();
        dup.push(vec![0x02; 33]);
        assert_eq!(
            derive(dup, 2),
            Err(BridgeError::InvalidMultisig {
                reason: "duplicate signer key".to_string()
            })
        );

        let mut mixed = keys();
        mixed.push(vec![0x05; 20]);
        assert!(derive(mixed, 2).is_err());
    }

    #[test]
    fn test_encodings_share_bytes() {
        let derived = derive(keys(), 2).unwrap();
        let evm = derived.to_evm();
        assert_eq!(&evm.0 .0, &derived.digest()[12..]);

        let terra = derived.to_bech32("terra").unwrap();
        assert!(terra.starts_with("terra1"));
        let (raw, hrp) = decode_bech32_address(&terra).unwrap();
        assert_eq!(hrp, "terra");
        assert_eq!(raw, evm.0 .0);
    }

    #[test]
    fn test_verify_and_hex_keys() {
        let hex_keys: Vec<String> = keys().iter().map(|k| format!("0x{}", hex::encode(k))).collect();
        let spec = MultisigSpec::from_hex_keys(&hex_keys, 2).unwrap();
        let expected = derive(keys(), 2).unwrap().to_evm();
        assert!(spec.verify(expected));
        assert!(!spec.verify(Address::ZERO));
        assert!(MultisigSpec::from_hex_keys(&["zz"], 1).is_err());
    }
}
