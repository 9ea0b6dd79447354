//! k-of-n quorum policy
//!
//! One value type covers every deployment: the generic attester registry and
//! the fixed oracle set differ only in the numbers passed here.

use serde::Serialize;
use std::fmt;

use crate::error::BridgeError;

/// Fixed at construction; `1 <= min_signatures <= total_attesters`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct QuorumPolicy {
    min_signatures: u32,
    total_attesters: u32,
}

impl QuorumPolicy {
    /// Oracle deployment used on EVM-style destination chains: 3-of-5
    pub const ORACLE: QuorumPolicy = QuorumPolicy {
        min_signatures: 3,
        total_attesters: 5,
    };

    pub fn new(min_signatures: u32, total_attesters: u32) -> Result<Self, BridgeError> {
        if min_signatures == 0 || min_signatures > total_attesters {
            return Err(BridgeError::InvalidPolicy {
                min_signatures,
                total_attesters,
            });
        }
        Ok(Self {
            min_signatures,
            total_attesters,
        })
    }

    /// k
    pub fn min_signatures(&self) -> u32 {
        self.min_signatures
    }

    /// n, also the capacity of the active attester set
    pub fn total_attesters(&self) -> u32 {
        self.total_attesters
    }

    pub fn is_met(&self, distinct_valid_signers: usize) -> bool {
        distinct_valid_signers >= self.min_signatures as usize
    }
}

impl fmt::Display for QuorumPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-of-{}", self.min_signatures, self.total_attesters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_bounds() {
        assert!(QuorumPolicy::new(1, 1).is_ok());
        assert!(QuorumPolicy::new(3, 5).is_ok());
        assert_eq!(
            QuorumPolicy::new(0, 5),
            Err(BridgeError::InvalidPolicy {
                min_signatures: 0,
                total_attesters: 5
            })
        );
        assert!(QuorumPolicy::new(6, 5).is_err());
    }

    #[test]
    fn test_oracle_policy() {
        assert_eq!(QuorumPolicy::ORACLE, QuorumPolicy::new(3, 5).unwrap());
        assert_eq!(QuorumPolicy::ORACLE.to_string(), "3-of-5");
        assert!(!QuorumPolicy::ORACLE.is_met(2));
        assert!(QuorumPolicy::ORACLE.is_met(3));
    }
}
