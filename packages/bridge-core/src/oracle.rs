//! Oracle quorum adapter
//!
//! EVM-style destinations call their attesters "oracles" and run a fixed
//! 3-of-5 deployment. This is naming only: every method forwards to the
//! generic registry, so oracles are verified by the same code path.

use alloy::primitives::Address;

use crate::error::BridgeError;
use crate::policy::QuorumPolicy;
use crate::registry::{AttesterRegistry, RegistryHandle, RegistryView};

impl AttesterRegistry {
    /// Registry deployed with [`QuorumPolicy::ORACLE`]
    pub fn oracle(admin: Address) -> Self {
        Self::new(admin, QuorumPolicy::ORACLE)
    }
}

impl RegistryHandle {
    pub fn add_oracle(&self, caller: Address, oracle: Address) -> Result<(), BridgeError> {
        self.register_attester(caller, oracle)
    }

    pub fn remove_oracle(&self, caller: Address, oracle: Address) -> Result<(), BridgeError> {
        self.remove_attester(caller, oracle)
    }
}

impl RegistryView {
    pub fn oracle_count(&self) -> usize {
        self.attester_count()
    }

    pub fn is_oracle(&self, address: Address) -> bool {
        self.is_attester(address)
    }
}
