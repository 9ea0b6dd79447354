//! Bridge-Core: Attested Burn/Mint Bridge Library
//!
//! This crate holds the on-chain half of the bridge, shared by the node and
//! its tests:
//!
//! - **Attester Registry** - Admin-managed attester set with an immutable k-of-n policy
//! - **Oracle Adapter** - The 3-of-5 oracle deployment of the same registry
//! - **Message Transmitter** - Monotonic nonces, quorum verification, exactly-once processing
//! - **Token Messenger** - Burn on source, mint on destination
//! - **Lock Ledger** - Per-source-chain accounting of value in transit
//! - **Multisig Deriver** - Deterministic governance addresses from signer keys
//! - **Codecs** - Message header/hash, attestations, universal account encoding
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! bridge-core = { path = "../bridge-core" }
//! ```

pub mod address_codec;
pub mod attestation;
pub mod bridge;
pub mod error;
pub mod hash;
pub mod ledger;
pub mod message;
pub mod messenger;
pub mod multisig;
pub mod oracle;
pub mod policy;
pub mod registry;
pub mod transmitter;
pub mod types;

// Re-export commonly used items at the crate root
pub use address_codec::{
    account_from_bytes32, account_to_bytes32, decode_bech32_address, encode_bech32_address,
    parse_account, parse_evm_address,
};
pub use attestation::{Attestation, AttestationSigner};
pub use bridge::ChainBridge;
pub use error::{BridgeError, ErrorClass};
pub use hash::{bytes32_to_hex, compute_message_hash, keccak256, MESSAGE_HEADER_LEN};
pub use ledger::{BurnEvent, InTransit, LedgerEntry, LedgerHandle, LockLedger, MintEvent};
pub use message::{Message, MESSAGE_VERSION};
pub use messenger::{BurnMessage, TokenMessenger, BURN_MESSAGE_LEN};
pub use multisig::{derive, DerivedAddress, MultisigSpec, MULTISIG_DOMAIN_PREFIX};
pub use policy::QuorumPolicy;
pub use registry::{Attester, AttesterRegistry, QuorumReport, RegistryHandle, RegistryView};
pub use transmitter::{
    MessageHandler, MessageTransmitter, ProcessedMessage, TransmitterConfig, VerifiedMessage,
    DEFAULT_MAX_MESSAGE_BODY_SIZE,
};
pub use types::{DomainId, DomainTable, MessageStatus};
