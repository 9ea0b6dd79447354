//! Bridge Node - Library interface
//!
//! Re-exports internal modules for use in integration tests.

pub mod attester;
pub mod bounded_cache;
pub mod config;
pub mod metrics;
pub mod network;
pub mod node;
pub mod relayer;
pub mod retry;
pub mod server;
pub mod store;
