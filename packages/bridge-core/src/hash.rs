//! Hash computation for cross-domain messages
//!
//! Message identities are keccak256 over a packed (no padding) header so that
//! every chain and every attester computes byte-identical hashes.
//!
//! ## Header Layout
//!
//! ```text
//! | version (4) | source (4) | dest (4) | nonce (8) | sender (32) | recipient (32) | body_hash (32) |
//! ```

use tiny_keccak::{Hasher, Keccak};

/// Packed header length in bytes
pub const MESSAGE_HEADER_LEN: usize = 4 + 4 + 4 + 8 + 32 + 32 + 32;

/// Compute keccak256 hash of data
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut output = [0u8; 32];
    hasher.finalize(&mut output);
    output
}

/// Pack a message header into its fixed 116-byte form.
pub fn pack_message_header(
    version: u32,
    source_domain: &[u8; 4],
    dest_domain: &[u8; 4],
    nonce: u64,
    sender: &[u8; 32],
    recipient: &[u8; 32],
    body_hash: &[u8; 32],
) -> [u8; MESSAGE_HEADER_LEN] {
    let mut data = [0u8; MESSAGE_HEADER_LEN];
    data[0..4].copy_from_slice(&version.to_be_bytes());
    data[4..8].copy_from_slice(source_domain);
    data[8..12].copy_from_slice(dest_domain);
    data[12..20].copy_from_slice(&nonce.to_be_bytes());
    data[20..52].copy_from_slice(sender);
    data[52..84].copy_from_slice(recipient);
    data[84..116].copy_from_slice(body_hash);
    data
}

/// Compute the message hash attesters sign.
pub fn compute_message_hash(
    version: u32,
    source_domain: &[u8; 4],
    dest_domain: &[u8; 4],
    nonce: u64,
    sender: &[u8; 32],
    recipient: &[u8; 32],
    body_hash: &[u8; 32],
) -> [u8; 32] {
    keccak256(&pack_message_header(
        version,
        source_domain,
        dest_domain,
        nonce,
        sender,
        recipient,
        body_hash,
    ))
}

/// Convert an EVM address to bytes32 (left-padded with zeros)
pub fn address_to_bytes32(addr: &[u8; 20]) -> [u8; 32] {
    let mut result = [0u8; 32];
    result[12..32].copy_from_slice(addr);
    result
}

/// Extract a 20-byte address from bytes32, rejecting non-zero padding.
pub fn bytes32_to_address(bytes: &[u8; 32]) -> Option<[u8; 20]> {
    if bytes[..12].iter().any(|&b| b != 0) {
        return None;
    }
    let mut result = [0u8; 20];
    result.copy_from_slice(&bytes[12..32]);
    Some(result)
}

/// Convert bytes to hex string with 0x prefix
pub fn bytes32_to_hex(bytes: &[u8; 32]) -> String {
    format!("0x{}", hex::encode(bytes))
}
