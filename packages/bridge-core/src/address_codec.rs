//! Account encoding across domains
//!
//! Accounts travel inside messages as 32-byte universal values: a 20-byte
//! account left-padded with zeros. Off-chain they are rendered either as
//! 0x-prefixed hex (EVM domains) or bech32 with a chain prefix (Cosmos-style
//! domains). Both renderings carry the same 20 raw bytes.

use alloy::primitives::Address;
use bech32::{FromBase32, ToBase32, Variant};
use eyre::{eyre, Result};

use crate::hash::{address_to_bytes32, bytes32_to_address};

/// Encode an account as its 32-byte universal form
pub fn account_to_bytes32(account: &Address) -> [u8; 32] {
    address_to_bytes32(&account.0 .0)
}

/// Decode a 32-byte universal account; `None` if the padding is not zero
pub fn account_from_bytes32(bytes: &[u8; 32]) -> Option<Address> {
    bytes32_to_address(bytes).map(Address::from)
}

/// Parse an account from either 0x hex or bech32.
pub fn parse_account(value: &str) -> Result<Address> {
    let value = value.trim();
    if value.starts_with("0x") || value.len() == 40 {
        return Ok(Address::from(parse_evm_address(value)?));
    }
    let (raw, _hrp) = decode_bech32_address(value)?;
    Ok(Address::from(raw))
}

/// Parse a 0x-prefixed hex EVM address to 20 bytes
pub fn parse_evm_address(addr: &str) -> Result<[u8; 20]> {
    let hex_str = addr.strip_prefix("0x").unwrap_or(addr);

    if hex_str.len() != 40 {
        return Err(eyre!(
            "Invalid EVM address length: expected 40 hex chars, got {}",
            hex_str.len()
        ));
    }

    let bytes = hex::decode(hex_str)?;
    let mut result = [0u8; 20];
    result.copy_from_slice(&bytes);
    Ok(result)
}

/// Decode a bech32 address to raw 20 bytes, returning (raw_bytes, hrp)
pub fn decode_bech32_address(addr: &str) -> Result<([u8; 20], String)> {
    let (hrp, data, _variant) =
        bech32::decode(addr).map_err(|e| eyre!("Invalid bech32 address: {}", e))?;

    let bytes = Vec::<u8>::from_base32(&data).map_err(|e| eyre!("Invalid base32 data: {}", e))?;

    if bytes.len() != 20 {
        return Err(eyre!(
            "Invalid address length: expected 20 bytes, got {}",
            bytes.len()
        ));
    }

    let mut result = [0u8; 20];
    result.copy_from_slice(&bytes);
    Ok((result, hrp))
}

/// Encode raw 20 bytes to a bech32 address with the given prefix
pub fn encode_bech32_address(bytes: &[u8; 20], hrp: &str) -> Result<String> {
    bech32::encode(hrp, bytes.to_base32(), Variant::Bech32)
        .map_err(|e| eyre!("Failed to encode bech32: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_bytes32_padding() {
        let account: Address = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
            .parse()
            .unwrap();
        let universal = account_to_bytes32(&account);
        assert_eq!(&universal[..12], &[0u8; 12]);
        assert_eq!(account_from_bytes32(&universal), Some(account));

        let mut dirty = universal;
        dirty[3] = 0xff;
        assert_eq!(account_from_bytes32(&dirty), None);
    }

    #[test]
    fn test_parse_account_accepts_hex_and_bech32() {
        let terra = "terra1x46rqay4d3cssq8gxxvqz8xt6nwlz4td20k38v";
        let from_bech32 = parse_account(terra).unwrap();

        let hex_form = format!("0x{}", hex::encode(from_bech32.0 .0));
        let from_hex = parse_account(&hex_form).unwrap();
        assert_eq!(from_bech32, from_hex);

        let back = encode_bech32_address(&from_hex.0 .0, "terra").unwrap();
        assert_eq!(back, terra);
    }

    #[test]
    fn test_parse_account_rejects_garbage() {
        assert!(parse_account("0xdead").is_err());
        assert!(parse_account("not-an-address").is_err());
    }
}
