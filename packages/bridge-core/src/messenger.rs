//! Token messenger
//!
//! Burn-on-source / mint-on-destination for the bridge's native token. The
//! messenger never checks signatures itself: minting happens only inside
//! [`MessageHandler::handle_receive_message`], which requires a
//! [`VerifiedMessage`] that only the transmitter can build.
//!
//! ## Burn Body Layout
//!
//! ```text
//! | amount (32, uint256 BE) | recipient (32) |
//! ```

use alloy::primitives::Address;
use std::collections::BTreeMap;
use tracing::info;

use crate::address_codec::{account_from_bytes32, account_to_bytes32};
use crate::error::BridgeError;
use crate::ledger::{BurnEvent, LedgerHandle, MintEvent};
use crate::message::Message;
use crate::registry::RegistryView;
use crate::transmitter::{MessageHandler, MessageTransmitter, VerifiedMessage};
use crate::types::DomainId;

pub const BURN_MESSAGE_LEN: usize = 64;

/// Body of a burn/mint transfer message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurnMessage {
    pub amount: u128,
    pub recipient: [u8; 32],
}

impl BurnMessage {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![0u8; BURN_MESSAGE_LEN];
        out[16..32].copy_from_slice(&self.amount.to_be_bytes());
        out[32..64].copy_from_slice(&self.recipient);
        out
    }

    pub fn decode(body: &[u8]) -> Result<Self, BridgeError> {
        if body.len() != BURN_MESSAGE_LEN {
            return Err(BridgeError::malformed(format!(
                "burn body must be {} bytes, got {}",
                BURN_MESSAGE_LEN,
                body.len()
            )));
        }
        // uint256 on the wire; amounts above u128 cannot have been burned here
        if body[..16].iter().any(|&b| b != 0) {
            return Err(BridgeError::malformed("burn amount exceeds 128 bits"));
        }

        let mut amount = [0u8; 16];
        amount.copy_from_slice(&body[16..32]);
        let mut recipient = [0u8; 32];
        recipient.copy_from_slice(&body[32..64]);

        Ok(Self {
            amount: u128::from_be_bytes(amount),
            recipient,
        })
    }
}

#[derive(Debug)]
pub struct TokenMessenger {
    local_domain: DomainId,
    registry: RegistryView,
    ledger: LedgerHandle,
    balances: BTreeMap<Address, u128>,
    total_supply: u128,
}

impl TokenMessenger {
    pub fn new(local_domain: DomainId, registry: RegistryView, ledger: LedgerHandle) -> Self {
        Self {
            local_domain,
            registry,
            ledger,
            balances: BTreeMap::new(),
            total_supply: 0,
        }
    }

    pub fn balance_of(&self, account: Address) -> u128 {
        self.balances.get(&account).copied().unwrap_or(0)
    }

    /// Supply currently circulating on this domain
    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    pub fn ledger(&self) -> &LedgerHandle {
        &self.ledger
    }

    fn overflow(&self) -> BridgeError {
        BridgeError::LedgerOverflow {
            domain: self.local_domain,
        }
    }

    /// Admin-only genesis or faucet credit
    pub fn fund(&mut self, caller: Address, account: Address, amount: u128) -> Result<u128, BridgeError> {
        if caller != self.registry.admin() {
            return Err(BridgeError::Unauthorized);
        }
        if amount == 0 {
            return Err(BridgeError::InvalidAmount {
                reason: "amount must be greater than zero".to_string(),
            });
        }

        let balance = self
            .balance_of(account)
            .checked_add(amount)
            .ok_or_else(|| self.overflow())?;
        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or_else(|| self.overflow())?;

        self.balances.insert(account, balance);
        self.total_supply = supply;

        info!(domain = %self.local_domain, account = %account, amount, "Account funded");
        Ok(balance)
    }

    /// Burn `amount` from `caller` and send a transfer message to `dest_domain`.
    ///
    /// Either every effect lands (balance debited, ledger incremented,
    /// message in the outbox) or none does.
    pub fn deposit_for_burn(
        &mut self,
        transmitter: &mut MessageTransmitter,
        caller: Address,
        amount: u128,
        dest_domain: DomainId,
        recipient: Address,
    ) -> Result<Message, BridgeError> {
        if amount == 0 {
            return Err(BridgeError::InvalidAmount {
                reason: "amount must be greater than zero".to_string(),
            });
        }
        let available = self.balance_of(caller);
        if available < amount {
            return Err(BridgeError::InsufficientBalance {
                available,
                requested: amount,
            });
        }

        let recipient = account_to_bytes32(&recipient);
        let body = BurnMessage { amount, recipient }.encode();
        let message = transmitter.prepare_message(caller, dest_domain, recipient, body)?;

        self.ledger.record_burn(
            self.local_domain,
            message.nonce,
            BurnEvent {
                amount,
                account: caller,
                tx_ref: message.hash().into(),
            },
        )?;
        transmitter.commit_message(message.clone());

        self.balances.insert(caller, available - amount);
        self.total_supply -= amount;

        info!(
            source = %self.local_domain,
            dest = %dest_domain,
            nonce = message.nonce,
            amount,
            "Deposit burned"
        );
        Ok(message)
    }
}

impl MessageHandler for TokenMessenger {
    fn handle_receive_message(&mut self, verified: &VerifiedMessage<'_>) -> Result<(), BridgeError> {
        let message = verified.message();
        let burn = BurnMessage::decode(&message.body)?;

        if burn.recipient != message.recipient {
            return Err(BridgeError::malformed(
                "burn recipient does not match message recipient",
            ));
        }
        let recipient = account_from_bytes32(&burn.recipient)
            .ok_or_else(|| BridgeError::malformed("recipient is not a 20-byte account"))?;
        if burn.amount == 0 {
            return Err(BridgeError::malformed("zero-amount burn"));
        }

        // Everything fallible is checked before the ledger is touched.
        let balance = self
            .balance_of(recipient)
            .checked_add(burn.amount)
            .ok_or_else(|| self.overflow())?;
        let supply = self
            .total_supply
            .checked_add(burn.amount)
            .ok_or_else(|| self.overflow())?;

        self.ledger.consume_burn(
            message.source_domain,
            message.nonce,
            MintEvent {
                amount: burn.amount,
                account: recipient,
                tx_ref: verified.message_hash(),
            },
        )?;

        self.balances.insert(recipient, balance);
        self.total_supply = supply;

        info!(
            source = %message.source_domain,
            dest = %self.local_domain,
            nonce = message.nonce,
            recipient = %recipient,
            amount = burn.amount,
            "Mint completed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burn_body_layout() {
        let body = BurnMessage {
            amount: 1_000_000,
            recipient: [0x22; 32],
        }
        .encode();
        assert_eq!(body.len(), 64);
        assert_eq!(&body[..16], &[0u8; 16]);
        assert_eq!(&body[28..32], &1_000_000u32.to_be_bytes());
        assert_eq!(&body[32..], &[0x22; 32]);

        let decoded = BurnMessage::decode(&body).unwrap();
        assert_eq!(decoded.amount, 1_000_000);
    }

    #[test]
    fn test_burn_body_rejects_wrong_length_and_huge_amounts() {
        assert!(BurnMessage::decode(&[0u8; 63]).is_err());

        let mut body = BurnMessage {
            amount: 1,
            recipient: [0u8; 32],
        }
        .encode();
        body[0] = 1;
        assert_eq!(
            BurnMessage::decode(&body),
            Err(BridgeError::malformed("burn amount exceeds 128 bits"))
        );
    }
}
