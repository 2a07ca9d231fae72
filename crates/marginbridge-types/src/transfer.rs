//! # Transfer: the authorization unit
//!
//! A [`Transfer`] names the account, the counterparty collateral ledger, the
//! margin-ledger account and market, the amount, and a packed 256-bit
//! [`TransferOptions`] word.
//!
//! ## Options word layout
//!
//! ```text
//!  255            128 127                 8 7      0
//! ┌──────────────────┬─────────────────────┬────────┐
//! │   salt (128)     │  expiration (120)   │ mode 8 │
//! └──────────────────┴─────────────────────┴────────┘
//! ```
//!
//! The raw word is what gets hashed. The decoded fields are only read when
//! the transfer is acted upon.

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

use crate::{BridgeError, Result, constants};

// ---------------------------------------------------------------------------
// TransferMode
// ---------------------------------------------------------------------------

/// The three recognized transfer modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferMode {
    /// Move an exact amount from the margin ledger to the collateral ledger.
    SomeToDestination,
    /// Move an exact amount from the collateral ledger to the margin ledger.
    SomeToSource,
    /// Move the full margin-ledger balance to the collateral ledger.
    AllToDestination,
}

impl TransferMode {
    /// The raw byte stored in the options word.
    #[must_use]
    pub fn as_raw(self) -> RawMode {
        match self {
            Self::SomeToDestination => RawMode(0),
            Self::SomeToSource => RawMode(1),
            Self::AllToDestination => RawMode(2),
        }
    }

    /// Whether funds flow toward the collateral (destination) ledger.
    #[must_use]
    pub fn is_to_destination(self) -> bool {
        !matches!(self, Self::SomeToSource)
    }

    /// Whether the margin-ledger withdrawal targets a zero balance.
    #[must_use]
    pub fn is_all(self) -> bool {
        matches!(self, Self::AllToDestination)
    }
}

impl std::fmt::Display for TransferMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SomeToDestination => write!(f, "SOME_TO_DESTINATION"),
            Self::SomeToSource => write!(f, "SOME_TO_SOURCE"),
            Self::AllToDestination => write!(f, "ALL_TO_DESTINATION"),
        }
    }
}

/// The undecoded low byte of the options word.
///
/// Decoding never fails; [`RawMode::mode`] fails when the byte is acted upon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawMode(pub u8);

impl RawMode {
    /// Map to a [`TransferMode`].
    ///
    /// # Errors
    /// Returns [`BridgeError::InvalidTransferMode`] for any byte other than 0, 1, 2.
    pub fn mode(self) -> Result<TransferMode> {
        match self.0 {
            0 => Ok(TransferMode::SomeToDestination),
            1 => Ok(TransferMode::SomeToSource),
            2 => Ok(TransferMode::AllToDestination),
            other => Err(BridgeError::InvalidTransferMode(other)),
        }
    }
}

impl From<TransferMode> for RawMode {
    fn from(mode: TransferMode) -> Self {
        mode.as_raw()
    }
}

// ---------------------------------------------------------------------------
// TransferOptions
// ---------------------------------------------------------------------------

/// The packed 256-bit options word, kept raw for hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TransferOptions(pub B256);

/// The three subfields of a [`TransferOptions`] word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedOptions {
    /// Low 8 bits.
    pub mode: RawMode,
    /// Bits 8..128. `0` means the signature never expires.
    pub expiration: u128,
    /// Bits 128..256. Caller-chosen, otherwise unused.
    pub salt: u128,
}

impl TransferOptions {
    #[must_use]
    pub fn from_word(word: B256) -> Self {
        Self(word)
    }

    #[must_use]
    pub fn word(&self) -> B256 {
        self.0
    }

    /// Pack the three subfields into a word.
    ///
    /// # Errors
    /// Returns [`BridgeError::InvalidOptions`] if `expiration` does not fit in 120 bits.
    pub fn pack(mode: impl Into<RawMode>, expiration: u128, salt: u128) -> Result<Self> {
        if expiration > constants::MAX_EXPIRATION {
            return Err(BridgeError::InvalidOptions {
                reason: format!("expiration {expiration} exceeds 120 bits"),
            });
        }
        let mut word = [0u8; 32];
        word[..16].copy_from_slice(&salt.to_be_bytes());
        // Byte 16 of the expiration buffer is the (always zero) top byte.
        word[16..31].copy_from_slice(&expiration.to_be_bytes()[1..]);
        word[31] = mode.into().0;
        Ok(Self(B256::from(word)))
    }

    /// Low 8 bits of the word.
    #[must_use]
    pub fn mode(&self) -> RawMode {
        RawMode(self.0[31])
    }

    /// Shift right 8 bits and mask to 120 bits.
    #[must_use]
    pub fn expiration(&self) -> u128 {
        let mut buf = [0u8; 16];
        buf[1..].copy_from_slice(&self.0[16..31]);
        u128::from_be_bytes(buf)
    }

    /// High 128 bits of the word.
    #[must_use]
    pub fn salt(&self) -> u128 {
        let mut buf = [0u8; 16];
        buf.copy_from_slice(&self.0[..16]);
        u128::from_be_bytes(buf)
    }

    #[must_use]
    pub fn decode(&self) -> DecodedOptions {
        DecodedOptions {
            mode: self.mode(),
            expiration: self.expiration(),
            salt: self.salt(),
        }
    }
}

impl From<U256> for TransferOptions {
    fn from(value: U256) -> Self {
        Self(B256::from(value))
    }
}

impl From<TransferOptions> for U256 {
    fn from(options: TransferOptions) -> Self {
        U256::from_be_bytes(options.0.0)
    }
}

// ---------------------------------------------------------------------------
// Transfer
// ---------------------------------------------------------------------------

/// A request to move value between the margin ledger and a collateral ledger.
///
/// Field order matters: it is the order in which fields are hashed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Transfer {
    /// The account holder on both ledgers.
    pub account: Address,
    /// Address of the collateral ledger on the other side.
    pub counterparty: Address,
    /// Account number of `account` on the margin ledger.
    pub margin_account_number: U256,
    /// Market on the margin ledger whose asset is moved.
    pub margin_market_id: U256,
    /// Requested amount. Ignored for the margin withdrawal in `All` mode.
    pub amount: U256,
    /// Packed mode, expiration, and salt.
    pub options: TransferOptions,
}

impl Transfer {
    /// Decode the options word.
    #[must_use]
    pub fn decoded_options(&self) -> DecodedOptions {
        self.options.decode()
    }

    /// Decode and validate the transfer mode.
    ///
    /// # Errors
    /// Returns [`BridgeError::InvalidTransferMode`] for an unmapped mode byte.
    pub fn mode(&self) -> Result<TransferMode> {
        self.options.mode().mode()
    }

    /// The signature expiration (`0` = never).
    #[must_use]
    pub fn expiration(&self) -> u128 {
        self.options.expiration()
    }
}

/// Dummy transfers for testing. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl Transfer {
    /// A `SomeToDestination` transfer with a random salt and no expiration.
    pub fn dummy(account: Address, counterparty: Address, amount: U256) -> Self {
        Self::dummy_with(
            account,
            counterparty,
            amount,
            TransferMode::SomeToDestination,
            0,
        )
    }

    /// A transfer with the given mode and expiration and a random salt.
    pub fn dummy_with(
        account: Address,
        counterparty: Address,
        amount: U256,
        mode: TransferMode,
        expiration: u128,
    ) -> Self {
        let salt = rand::random::<u128>();
        Self {
            account,
            counterparty,
            margin_account_number: U256::ZERO,
            margin_market_id: U256::ZERO,
            amount,
            options: TransferOptions::pack(mode, expiration & constants::MAX_EXPIRATION, salt)
                .unwrap_or_default(),
        }
    }
}
