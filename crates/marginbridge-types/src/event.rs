//! Event records emitted by the bridge.
//!
//! Every completed transfer and every invalidation produces one record.
//! Records are the only history the bridge produces; they are handed to an
//! event sink and never read back by the core.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::{Transfer, TransferHash};

/// A transfer moved funds between the ledgers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferCompleted {
    pub account: Address,
    pub counterparty: Address,
    pub margin_account_number: U256,
    pub margin_market_id: U256,
    /// `true` when funds moved margin → collateral.
    pub to_destination: bool,
    /// The amount that actually moved (measured, not requested).
    pub amount: U256,
}

impl TransferCompleted {
    #[must_use]
    pub fn new(transfer: &Transfer, to_destination: bool, amount: U256) -> Self {
        Self {
            account: transfer.account,
            counterparty: transfer.counterparty,
            margin_account_number: transfer.margin_account_number,
            margin_market_id: transfer.margin_market_id,
            to_destination,
            amount,
        }
    }
}

/// A transfer hash was marked used without moving funds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureInvalidated {
    pub account: Address,
    pub transfer_hash: TransferHash,
}

/// Any record the bridge emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BridgeEvent {
    Transferred(TransferCompleted),
    SignatureInvalidated(SignatureInvalidated),
}

impl BridgeEvent {
    /// The account the event concerns.
    #[must_use]
    pub fn account(&self) -> Address {
        match self {
            Self::Transferred(e) => e.account,
            Self::SignatureInvalidated(e) => e.account,
        }
    }
}

impl std::fmt::Display for BridgeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transferred(_) => write!(f, "TRANSFERRED"),
            Self::SignatureInvalidated(_) => write!(f, "SIGNATURE_INVALIDATED"),
        }
    }
}

impl From<TransferCompleted> for BridgeEvent {
    fn from(event: TransferCompleted) -> Self {
        Self::Transferred(event)
    }
}

impl From<SignatureInvalidated> for BridgeEvent {
    fn from(event: SignatureInvalidated) -> Self {
        Self::SignatureInvalidated(event)
    }
}
