//! Identifiers used throughout MarginBridge.
//!
//! A transfer has no identity of its own beyond its content: the
//! [`TransferHash`] is the domain-separated hash of every transfer field.

use std::fmt;

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// TransferHash
// ---------------------------------------------------------------------------

/// Domain-separated hash of a [`Transfer`](crate::Transfer).
///
/// This is the replay key, the signed message, and the event correlation id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TransferHash(pub B256);

impl TransferHash {
    #[must_use]
    pub fn as_b256(&self) -> &B256 {
        &self.0
    }

    /// First four bytes, hex encoded. For log lines.
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl From<B256> for TransferHash {
    fn from(hash: B256) -> Self {
        Self(hash)
    }
}

impl fmt::Display for TransferHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

// ---------------------------------------------------------------------------
// MarginAccount
// ---------------------------------------------------------------------------

/// An account on the margin ledger: the owner plus a per-owner account number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarginAccount {
    pub owner: Address,
    pub number: U256,
}

impl MarginAccount {
    #[must_use]
    pub fn new(owner: Address, number: U256) -> Self {
        Self { owner, number }
    }
}

impl fmt::Display for MarginAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.owner, self.number)
    }
}
