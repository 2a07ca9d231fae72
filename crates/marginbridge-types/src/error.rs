//! Error types for the MarginBridge proxy.
//!
//! All errors use the `MB_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Transfer / options errors
//! - 2xx: Authorization errors
//! - 3xx: Replay errors
//! - 4xx: Ledger errors
//! - 9xx: General / internal errors

use alloy_primitives::{Address, U256};
use thiserror::Error;

use crate::TransferHash;

/// Which collaborator call a ledger failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerCall {
    /// Asset lookup on either ledger.
    AssetQuery,
    /// Delegate / permission lookup.
    PermissionQuery,
    /// Custody balance lookup.
    BalanceQuery,
    /// Withdrawal from the source ledger.
    Withdraw,
    /// Deposit into the destination ledger.
    Deposit,
    /// Allowance update on an asset contract.
    Approve,
}

impl std::fmt::Display for LedgerCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AssetQuery => write!(f, "ASSET_QUERY"),
            Self::PermissionQuery => write!(f, "PERMISSION_QUERY"),
            Self::BalanceQuery => write!(f, "BALANCE_QUERY"),
            Self::Withdraw => write!(f, "WITHDRAW"),
            Self::Deposit => write!(f, "DEPOSIT"),
            Self::Approve => write!(f, "APPROVE"),
        }
    }
}

/// Failure reported by an external ledger or asset contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The ledger refused the operation.
    #[error("rejected: {reason}")]
    Rejected { reason: String },

    /// Not enough balance to cover the operation.
    #[error("insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: U256, available: U256 },

    /// The spender has not been approved for this amount.
    #[error("insufficient allowance: need {needed}, approved {approved}")]
    InsufficientAllowance { needed: U256, approved: U256 },

    /// The ledger could not be reached.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// Central error enum for all MarginBridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    // =================================================================
    // Transfer / Options Errors (1xx)
    // =================================================================
    /// The decoded transfer mode is not one of the three known modes.
    #[error("MB_ERR_100: Invalid transfer mode: {0}")]
    InvalidTransferMode(u8),

    /// The options word could not be packed (field out of range).
    #[error("MB_ERR_101: Invalid transfer options: {reason}")]
    InvalidOptions { reason: String },

    // =================================================================
    // Authorization Errors (2xx)
    // =================================================================
    /// Neither ownership, delegation, nor a valid signature authorizes the caller.
    #[error("MB_ERR_200: Permission denied: {caller} may not act for {account}")]
    PermissionDenied { caller: Address, account: Address },

    /// The signature's nonzero expiration is in the past.
    #[error("MB_ERR_201: Signature expired at {expiration} (now {now})")]
    SignatureExpired { expiration: u128, now: u64 },

    /// The recovered signer does not match the transfer account.
    #[error("MB_ERR_202: Invalid signature")]
    InvalidSignature,

    /// The signature bytes are not a well-formed typed signature.
    #[error("MB_ERR_203: Malformed signature: {reason}")]
    MalformedSignature { reason: String },

    // =================================================================
    // Replay Errors (3xx)
    // =================================================================
    /// The transfer hash was already consumed or invalidated.
    #[error("MB_ERR_300: Signature already used or invalidated: {0}")]
    SignatureAlreadyUsedOrInvalidated(TransferHash),

    // =================================================================
    // Ledger Errors (4xx)
    // =================================================================
    /// Margin-ledger asset and collateral-ledger asset differ.
    #[error("MB_ERR_400: Asset mismatch: margin ledger uses {margin_asset}, collateral ledger uses {collateral_asset}")]
    AssetMismatch {
        margin_asset: Address,
        collateral_asset: Address,
    },

    /// No collateral ledger is registered under the counterparty address.
    #[error("MB_ERR_401: Unknown counterparty: {0}")]
    UnknownCounterparty(Address),

    /// A collaborator call failed before any funds left the source ledger.
    #[error("MB_ERR_402: Ledger {call} failed: {source}")]
    Ledger {
        call: LedgerCall,
        #[source]
        source: LedgerError,
    },

    /// Funds left the source ledger but the destination deposit failed.
    /// The withdrawn amount sits in bridge custody awaiting reconciliation.
    #[error("MB_ERR_403: Partial execution: {amount} withdrawn to custody, deposit failed: {source}")]
    PartialExecution {
        amount: U256,
        #[source]
        source: LedgerError,
    },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("MB_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("MB_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config file, missing fields, etc.).
    #[error("MB_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

impl BridgeError {
    /// Wrap a collaborator failure with the call it came from.
    pub fn ledger(call: LedgerCall, source: LedgerError) -> Self {
        Self::Ledger { call, source }
    }

    /// The `MB_ERR_` code of this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidTransferMode(_) => "MB_ERR_100",
            Self::InvalidOptions { .. } => "MB_ERR_101",
            Self::PermissionDenied { .. } => "MB_ERR_200",
            Self::SignatureExpired { .. } => "MB_ERR_201",
            Self::InvalidSignature => "MB_ERR_202",
            Self::MalformedSignature { .. } => "MB_ERR_203",
            Self::SignatureAlreadyUsedOrInvalidated(_) => "MB_ERR_300",
            Self::AssetMismatch { .. } => "MB_ERR_400",
            Self::UnknownCounterparty(_) => "MB_ERR_401",
            Self::Ledger { .. } => "MB_ERR_402",
            Self::PartialExecution { .. } => "MB_ERR_403",
            Self::Internal(_) => "MB_ERR_900",
            Self::Serialization(_) => "MB_ERR_901",
            Self::Configuration(_) => "MB_ERR_902",
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, BridgeError>;

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
