//! Collaborator traits for the two ledgers and the asset contracts.
//!
//! The bridge never holds ledger state itself. Everything it knows about
//! balances, assets, and delegation comes through these traits, and every
//! call may fail with a [`LedgerError`].
//!
//! Implementations take `&self` and are shared across threads; any mutable
//! state behind them is the implementation's concern.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::{LedgerError, MarginAccount};

/// Result alias for collaborator calls.
pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// How much to take out of a margin account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WithdrawAmount {
    /// Withdraw exactly this amount (a delta).
    Exact(U256),
    /// Reduce the account's balance to zero (a target). The amount that
    /// actually moves is whatever the ledger decides.
    All,
}

/// A withdrawal from the margin ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginWithdrawal {
    pub account: MarginAccount,
    pub market_id: U256,
    pub amount: WithdrawAmount,
    /// Who receives the withdrawn asset.
    pub destination: Address,
}

/// A deposit into the margin ledger, pulled from `source`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginDeposit {
    pub account: MarginAccount,
    pub market_id: U256,
    pub amount: U256,
    /// Who the asset is pulled from. Needs an allowance toward the ledger.
    pub source: Address,
}

/// The margin-lending ledger ("A").
pub trait MarginLedger: Send + Sync {
    /// The ledger's own address (the spender for deposits).
    fn address(&self) -> Address;

    /// The asset traded in `market_id`.
    fn market_asset(&self, market_id: U256) -> LedgerResult<Address>;

    /// Whether `operator` may act for `owner` on this ledger.
    fn is_local_operator(&self, owner: Address, operator: Address) -> LedgerResult<bool>;

    /// Whether `operator` may act for every account on this ledger.
    fn is_global_operator(&self, operator: Address) -> LedgerResult<bool>;

    fn withdraw(&self, withdrawal: MarginWithdrawal) -> LedgerResult<()>;

    fn deposit(&self, deposit: MarginDeposit) -> LedgerResult<()>;
}

/// A derivatives-collateral ledger ("B"). Several may exist, one per
/// counterparty address.
pub trait CollateralLedger: Send + Sync {
    /// The ledger's own address (the transfer's counterparty).
    fn address(&self) -> Address;

    /// The asset this ledger uses as margin.
    fn margin_asset(&self) -> LedgerResult<Address>;

    /// Whether `operator` may act for `account` on this ledger.
    fn has_account_permissions(&self, account: Address, operator: Address) -> LedgerResult<bool>;

    /// Credit `account` with `amount`, pulled from `source`.
    fn deposit(&self, source: Address, account: Address, amount: U256) -> LedgerResult<()>;

    /// Debit `account` by `amount` and send it to `destination`.
    fn withdraw(&self, account: Address, destination: Address, amount: U256) -> LedgerResult<()>;
}

/// The asset contracts holding bridge custody between ledger calls.
pub trait AssetCustody: Send + Sync {
    fn balance_of(&self, asset: Address, holder: Address) -> LedgerResult<U256>;

    /// Set `owner`'s allowance toward `spender` to exactly `amount`.
    fn approve(
        &self,
        asset: Address,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> LedgerResult<()>;

    fn allowance(&self, asset: Address, owner: Address, spender: Address) -> LedgerResult<U256>;
}
