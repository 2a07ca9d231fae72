//! Ledger bridge: moves funds between the margin and collateral ledgers.
//!
//! Two execution shapes, selected by direction:
//!
//! ```text
//! toward destination (Some/All):
//!   before = custody.balance_of(asset, bridge)
//!   margin.withdraw(account, Exact(amount) | All) → bridge
//!   moved  = custody.balance_of(asset, bridge) - before
//!   collateral.deposit(bridge → account, moved)
//!
//! toward source (Some):
//!   collateral.withdraw(account → bridge, amount)
//!   margin.deposit(bridge → account, amount)
//! ```
//!
//! Toward the destination the requested amount is never trusted: the margin
//! ledger decides what a withdrawal actually releases (fees, rounding, or
//! "everything"), so the custody balance is measured around it.
//!
//! The two ledgers cannot commit atomically. If the second call fails after
//! the first succeeded, the moved amount sits in bridge custody and the
//! failure is reported as [`BridgeError::PartialExecution`].

use alloy::primitives::{Address, U256};
use marginbridge_types::{
    AssetCustody, BridgeError, CollateralLedger, LedgerCall, MarginAccount, MarginDeposit,
    MarginLedger, MarginWithdrawal, Result, Transfer, TransferMode, WithdrawAmount,
};

/// Executes one transfer against one margin ledger and one collateral ledger.
#[derive(Clone, Copy)]
pub struct LedgerBridge<'a> {
    /// The bridge's own custody address.
    address: Address,
    margin: &'a dyn MarginLedger,
    collateral: &'a dyn CollateralLedger,
    custody: &'a dyn AssetCustody,
}

impl<'a> LedgerBridge<'a> {
    #[must_use]
    pub fn new(
        address: Address,
        margin: &'a dyn MarginLedger,
        collateral: &'a dyn CollateralLedger,
        custody: &'a dyn AssetCustody,
    ) -> Self {
        Self {
            address,
            margin,
            collateral,
            custody,
        }
    }

    /// Check that the market's asset is the collateral ledger's margin asset.
    ///
    /// # Errors
    /// - [`BridgeError::AssetMismatch`] if the assets differ
    /// - [`BridgeError::Ledger`] if either asset query fails
    pub fn verify_assets(&self, market_id: U256) -> Result<Address> {
        let query = |e| BridgeError::ledger(LedgerCall::AssetQuery, e);
        let margin_asset = self.margin.market_asset(market_id).map_err(query)?;
        let collateral_asset = self.collateral.margin_asset().map_err(query)?;
        if margin_asset != collateral_asset {
            return Err(BridgeError::AssetMismatch {
                margin_asset,
                collateral_asset,
            });
        }
        Ok(margin_asset)
    }

    /// Move funds for `transfer` in the direction of `mode`. Returns the
    /// amount that actually moved.
    ///
    /// `asset` must come from [`verify_assets`](Self::verify_assets).
    ///
    /// # Errors
    /// - [`BridgeError::Ledger`] if a call fails before any funds left the source
    /// - [`BridgeError::PartialExecution`] if the destination deposit fails
    pub fn execute(&self, transfer: &Transfer, mode: TransferMode, asset: Address) -> Result<U256> {
        match mode {
            TransferMode::SomeToDestination => {
                self.to_destination(transfer, asset, WithdrawAmount::Exact(transfer.amount))
            }
            TransferMode::AllToDestination => {
                self.to_destination(transfer, asset, WithdrawAmount::All)
            }
            TransferMode::SomeToSource => self.to_source(transfer),
        }
    }

    fn custody_balance(&self, asset: Address) -> Result<U256> {
        self.custody
            .balance_of(asset, self.address)
            .map_err(|e| BridgeError::ledger(LedgerCall::BalanceQuery, e))
    }

    fn to_destination(
        &self,
        transfer: &Transfer,
        asset: Address,
        amount: WithdrawAmount,
    ) -> Result<U256> {
        let before = self.custody_balance(asset)?;

        self.margin
            .withdraw(MarginWithdrawal {
                account: MarginAccount::new(transfer.account, transfer.margin_account_number),
                market_id: transfer.margin_market_id,
                amount,
                destination: self.address,
            })
            .map_err(|e| BridgeError::ledger(LedgerCall::Withdraw, e))?;

        let after = self.custody_balance(asset)?;
        let moved = after.checked_sub(before).ok_or_else(|| {
            BridgeError::Internal(format!(
                "custody balance fell across withdrawal: {before} -> {after}"
            ))
        })?;

        tracing::debug!(
            account = %transfer.account,
            requested = ?amount,
            before = %before,
            after = %after,
            moved = %moved,
            "Measured margin withdrawal"
        );

        self.collateral
            .deposit(self.address, transfer.account, moved)
            .map_err(|source| BridgeError::PartialExecution {
                amount: moved,
                source,
            })?;

        Ok(moved)
    }

    fn to_source(&self, transfer: &Transfer) -> Result<U256> {
        let amount = transfer.amount;

        self.collateral
            .withdraw(transfer.account, self.address, amount)
            .map_err(|e| BridgeError::ledger(LedgerCall::Withdraw, e))?;

        self.margin
            .deposit(MarginDeposit {
                account: MarginAccount::new(transfer.account, transfer.margin_account_number),
                market_id: transfer.margin_market_id,
                amount,
                source: self.address,
            })
            .map_err(|source| BridgeError::PartialExecution { amount, source })?;

        Ok(amount)
    }
}

impl std::fmt::Debug for LedgerBridge<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerBridge")
            .field("address", &self.address)
            .field("margin", &self.margin.address())
            .field("collateral", &self.collateral.address())
            .finish_non_exhaustive()
    }
}
