//! Permission resolver: may the caller act for the transfer's account?
//!
//! Delegation is direction-specific: the ledger the funds come *from* is
//! the one whose delegation counts.
//!
//! | direction           | who decides                                   |
//! |---------------------|-----------------------------------------------|
//! | toward destination  | margin ledger: local or global operator       |
//! | toward source       | collateral ledger: account permissions        |
//!
//! The account holder is always permitted and no ledger is queried. A
//! resolver built without a collateral ledger can still answer for the
//! holder and for destination-bound transfers.

use alloy::primitives::Address;
use marginbridge_types::{
    BridgeError, CollateralLedger, LedgerCall, MarginLedger, Result, Transfer,
};
use serde::{Deserialize, Serialize};

/// Why a caller is permitted without a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grant {
    /// The caller is the account holder.
    Owner,
    /// The margin ledger names the caller an operator of the account.
    LocalOperator,
    /// The margin ledger names the caller an operator of every account.
    GlobalOperator,
    /// The collateral ledger grants the caller account permissions.
    CollateralDelegate,
}

/// Resolves ownership and delegation against one pair of ledgers.
#[derive(Clone, Copy)]
pub struct PermissionResolver<'a> {
    margin: &'a dyn MarginLedger,
    collateral: Option<&'a dyn CollateralLedger>,
}

impl<'a> PermissionResolver<'a> {
    #[must_use]
    pub fn new(margin: &'a dyn MarginLedger, collateral: &'a dyn CollateralLedger) -> Self {
        Self {
            margin,
            collateral: Some(collateral),
        }
    }

    /// Resolver for a transfer whose counterparty is not registered.
    #[must_use]
    pub fn without_collateral(margin: &'a dyn MarginLedger) -> Self {
        Self {
            margin,
            collateral: None,
        }
    }

    /// The grant under which `caller` may move funds of `transfer.account`
    /// in the given direction, or `None`.
    ///
    /// # Errors
    /// - [`BridgeError::Ledger`] if a delegation query fails
    /// - [`BridgeError::UnknownCounterparty`] if a source-bound delegation
    ///   check has no collateral ledger to ask
    pub fn resolve(
        &self,
        caller: Address,
        transfer: &Transfer,
        to_destination: bool,
    ) -> Result<Option<Grant>> {
        let account = transfer.account;
        if caller == account {
            return Ok(Some(Grant::Owner));
        }

        let query = |e| BridgeError::ledger(LedgerCall::PermissionQuery, e);

        if !to_destination {
            let collateral = self
                .collateral
                .ok_or(BridgeError::UnknownCounterparty(transfer.counterparty))?;
            let permitted = collateral
                .has_account_permissions(account, caller)
                .map_err(query)?;
            return Ok(permitted.then_some(Grant::CollateralDelegate));
        }

        if self.margin.is_local_operator(account, caller).map_err(query)? {
            return Ok(Some(Grant::LocalOperator));
        }
        if self.margin.is_global_operator(caller).map_err(query)? {
            return Ok(Some(Grant::GlobalOperator));
        }
        Ok(None)
    }

    /// Boolean form of [`resolve`](Self::resolve).
    ///
    /// # Errors
    /// Returns [`BridgeError::Ledger`] if a delegation query fails.
    pub fn has_permission(
        &self,
        caller: Address,
        transfer: &Transfer,
        to_destination: bool,
    ) -> Result<bool> {
        Ok(self.resolve(caller, transfer, to_destination)?.is_some())
    }
}

impl std::fmt::Debug for PermissionResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionResolver")
            .field("margin", &self.margin.address())
            .field("collateral", &self.collateral.map(|c| c.address()))
            .finish()
    }
}
