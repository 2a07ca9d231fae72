//! Allowance bootstrap.
//!
//! Deposits pull funds out of bridge custody, so each destination ledger
//! needs an allowance from the bridge on the asset it pulls. This runs once
//! per market (margin side) and once per counterparty (collateral side)
//! before transfers through them can succeed.
//!
//! Approval is reset to zero before being raised to the maximum, which works
//! with assets that refuse to change one nonzero allowance into another.
//! Running it again is harmless.

use alloy::primitives::{Address, U256};
use marginbridge_types::{AssetCustody, BridgeError, LedgerCall, Result};

/// Grants ledgers unlimited allowance over bridge custody.
#[derive(Clone, Copy)]
pub struct AllowanceBootstrap<'a> {
    bridge: Address,
    custody: &'a dyn AssetCustody,
}

impl<'a> AllowanceBootstrap<'a> {
    #[must_use]
    pub fn new(bridge: Address, custody: &'a dyn AssetCustody) -> Self {
        Self { bridge, custody }
    }

    /// Set the bridge's allowance of `asset` toward `spender` to the maximum.
    ///
    /// # Errors
    /// Returns [`BridgeError::Ledger`] if either approval fails.
    pub fn approve_maximum(&self, asset: Address, spender: Address) -> Result<()> {
        let approve = |amount| {
            self.custody
                .approve(asset, self.bridge, spender, amount)
                .map_err(|e| BridgeError::ledger(LedgerCall::Approve, e))
        };
        approve(U256::ZERO)?;
        approve(U256::MAX)?;
        tracing::info!(asset = %asset, spender = %spender, "Maximum allowance granted");
        Ok(())
    }
}
