//! Transfer orchestrator: the public entry points.
//!
//! Each call is a fresh linear pipeline; nothing persists between calls
//! except the replay guard:
//!
//! ```text
//! Start ─► PermissionChecked ─► (SignatureChecked) ─► AssetsVerified ─► Executed ─► Recorded
//! ```
//!
//! The mode is decoded before anything else, so an unmapped mode byte fails
//! without a single ledger call. A signed authorization only marks its hash
//! used once the ledgers have moved; any failure before that leaves the flag
//! unset.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use alloy::primitives::{Address, B256, U256};
use marginbridge_auth::{Authorization, Authorizer, ReplayGuard, ReplaySnapshot};
use marginbridge_hashing::HashEngine;
use marginbridge_types::{
    AssetCustody, BridgeConfig, BridgeError, CallContext, CollateralLedger, LedgerCall,
    MarginLedger, Result, SignatureInvalidated, Transfer, TransferCompleted, TransferHash,
};
use serde::{Deserialize, Serialize};

use crate::allowance::AllowanceBootstrap;
use crate::event_log::{EventLog, EventSink};
use crate::ledger_bridge::LedgerBridge;

/// How far a transfer got through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TransferStage {
    Start,
    PermissionChecked,
    SignatureChecked,
    AssetsVerified,
    Executed,
    Recorded,
}

impl fmt::Display for TransferStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "START"),
            Self::PermissionChecked => write!(f, "PERMISSION_CHECKED"),
            Self::SignatureChecked => write!(f, "SIGNATURE_CHECKED"),
            Self::AssetsVerified => write!(f, "ASSETS_VERIFIED"),
            Self::Executed => write!(f, "EXECUTED"),
            Self::Recorded => write!(f, "RECORDED"),
        }
    }
}

/// Result of a successful `bridge_transfer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub transfer_hash: TransferHash,
    /// The amount that actually moved.
    pub amount: U256,
    /// Whether a signature was consumed (and the hash marked used).
    pub signature_consumed: bool,
    pub event: TransferCompleted,
}

/// Sequences authorization, asset checks, and ledger execution.
pub struct TransferOrchestrator {
    config: BridgeConfig,
    engine: HashEngine,
    margin: Arc<dyn MarginLedger>,
    custody: Arc<dyn AssetCustody>,
    counterparties: HashMap<Address, Arc<dyn CollateralLedger>>,
    guard: ReplayGuard,
    sink: Arc<dyn EventSink>,
}

impl TransferOrchestrator {
    /// Create an orchestrator with an empty replay guard and an in-memory
    /// event log.
    ///
    /// # Errors
    /// Returns [`BridgeError::Configuration`] if `config` is invalid.
    pub fn new(
        config: BridgeConfig,
        margin: Arc<dyn MarginLedger>,
        custody: Arc<dyn AssetCustody>,
    ) -> Result<Self> {
        config.validate()?;
        let engine = HashEngine::new(&config.domain);
        tracing::info!(
            bridge = %config.bridge_address(),
            chain_id = config.domain.chain_id,
            margin = %margin.address(),
            "Transfer orchestrator initialized"
        );
        Ok(Self {
            config,
            engine,
            margin,
            custody,
            counterparties: HashMap::new(),
            guard: ReplayGuard::new(),
            sink: Arc::new(EventLog::new()),
        })
    }

    /// Replace the event sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Restore replay state, e.g. from a snapshot taken before a restart.
    #[must_use]
    pub fn with_replay_snapshot(mut self, snapshot: ReplaySnapshot) -> Self {
        self.guard = ReplayGuard::from_snapshot(snapshot);
        self
    }

    /// Register a collateral ledger under its own address.
    pub fn register_counterparty(&mut self, ledger: Arc<dyn CollateralLedger>) {
        let address = ledger.address();
        tracing::info!(counterparty = %address, "Counterparty registered");
        self.counterparties.insert(address, ledger);
    }

    /// Builder form of [`register_counterparty`](Self::register_counterparty).
    #[must_use]
    pub fn with_counterparty(mut self, ledger: Arc<dyn CollateralLedger>) -> Self {
        self.register_counterparty(ledger);
        self
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// The bridge's own custody address.
    #[must_use]
    pub fn address(&self) -> Address {
        self.config.bridge_address()
    }

    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    #[must_use]
    pub fn domain_separator(&self) -> B256 {
        self.engine.domain_separator()
    }

    /// The hash a holder signs to authorize `transfer`.
    #[must_use]
    pub fn transfer_hash(&self, transfer: &Transfer) -> TransferHash {
        self.engine.transfer_hash(transfer)
    }

    /// Whether `hash` has been consumed or invalidated.
    #[must_use]
    pub fn is_signature_used(&self, hash: &TransferHash) -> bool {
        self.guard.is_used(hash)
    }

    /// Snapshot of the replay state for persistence.
    #[must_use]
    pub fn replay_snapshot(&self) -> ReplaySnapshot {
        self.guard.snapshot()
    }

    fn counterparty(&self, address: Address) -> Result<&Arc<dyn CollateralLedger>> {
        self.counterparties
            .get(&address)
            .ok_or(BridgeError::UnknownCounterparty(address))
    }

    // -----------------------------------------------------------------------
    // Allowance bootstrap
    // -----------------------------------------------------------------------

    /// Let the margin ledger pull `market_id`'s asset from bridge custody.
    ///
    /// # Errors
    /// Returns [`BridgeError::Ledger`] if the asset query or an approval fails.
    pub fn approve_maximum_on_margin(&self, market_id: U256) -> Result<()> {
        let asset = self
            .margin
            .market_asset(market_id)
            .map_err(|e| BridgeError::ledger(LedgerCall::AssetQuery, e))?;
        AllowanceBootstrap::new(self.address(), self.custody.as_ref())
            .approve_maximum(asset, self.margin.address())
    }

    /// Let the collateral ledger at `counterparty` pull its margin asset from
    /// bridge custody.
    ///
    /// # Errors
    /// - [`BridgeError::UnknownCounterparty`] if nothing is registered there
    /// - [`BridgeError::Ledger`] if the asset query or an approval fails
    pub fn approve_maximum_on_collateral(&self, counterparty: Address) -> Result<()> {
        let ledger = self.counterparty(counterparty)?;
        let asset = ledger
            .margin_asset()
            .map_err(|e| BridgeError::ledger(LedgerCall::AssetQuery, e))?;
        AllowanceBootstrap::new(self.address(), self.custody.as_ref())
            .approve_maximum(asset, ledger.address())
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Move funds for `transfer.account` between the margin ledger and the
    /// counterparty collateral ledger.
    ///
    /// The account holder and delegates may pass any signature bytes (an
    /// all-zero placeholder is conventional); everyone else needs a valid
    /// unexpired, unused signature by the account holder.
    ///
    /// # Errors
    /// - [`BridgeError::InvalidTransferMode`] before any ledger call
    /// - [`BridgeError::UnknownCounterparty`] if the counterparty is not registered
    /// - [`BridgeError::SignatureExpired`], [`BridgeError::SignatureAlreadyUsedOrInvalidated`],
    ///   [`BridgeError::MalformedSignature`], [`BridgeError::InvalidSignature`] on the signature path
    /// - [`BridgeError::AssetMismatch`] if the two ledgers trade different assets
    /// - [`BridgeError::Ledger`] / [`BridgeError::PartialExecution`] on collaborator failures
    pub fn bridge_transfer(
        &self,
        ctx: &CallContext,
        transfer: &Transfer,
        signature: &[u8],
    ) -> Result<TransferOutcome> {
        let mut stage = TransferStage::Start;
        let result = self.run_transfer(ctx, transfer, signature, &mut stage);
        if let Err(err) = &result {
            tracing::warn!(
                code = err.code(),
                stage = %stage,
                caller = %ctx.caller,
                account = %transfer.account,
                counterparty = %transfer.counterparty,
                error = %err,
                "Transfer rejected"
            );
        }
        result
    }

    fn run_transfer(
        &self,
        ctx: &CallContext,
        transfer: &Transfer,
        signature: &[u8],
        stage: &mut TransferStage,
    ) -> Result<TransferOutcome> {
        let mode = transfer.mode()?;
        let to_destination = mode.is_to_destination();
        let collateral = self.counterparty(transfer.counterparty)?;
        let hash = self.engine.transfer_hash(transfer);

        let authorizer = Authorizer::new(self.margin.as_ref(), collateral.as_ref(), &self.guard);
        let grant = authorizer.resolve_permission(ctx, transfer, to_destination)?;
        *stage = TransferStage::PermissionChecked;
        let authorization = match grant {
            Some(grant) => Authorization::from(grant),
            None => {
                let signed = authorizer.authorize_signature(ctx, transfer, hash, signature)?;
                *stage = TransferStage::SignatureChecked;
                signed
            }
        };
        tracing::debug!(
            hash = %hash.short(),
            caller = %ctx.caller,
            authorized_by = authorization.label(),
            mode = %mode,
            "Transfer authorized"
        );

        let bridge = LedgerBridge::new(
            self.address(),
            self.margin.as_ref(),
            collateral.as_ref(),
            self.custody.as_ref(),
        );
        let asset = bridge.verify_assets(transfer.margin_market_id)?;
        *stage = TransferStage::AssetsVerified;

        let amount = bridge.execute(transfer, mode, asset)?;
        *stage = TransferStage::Executed;

        let signature_consumed = authorization.is_signed();
        authorization.commit();

        let event = TransferCompleted::new(transfer, to_destination, amount);
        self.sink.emit(event.into());
        *stage = TransferStage::Recorded;

        tracing::info!(
            hash = %hash.short(),
            account = %transfer.account,
            counterparty = %transfer.counterparty,
            market_id = %transfer.margin_market_id,
            to_destination,
            requested = %transfer.amount,
            amount = %amount,
            signature_consumed,
            "Transfer completed"
        );

        Ok(TransferOutcome {
            transfer_hash: hash,
            amount,
            signature_consumed,
            event,
        })
    }

    /// Mark `transfer`'s hash used without moving funds.
    ///
    /// Only the account holder or a delegate in the transfer's own direction
    /// may invalidate. Invalidating an already-used hash succeeds again.
    ///
    /// # Errors
    /// - [`BridgeError::InvalidTransferMode`] before any ledger call
    /// - [`BridgeError::UnknownCounterparty`] if a non-holder invalidates a
    ///   source-bound transfer whose counterparty is not registered
    /// - [`BridgeError::PermissionDenied`] if the caller may not act for the account
    /// - [`BridgeError::Ledger`] if a delegation query fails
    pub fn invalidate_signature(
        &self,
        ctx: &CallContext,
        transfer: &Transfer,
    ) -> Result<SignatureInvalidated> {
        let result = self.run_invalidation(ctx, transfer);
        if let Err(err) = &result {
            tracing::warn!(
                code = err.code(),
                caller = %ctx.caller,
                account = %transfer.account,
                error = %err,
                "Invalidation rejected"
            );
        }
        result
    }

    fn run_invalidation(
        &self,
        ctx: &CallContext,
        transfer: &Transfer,
    ) -> Result<SignatureInvalidated> {
        let to_destination = transfer.mode()?.is_to_destination();

        // The holder may cancel before the counterparty is registered.
        let authorizer = match self.counterparties.get(&transfer.counterparty) {
            Some(collateral) => {
                Authorizer::new(self.margin.as_ref(), collateral.as_ref(), &self.guard)
            }
            None => Authorizer::without_collateral(self.margin.as_ref(), &self.guard),
        };
        let grant = authorizer.authorize_invalidation(ctx, transfer, to_destination)?;

        let transfer_hash = self.engine.transfer_hash(transfer);
        let newly = self.guard.invalidate(transfer_hash);

        let event = SignatureInvalidated {
            account: transfer.account,
            transfer_hash,
        };
        self.sink.emit(event.into());

        tracing::info!(
            hash = %transfer_hash,
            account = %transfer.account,
            caller = %ctx.caller,
            grant = ?grant,
            already_used = !newly,
            "Signature invalidated"
        );
        Ok(event)
    }
}

impl fmt::Debug for TransferOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferOrchestrator")
            .field("bridge", &self.address())
            .field("margin", &self.margin.address())
            .field("counterparties", &self.counterparties.keys().collect::<Vec<_>>())
            .field("used_hashes", &self.guard.len())
            .finish_non_exhaustive()
    }
}
