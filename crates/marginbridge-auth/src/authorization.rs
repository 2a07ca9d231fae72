//! Authorization decision, resolved once per call.
//!
//! ```text
//! caller == account ─────────────────────────► Owner
//! delegate on the debited ledger ────────────► Delegate(grant)
//! otherwise: expiration → replay → signer ───► Signed { signature, claim }
//! ```
//!
//! Owner and delegate calls never read or write the replay flag, and the
//! signature they pass is ignored. A `Signed` authorization carries the
//! replay claim; [`Authorization::commit`] marks the hash used and must be
//! called only after the ledgers have moved.

use marginbridge_types::{
    BridgeError, CallContext, CollateralLedger, MarginLedger, Result, Transfer, TransferHash,
    TypedSignature,
};

use crate::permission::{Grant, PermissionResolver};
use crate::replay_guard::{ReplayClaim, ReplayGuard};
use crate::signature_verifier::SignatureVerifier;

/// How a transfer call was authorized.
#[derive(Debug)]
pub enum Authorization<'a> {
    Owner,
    Delegate(Grant),
    Signed {
        signature: TypedSignature,
        claim: ReplayClaim<'a>,
    },
}

impl Authorization<'_> {
    #[must_use]
    pub fn is_signed(&self) -> bool {
        matches!(self, Self::Signed { .. })
    }

    /// Short label for log lines.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Delegate(_) => "delegate",
            Self::Signed { .. } => "signature",
        }
    }

    /// Mark the transfer hash used if this is a signed authorization.
    pub fn commit(self) {
        if let Self::Signed { claim, .. } = self {
            claim.consume();
        }
    }
}

impl From<Grant> for Authorization<'_> {
    fn from(grant: Grant) -> Self {
        match grant {
            Grant::Owner => Self::Owner,
            other => Self::Delegate(other),
        }
    }
}

/// Combines the permission resolver and the signature verifier.
#[derive(Debug, Clone, Copy)]
pub struct Authorizer<'a> {
    permissions: PermissionResolver<'a>,
    verifier: SignatureVerifier<'a>,
}

impl<'a> Authorizer<'a> {
    #[must_use]
    pub fn new(
        margin: &'a dyn MarginLedger,
        collateral: &'a dyn CollateralLedger,
        guard: &'a ReplayGuard,
    ) -> Self {
        Self {
            permissions: PermissionResolver::new(margin, collateral),
            verifier: SignatureVerifier::new(guard),
        }
    }

    /// Authorizer for a transfer whose counterparty is not registered.
    /// Source-bound delegation checks fail with
    /// [`BridgeError::UnknownCounterparty`].
    #[must_use]
    pub fn without_collateral(margin: &'a dyn MarginLedger, guard: &'a ReplayGuard) -> Self {
        Self {
            permissions: PermissionResolver::without_collateral(margin),
            verifier: SignatureVerifier::new(guard),
        }
    }

    /// Ownership or delegation of the caller, without the signature fallback.
    ///
    /// # Errors
    /// See [`PermissionResolver::resolve`].
    pub fn resolve_permission(
        &self,
        ctx: &CallContext,
        transfer: &Transfer,
        to_destination: bool,
    ) -> Result<Option<Grant>> {
        self.permissions.resolve(ctx.caller, transfer, to_destination)
    }

    /// The signature fallback on its own.
    ///
    /// # Errors
    /// Any error of [`SignatureVerifier::verify`].
    pub fn authorize_signature(
        &self,
        ctx: &CallContext,
        transfer: &Transfer,
        hash: TransferHash,
        signature: &[u8],
    ) -> Result<Authorization<'a>> {
        let (signature, claim) = self
            .verifier
            .verify(transfer, hash, signature, ctx.timestamp)?;
        Ok(Authorization::Signed { signature, claim })
    }

    /// Authorize a transfer, falling back to the signature when the caller
    /// holds no ownership or delegation.
    ///
    /// # Errors
    /// Any error of [`SignatureVerifier::verify`], or [`BridgeError::Ledger`]
    /// if a delegation query fails.
    pub fn authorize_transfer(
        &self,
        ctx: &CallContext,
        transfer: &Transfer,
        hash: TransferHash,
        signature: &[u8],
        to_destination: bool,
    ) -> Result<Authorization<'a>> {
        match self.resolve_permission(ctx, transfer, to_destination)? {
            Some(grant) => Ok(grant.into()),
            None => self.authorize_signature(ctx, transfer, hash, signature),
        }
    }

    /// Authorize an invalidation. Signatures do not count here.
    ///
    /// # Errors
    /// Returns [`BridgeError::PermissionDenied`] if the caller is neither the
    /// account holder nor a delegate in the transfer's direction.
    pub fn authorize_invalidation(
        &self,
        ctx: &CallContext,
        transfer: &Transfer,
        to_destination: bool,
    ) -> Result<Grant> {
        self.resolve_permission(ctx, transfer, to_destination)?
            .ok_or(BridgeError::PermissionDenied {
                caller: ctx.caller,
                account: transfer.account,
            })
    }
}
