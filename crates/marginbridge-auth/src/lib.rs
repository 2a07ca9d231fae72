//! # marginbridge-auth
//!
//! **Authorization envelope**: decides whether a caller may move funds for
//! an account, and makes sure a signed transfer executes at most once.
//!
//! ## Architecture
//!
//! 1. **PermissionResolver**: ownership, then delegation on the debited ledger
//! 2. **SignatureVerifier**: expiration, replay flag, signer recovery
//! 3. **ReplayGuard**: used flag per transfer hash, with in-flight claims
//! 4. **Authorizer**: combines the three into one [`Authorization`]
//!
//! ```text
//! CallContext + Transfer + hash + signature
//!     → Authorizer.authorize_transfer() → Authorization
//!     → ledgers move → Authorization.commit()
//! ```

pub mod authorization;
pub mod permission;
pub mod replay_guard;
pub mod signature_verifier;

pub use authorization::{Authorization, Authorizer};
pub use permission::{Grant, PermissionResolver};
pub use replay_guard::{ReplayClaim, ReplayGuard, ReplaySnapshot};
pub use signature_verifier::{SignatureVerifier, is_unexpired, recover_signer};
