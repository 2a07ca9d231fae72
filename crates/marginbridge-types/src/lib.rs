//! # marginbridge-types
//!
//! Shared types, errors, and configuration for the **MarginBridge** proxy.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`TransferHash`], [`MarginAccount`]
//! - **Transfer model**: [`Transfer`], [`TransferOptions`], [`DecodedOptions`], [`TransferMode`], [`RawMode`]
//! - **Signatures**: [`TypedSignature`], [`SignatureType`]
//! - **Call context**: [`CallContext`]
//! - **Collaborators**: [`MarginLedger`], [`CollateralLedger`], [`AssetCustody`]
//! - **Events**: [`TransferCompleted`], [`SignatureInvalidated`], [`BridgeEvent`]
//! - **Configuration**: [`BridgeConfig`], [`DomainConfig`]
//! - **Errors**: [`BridgeError`] with `MB_ERR_` prefix codes, [`LedgerError`]
//! - **Constants**: domain name/version and bit widths

pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod event;
pub mod ids;
pub mod ledger;
pub mod signature;
pub mod transfer;

// Re-export all primary types at crate root for ergonomic imports:
//   use marginbridge_types::{Transfer, TransferMode, BridgeError, ...};

pub use config::*;
pub use context::*;
pub use error::*;
pub use event::*;
pub use ids::*;
pub use ledger::*;
pub use signature::*;
pub use transfer::*;

pub use alloy_primitives::{Address, B256, U256};

// Constants are accessed via `marginbridge_types::constants::FOO`
// (not re-exported to avoid name collisions).
