//! # marginbridge-settlement
//!
//! **Execution plane**: cross-ledger fund movement, allowance bootstrap,
//! event records, and the public transfer entry points.
//!
//! ## Architecture
//!
//! The [`TransferOrchestrator`] receives a [`Transfer`](marginbridge_types::Transfer)
//! plus signature bytes and:
//! 1. Decodes the mode (unknown modes fail before any ledger call)
//! 2. Authorizes the caller: owner, delegate, or signed (see `marginbridge-auth`)
//! 3. Verifies both ledgers trade the same asset
//! 4. Moves funds through the [`LedgerBridge`], measuring custody deltas
//! 5. Marks a consumed signature used and emits a record
//!
//! ## Partial execution
//!
//! The two ledgers commit independently. A destination deposit that fails
//! after the source withdrawal succeeded leaves the moved amount in bridge
//! custody and surfaces as `BridgeError::PartialExecution`; the replay flag
//! stays unset so the same signature can be retried after reconciliation.

pub mod allowance;
pub mod event_log;
pub mod ledger_bridge;
pub mod orchestrator;

#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

pub use allowance::AllowanceBootstrap;
pub use event_log::{EventLog, EventSink};
pub use ledger_bridge::LedgerBridge;
pub use orchestrator::{TransferOrchestrator, TransferOutcome, TransferStage};
