//! # marginbridge-hashing
//!
//! **Pure deterministic hashing for MarginBridge transfers.**
//!
//! Every transfer is identified by a domain-separated typed-data hash. This
//! crate computes it and nothing else:
//!
//! - **Zero side effects**: no ledger calls, no replay state, no clock
//! - **Deterministic output**: same fields under the same domain -> same hash
//! - **Raw options**: the packed options word is hashed undecoded
//!
//! ```text
//! domain_hash  = hashStruct(EIP712Domain{name, version, chainId, verifyingContract})
//! struct_hash  = hashStruct(Transfer{account, counterparty, ..., options})
//! transfer_hash = keccak256(0x19 ‖ 0x01 ‖ domain_hash ‖ struct_hash)
//! ```

pub mod domain;
pub mod transfer_hash;

pub use domain::{DomainSeparator, domain_hash};
pub use transfer_hash::{
    HashEngine, TRANSFER_TYPE, final_hash, transfer_struct_hash, verify_transfer_hash,
};
