//! Transfer struct hash and the final transfer hash.
//!
//! The struct hash covers all six transfer fields in declared order, with
//! the options word hashed raw. Two transfers that differ only in salt
//! therefore hash differently, which is how a holder issues two otherwise
//! identical authorizations.

use alloy::primitives::{B256, keccak256};
use alloy::sol_types::SolStruct;
use marginbridge_types::{DomainConfig, Transfer, TransferHash, constants};

use crate::domain::DomainSeparator;

mod schema {
    alloy::sol! {
        #[derive(Debug)]
        struct Transfer {
            address account;
            address counterparty;
            uint256 marginAccountNumber;
            uint256 marginMarketId;
            uint256 amount;
            bytes32 options;
        }
    }
}

/// The typed-data schema string of a transfer.
pub const TRANSFER_TYPE: &str = "Transfer(address account,address counterparty,uint256 marginAccountNumber,uint256 marginMarketId,uint256 amount,bytes32 options)";

fn to_schema(transfer: &Transfer) -> schema::Transfer {
    schema::Transfer {
        account: transfer.account,
        counterparty: transfer.counterparty,
        marginAccountNumber: transfer.margin_account_number,
        marginMarketId: transfer.margin_market_id,
        amount: transfer.amount,
        options: transfer.options.word(),
    }
}

/// `hashStruct(Transfer)`.
#[must_use]
pub fn transfer_struct_hash(transfer: &Transfer) -> B256 {
    to_schema(transfer).eip712_hash_struct()
}

/// `keccak256(0x19 ‖ 0x01 ‖ domain_hash ‖ struct_hash)`.
#[must_use]
pub fn final_hash(domain_hash: &B256, struct_hash: &B256) -> B256 {
    let mut preimage = [0u8; 2 + 32 + 32];
    preimage[..2].copy_from_slice(&constants::TYPED_DATA_PREFIX);
    preimage[2..34].copy_from_slice(domain_hash.as_slice());
    preimage[34..].copy_from_slice(struct_hash.as_slice());
    keccak256(preimage)
}

/// Recompute the hash of `transfer` and compare with `expected`.
#[must_use]
pub fn verify_transfer_hash(
    engine: &HashEngine,
    transfer: &Transfer,
    expected: &TransferHash,
) -> bool {
    engine.transfer_hash(transfer) == *expected
}

/// Computes transfer hashes under one fixed domain.
#[derive(Debug, Clone)]
pub struct HashEngine {
    separator: DomainSeparator,
}

impl HashEngine {
    #[must_use]
    pub fn new(domain: &DomainConfig) -> Self {
        let separator = DomainSeparator::new(domain);
        tracing::debug!(
            name = %domain.name,
            version = %domain.version,
            chain_id = domain.chain_id,
            verifying_contract = %domain.verifying_contract,
            separator = %separator.hash(),
            "Domain separator initialized"
        );
        Self { separator }
    }

    #[must_use]
    pub fn domain_separator(&self) -> B256 {
        self.separator.hash()
    }

    #[must_use]
    pub fn transfer_hash(&self, transfer: &Transfer) -> TransferHash {
        TransferHash(final_hash(
            &self.separator.hash(),
            &transfer_struct_hash(transfer),
        ))
    }
}
