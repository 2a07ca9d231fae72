//! Domain separator: binds every transfer hash to one bridge on one chain.

use std::borrow::Cow;

use alloy::primitives::{Address, B256, U256};
use alloy::sol_types::Eip712Domain;
use marginbridge_types::DomainConfig;

/// Hash of the typed-data domain
/// `EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)`.
#[must_use]
pub fn domain_hash(name: &str, version: &str, chain_id: u64, verifying_contract: Address) -> B256 {
    eip712_domain(name, version, chain_id, verifying_contract).hash_struct()
}

fn eip712_domain(
    name: &str,
    version: &str,
    chain_id: u64,
    verifying_contract: Address,
) -> Eip712Domain {
    Eip712Domain::new(
        Some(Cow::Owned(name.to_string())),
        Some(Cow::Owned(version.to_string())),
        Some(U256::from(chain_id)),
        Some(verifying_contract),
        None,
    )
}

/// The domain and its hash, computed once and immutable afterwards.
#[derive(Debug, Clone)]
pub struct DomainSeparator {
    domain: Eip712Domain,
    hash: B256,
}

impl DomainSeparator {
    #[must_use]
    pub fn new(config: &DomainConfig) -> Self {
        let domain = eip712_domain(
            &config.name,
            &config.version,
            config.chain_id,
            config.verifying_contract,
        );
        let hash = domain.hash_struct();
        Self { domain, hash }
    }

    #[must_use]
    pub fn hash(&self) -> B256 {
        self.hash
    }

    #[must_use]
    pub fn domain(&self) -> &Eip712Domain {
        &self.domain
    }
}
