//! Configuration types for a MarginBridge deployment.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::{BridgeError, Result, constants};

/// Top-level bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Inputs to the domain separator.
    pub domain: DomainConfig,
}

/// Inputs to the domain separator. Fixed for the lifetime of the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    /// Chain / network identifier.
    pub chain_id: u64,
    /// This bridge's own address.
    pub verifying_contract: Address,
}

fn default_name() -> String {
    constants::DOMAIN_NAME.to_string()
}

fn default_version() -> String {
    constants::DOMAIN_VERSION.to_string()
}

impl DomainConfig {
    /// Domain with the fixed name and version.
    #[must_use]
    pub fn new(chain_id: u64, verifying_contract: Address) -> Self {
        Self {
            name: default_name(),
            version: default_version(),
            chain_id,
            verifying_contract,
        }
    }
}

impl BridgeConfig {
    #[must_use]
    pub fn new(chain_id: u64, verifying_contract: Address) -> Self {
        Self {
            domain: DomainConfig::new(chain_id, verifying_contract),
        }
    }

    /// Parse and validate a JSON config.
    ///
    /// # Errors
    /// `Serialization` on malformed JSON, `Configuration` on invalid values.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would produce an unusable domain.
    ///
    /// # Errors
    /// Returns [`BridgeError::Configuration`] describing the first bad field.
    pub fn validate(&self) -> Result<()> {
        if self.domain.verifying_contract == Address::ZERO {
            return Err(BridgeError::Configuration(
                "domain.verifying_contract must be nonzero".to_string(),
            ));
        }
        if self.domain.name.is_empty() {
            return Err(BridgeError::Configuration(
                "domain.name must not be empty".to_string(),
            ));
        }
        if self.domain.version.is_empty() {
            return Err(BridgeError::Configuration(
                "domain.version must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// The bridge's own address, which holds custody between ledger calls.
    #[must_use]
    pub fn bridge_address(&self) -> Address {
        self.domain.verifying_contract
    }
}
