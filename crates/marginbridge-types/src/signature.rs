//! Typed signatures: `r ‖ s ‖ v ‖ type`.
//!
//! The trailing type byte selects which prefix, if any, was prepended to the
//! transfer hash before signing. Recovery lives in `marginbridge-auth`; this
//! module only parses and carries the bytes.

use alloy_primitives::{B256, keccak256};
use serde::{Deserialize, Serialize};

use crate::{BridgeError, Result, constants};

/// How the signed message was derived from the transfer hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureType {
    /// The transfer hash was signed as-is.
    NoPrepend,
    /// `keccak256("\x19Ethereum Signed Message:\n32" ‖ hash)` was signed.
    Decimal,
    /// `keccak256("\x19Ethereum Signed Message:\n\x20" ‖ hash)` was signed.
    Hexadecimal,
}

impl SignatureType {
    /// Parse the trailing type byte.
    ///
    /// # Errors
    /// Returns [`BridgeError::MalformedSignature`] for bytes other than 0, 1, 2.
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(Self::NoPrepend),
            1 => Ok(Self::Decimal),
            2 => Ok(Self::Hexadecimal),
            other => Err(BridgeError::MalformedSignature {
                reason: format!("unknown signature type {other}"),
            }),
        }
    }

    #[must_use]
    pub fn as_byte(self) -> u8 {
        match self {
            Self::NoPrepend => 0,
            Self::Decimal => 1,
            Self::Hexadecimal => 2,
        }
    }

    /// The digest that was actually signed for `hash`.
    #[must_use]
    pub fn signed_digest(self, hash: &B256) -> B256 {
        let prefix = match self {
            Self::NoPrepend => return *hash,
            Self::Decimal => constants::PREPEND_DECIMAL,
            Self::Hexadecimal => constants::PREPEND_HEX,
        };
        let mut preimage = Vec::with_capacity(prefix.len() + 32);
        preimage.extend_from_slice(prefix);
        preimage.extend_from_slice(hash.as_slice());
        keccak256(preimage)
    }
}

/// A 66-byte typed ECDSA signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypedSignature {
    pub r: B256,
    pub s: B256,
    /// Recovery byte as produced by the signer (27/28, or 0/1).
    pub v: u8,
    pub signature_type: SignatureType,
}

impl TypedSignature {
    /// Parse `r ‖ s ‖ v ‖ type`.
    ///
    /// # Errors
    /// Returns [`BridgeError::MalformedSignature`] on a wrong length or unknown type byte.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != constants::TYPED_SIGNATURE_LEN {
            return Err(BridgeError::MalformedSignature {
                reason: format!(
                    "expected {} bytes, got {}",
                    constants::TYPED_SIGNATURE_LEN,
                    bytes.len()
                ),
            });
        }
        Ok(Self {
            r: B256::from_slice(&bytes[..32]),
            s: B256::from_slice(&bytes[32..64]),
            v: bytes[64],
            signature_type: SignatureType::from_byte(bytes[65])?,
        })
    }

    /// Build from a 65-byte `r ‖ s ‖ v` signature plus a type.
    ///
    /// # Errors
    /// Returns [`BridgeError::MalformedSignature`] if `rsv` is not 65 bytes.
    pub fn from_rsv(rsv: &[u8], signature_type: SignatureType) -> Result<Self> {
        if rsv.len() != 65 {
            return Err(BridgeError::MalformedSignature {
                reason: format!("expected 65 rsv bytes, got {}", rsv.len()),
            });
        }
        Ok(Self {
            r: B256::from_slice(&rsv[..32]),
            s: B256::from_slice(&rsv[32..64]),
            v: rsv[64],
            signature_type,
        })
    }

    /// Serialize to the 66-byte wire form.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; constants::TYPED_SIGNATURE_LEN] {
        let mut out = [0u8; constants::TYPED_SIGNATURE_LEN];
        out[..32].copy_from_slice(self.r.as_slice());
        out[32..64].copy_from_slice(self.s.as_slice());
        out[64] = self.v;
        out[65] = self.signature_type.as_byte();
        out
    }

    /// All-zero placeholder, for callers authorized without a signature.
    #[must_use]
    pub fn placeholder() -> [u8; constants::TYPED_SIGNATURE_LEN] {
        [0u8; constants::TYPED_SIGNATURE_LEN]
    }
}
