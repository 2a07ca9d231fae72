//! Signature verifier: the fallback authorization path.
//!
//! Only consulted when the caller is neither the account holder nor a
//! delegate. Checks run in a fixed order and the first failure wins:
//!
//! ```text
//! expiration  →  replay flag  →  parse + recover signer == account
//! ```
//!
//! A successful verification returns a [`ReplayClaim`]; the hash is only
//! marked used when the caller consumes it after the ledgers have moved.

use alloy::primitives::{Address, PrimitiveSignature, U256};
use marginbridge_types::{BridgeError, Result, Transfer, TransferHash, TypedSignature};

use crate::replay_guard::{ReplayClaim, ReplayGuard};

/// Whether a signature with `expiration` is still valid at `now`.
///
/// Zero never expires. The boundary second is still valid.
#[must_use]
pub fn is_unexpired(expiration: u128, now: u64) -> bool {
    expiration == 0 || expiration >= u128::from(now)
}

/// Map a recovery byte to y-parity. Accepts 27/28 and 0/1.
fn y_parity(v: u8) -> Option<bool> {
    match v {
        0 | 27 => Some(false),
        1 | 28 => Some(true),
        _ => None,
    }
}

/// Recover the address that produced `signature` over `hash`.
///
/// Returns `None` when recovery fails; an all-zero signature never recovers.
#[must_use]
pub fn recover_signer(hash: &TransferHash, signature: &TypedSignature) -> Option<Address> {
    let parity = y_parity(signature.v)?;
    let digest = signature.signature_type.signed_digest(hash.as_b256());
    let sig = PrimitiveSignature::new(
        U256::from_be_bytes(signature.r.0),
        U256::from_be_bytes(signature.s.0),
        parity,
    );
    sig.recover_address_from_prehash(&digest).ok()
}

/// Verifies signed transfers against one replay guard.
#[derive(Debug, Clone, Copy)]
pub struct SignatureVerifier<'a> {
    guard: &'a ReplayGuard,
}

impl<'a> SignatureVerifier<'a> {
    #[must_use]
    pub fn new(guard: &'a ReplayGuard) -> Self {
        Self { guard }
    }

    /// Verify `signature` for `transfer` at time `now` and reserve its hash.
    ///
    /// # Errors
    /// - [`BridgeError::SignatureExpired`] if the nonzero expiration is before `now`
    /// - [`BridgeError::SignatureAlreadyUsedOrInvalidated`] if the hash is used or in flight
    /// - [`BridgeError::MalformedSignature`] if the bytes do not parse
    /// - [`BridgeError::InvalidSignature`] if recovery fails or the signer is not the account
    pub fn verify(
        &self,
        transfer: &Transfer,
        hash: TransferHash,
        signature: &[u8],
        now: u64,
    ) -> Result<(TypedSignature, ReplayClaim<'a>)> {
        let expiration = transfer.expiration();
        if !is_unexpired(expiration, now) {
            return Err(BridgeError::SignatureExpired { expiration, now });
        }

        let claim = self.guard.claim(hash)?;

        // The claim is released on every early return below.
        let typed = TypedSignature::from_bytes(signature)?;
        match recover_signer(&hash, &typed) {
            Some(signer) if signer == transfer.account => {
                tracing::debug!(
                    hash = %hash.short(),
                    signer = %signer,
                    signature_type = ?typed.signature_type,
                    "Transfer signature verified"
                );
                Ok((typed, claim))
            }
            recovered => {
                tracing::debug!(
                    hash = %hash.short(),
                    account = %transfer.account,
                    recovered = ?recovered,
                    "Signature does not recover to account"
                );
                Err(BridgeError::InvalidSignature)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::B256;
    use alloy::signers::SignerSync;
    use alloy::signers::local::PrivateKeySigner;
    use marginbridge_hashing::HashEngine;
    use marginbridge_types::{DomainConfig, SignatureType, TransferMode};

    use super::*;

    fn engine() -> HashEngine {
        HashEngine::new(&DomainConfig::new(1, Address::repeat_byte(0xb1)))
    }

    fn sign(signer: &PrivateKeySigner, hash: &TransferHash, ty: SignatureType) -> Vec<u8> {
        let digest = ty.signed_digest(hash.as_b256());
        let sig = signer.sign_hash_sync(&digest).unwrap();
        TypedSignature::from_rsv(&sig.as_bytes(), ty)
            .unwrap()
            .to_bytes()
            .to_vec()
    }

    fn setup(expiration: u128) -> (PrivateKeySigner, Transfer, TransferHash) {
        let signer = PrivateKeySigner::random();
        let transfer = Transfer::dummy_with(
            signer.address(),
            Address::repeat_byte(0xcc),
            U256::from(100),
            TransferMode::SomeToDestination,
            expiration,
        );
        let hash = engine().transfer_hash(&transfer);
        (signer, transfer, hash)
    }

    #[test]
    fn expiration_rule() {
        assert!(is_unexpired(0, u64::MAX));
        assert!(is_unexpired(100, 100), "boundary second still valid");
        assert!(!is_unexpired(100, 101));
        assert!(is_unexpired(u128::from(u64::MAX) + 1, u64::MAX));
    }

    #[test]
    fn recovers_all_signature_types() {
        let (signer, _, hash) = setup(0);
        for ty in [
            SignatureType::NoPrepend,
            SignatureType::Decimal,
            SignatureType::Hexadecimal,
        ] {
            let bytes = sign(&signer, &hash, ty);
            let typed = TypedSignature::from_bytes(&bytes).unwrap();
            assert_eq!(recover_signer(&hash, &typed), Some(signer.address()), "{ty:?}");
        }
    }

    #[test]
    fn decimal_type_matches_personal_message_signing() {
        let (signer, _, hash) = setup(0);
        let sig = signer.sign_message_sync(hash.as_b256().as_slice()).unwrap();
        let typed = TypedSignature::from_rsv(&sig.as_bytes(), SignatureType::Decimal).unwrap();
        assert_eq!(recover_signer(&hash, &typed), Some(signer.address()));
    }

    #[test]
    fn zero_based_recovery_byte_accepted() {
        let (signer, _, hash) = setup(0);
        let mut bytes = sign(&signer, &hash, SignatureType::NoPrepend);
        bytes[64] -= 27;
        let typed = TypedSignature::from_bytes(&bytes).unwrap();
        assert_eq!(recover_signer(&hash, &typed), Some(signer.address()));
    }

    #[test]
    fn placeholder_never_recovers() {
        let typed = TypedSignature::from_bytes(&TypedSignature::placeholder()).unwrap();
        assert_eq!(recover_signer(&TransferHash(B256::repeat_byte(1)), &typed), None);
    }

    #[test]
    fn valid_signature_reserves_hash() {
        let guard = ReplayGuard::new();
        let (signer, transfer, hash) = setup(0);
        let bytes = sign(&signer, &hash, SignatureType::NoPrepend);

        let (typed, claim) = SignatureVerifier::new(&guard)
            .verify(&transfer, hash, &bytes, 1_000)
            .unwrap();
        assert_eq!(typed.signature_type, SignatureType::NoPrepend);
        assert!(!guard.is_used(&hash));
        claim.consume();
        assert!(guard.is_used(&hash));
    }

    #[test]
    fn replayed_signature_rejected() {
        let guard = ReplayGuard::new();
        let (signer, transfer, hash) = setup(0);
        let bytes = sign(&signer, &hash, SignatureType::NoPrepend);
        let verifier = SignatureVerifier::new(&guard);

        verifier.verify(&transfer, hash, &bytes, 0).unwrap().1.consume();
        let err = verifier.verify(&transfer, hash, &bytes, 0).unwrap_err();
        assert!(
            matches!(err, BridgeError::SignatureAlreadyUsedOrInvalidated(_)),
            "Got: {err:?}"
        );
    }

    #[test]
    fn expired_checked_before_replay() {
        let guard = ReplayGuard::new();
        let (signer, transfer, hash) = setup(50);
        guard.invalidate(hash);
        let bytes = sign(&signer, &hash, SignatureType::NoPrepend);

        let err = SignatureVerifier::new(&guard)
            .verify(&transfer, hash, &bytes, 51)
            .unwrap_err();
        assert!(matches!(err, BridgeError::SignatureExpired { expiration: 50, now: 51 }));
    }

    #[test]
    fn wrong_signer_rejected_and_claim_released() {
        let guard = ReplayGuard::new();
        let (_, transfer, hash) = setup(0);
        let stranger = PrivateKeySigner::random();
        let bytes = sign(&stranger, &hash, SignatureType::NoPrepend);

        let err = SignatureVerifier::new(&guard)
            .verify(&transfer, hash, &bytes, 0)
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidSignature));
        assert!(!guard.is_used(&hash));
        assert!(guard.claim(hash).is_ok(), "failed verification must not hold the hash");
    }

    #[test]
    fn signature_over_other_transfer_rejected() {
        let guard = ReplayGuard::new();
        let (signer, transfer, hash) = setup(0);
        let mut other = transfer;
        other.amount = U256::from(1_000_000);
        let bytes = sign(&signer, &engine().transfer_hash(&other), SignatureType::NoPrepend);

        let err = SignatureVerifier::new(&guard)
            .verify(&transfer, hash, &bytes, 0)
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidSignature));
    }

    #[test]
    fn bad_recovery_byte_is_invalid_signature() {
        let guard = ReplayGuard::new();
        let (signer, transfer, hash) = setup(0);
        let mut bytes = sign(&signer, &hash, SignatureType::NoPrepend);
        bytes[64] = 35;

        let err = SignatureVerifier::new(&guard)
            .verify(&transfer, hash, &bytes, 0)
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidSignature));
    }

    #[test]
    fn unknown_type_byte_is_malformed() {
        let guard = ReplayGuard::new();
        let (signer, transfer, hash) = setup(0);
        let mut bytes = sign(&signer, &hash, SignatureType::NoPrepend);
        bytes[65] = 9;

        let err = SignatureVerifier::new(&guard)
            .verify(&transfer, hash, &bytes, 0)
            .unwrap_err();
        assert!(matches!(err, BridgeError::MalformedSignature { .. }));
        assert!(!guard.is_used(&hash));
    }
}
