//! System-wide constants for the MarginBridge proxy.

/// Fixed domain name bound into every transfer hash.
pub const DOMAIN_NAME: &str = "MarginBridgeProxy";

/// Fixed domain version bound into every transfer hash.
pub const DOMAIN_VERSION: &str = "1.0";

/// Two-byte prefix of the final transfer hash preimage (`0x19 0x01`).
pub const TYPED_DATA_PREFIX: [u8; 2] = [0x19, 0x01];

/// Width of the transfer mode subfield of the options word.
pub const MODE_BITS: u32 = 8;

/// Width of the expiration subfield of the options word.
pub const EXPIRATION_BITS: u32 = 120;

/// Width of the salt subfield of the options word.
pub const SALT_BITS: u32 = 128;

/// Largest expiration that fits in the options word.
pub const MAX_EXPIRATION: u128 = (1u128 << EXPIRATION_BITS) - 1;

/// Length of a typed signature: `r ‖ s ‖ v ‖ type`.
pub const TYPED_SIGNATURE_LEN: usize = 66;

/// Message prefix for [`SignatureType::Decimal`](crate::SignatureType::Decimal) signatures.
pub const PREPEND_DECIMAL: &[u8] = b"\x19Ethereum Signed Message:\n32";

/// Message prefix for [`SignatureType::Hexadecimal`](crate::SignatureType::Hexadecimal) signatures.
pub const PREPEND_HEX: &[u8] = b"\x19Ethereum Signed Message:\n\x20";
