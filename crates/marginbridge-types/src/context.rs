//! Per-call context: who is calling, and when.

use alloy_primitives::Address;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// The identity and clock reading a call is evaluated against.
///
/// The timestamp is supplied by the caller's environment (a block time, a
/// trusted clock) and is the only input to expiration checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    /// The identity submitting the call.
    pub caller: Address,
    /// Unix seconds.
    pub timestamp: u64,
}

impl CallContext {
    #[must_use]
    pub fn new(caller: Address, timestamp: u64) -> Self {
        Self { caller, timestamp }
    }

    /// Context stamped with the local wall clock.
    #[must_use]
    pub fn now(caller: Address) -> Self {
        let timestamp = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
        Self { caller, timestamp }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_after_2020() {
        let ctx = CallContext::now(Address::ZERO);
        assert!(ctx.timestamp > 1_577_836_800);
    }
}
