//! Event sinks for bridge records.
//!
//! The orchestrator hands every [`BridgeEvent`] to an [`EventSink`] after the
//! state change it describes. The core never reads events back.

use std::sync::{Mutex, MutexGuard, PoisonError};

use marginbridge_types::{BridgeEvent, Result, SignatureInvalidated, TransferCompleted};

/// Receives emitted records.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: BridgeEvent);
}

/// Append-only in-memory log.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<BridgeEvent>>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<BridgeEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of every record, in emission order.
    pub fn events(&self) -> Vec<BridgeEvent> {
        self.lock().clone()
    }

    pub fn transfers(&self) -> Vec<TransferCompleted> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                BridgeEvent::Transferred(t) => Some(*t),
                BridgeEvent::SignatureInvalidated(_) => None,
            })
            .collect()
    }

    pub fn invalidations(&self) -> Vec<SignatureInvalidated> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                BridgeEvent::SignatureInvalidated(i) => Some(*i),
                BridgeEvent::Transferred(_) => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// One JSON object per line.
    ///
    /// # Errors
    /// Returns [`BridgeError::Serialization`](marginbridge_types::BridgeError::Serialization)
    /// if a record fails to serialize.
    pub fn to_json_lines(&self) -> Result<String> {
        let mut out = String::new();
        for event in self.lock().iter() {
            out.push_str(&serde_json::to_string(event)?);
            out.push('\n');
        }
        Ok(out)
    }
}

impl EventSink for EventLog {
    fn emit(&self, event: BridgeEvent) {
        self.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{Address, B256, U256};
    use marginbridge_types::{Transfer, TransferHash};

    use super::*;

    fn completed(amount: u64) -> TransferCompleted {
        let t = Transfer::dummy(Address::repeat_byte(1), Address::repeat_byte(2), U256::from(amount));
        TransferCompleted::new(&t, true, U256::from(amount))
    }

    #[test]
    fn keeps_emission_order() {
        let log = EventLog::new();
        log.emit(completed(1).into());
        log.emit(
            SignatureInvalidated {
                account: Address::repeat_byte(1),
                transfer_hash: TransferHash(B256::repeat_byte(3)),
            }
            .into(),
        );
        log.emit(completed(2).into());

        assert_eq!(log.len(), 3);
        assert_eq!(log.transfers().len(), 2);
        assert_eq!(log.transfers()[1].amount, U256::from(2));
        assert_eq!(log.invalidations().len(), 1);
        assert!(matches!(log.events()[1], BridgeEvent::SignatureInvalidated(_)));
    }

    #[test]
    fn json_lines_parse_back() {
        let log = EventLog::new();
        log.emit(completed(5).into());
        log.emit(completed(6).into());

        let text = log.to_json_lines().unwrap();
        let parsed: Vec<BridgeEvent> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(parsed, log.events());
    }
}
