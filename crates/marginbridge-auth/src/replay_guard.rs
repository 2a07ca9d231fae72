//! Replay guard: each transfer hash authorizes at most one signed execution.
//!
//! Like a spent-output set: once a hash is marked used, by a signed
//! execution or by explicit invalidation, it stays used. Unlike a settlement
//! cache there is no eviction; an evicted hash could be replayed.
//!
//! Signed executions go through [`ReplayGuard::claim`]. A claim reserves the
//! hash for one in-flight execution; [`ReplayClaim::consume`] marks it used
//! once the ledgers have moved funds, and dropping an unconsumed claim gives
//! the reservation back. Check and reservation happen under one lock, so two
//! concurrent calls can never both observe "unused" and both execute.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use marginbridge_types::{BridgeError, Result, TransferHash};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default)]
struct ReplayState {
    /// Hashes consumed or invalidated. Only ever grows.
    used: HashSet<TransferHash>,
    /// Hashes reserved by an execution that has not finished yet.
    in_flight: HashSet<TransferHash>,
}

/// Process-wide used/unused flag per transfer hash.
#[derive(Debug, Default)]
pub struct ReplayGuard {
    state: Mutex<ReplayState>,
}

/// Serializable form of the used set, for persisting across restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaySnapshot {
    pub used: Vec<TransferHash>,
}

impl ReplayGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a guard from a snapshot. Every hash in it starts out used.
    #[must_use]
    pub fn from_snapshot(snapshot: ReplaySnapshot) -> Self {
        let state = ReplayState {
            used: snapshot.used.into_iter().collect(),
            in_flight: HashSet::new(),
        };
        Self {
            state: Mutex::new(state),
        }
    }

    // A panic while holding the lock cannot leave a half-written flag, so a
    // poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, ReplayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether `hash` has been consumed or invalidated.
    pub fn is_used(&self, hash: &TransferHash) -> bool {
        self.lock().used.contains(hash)
    }

    /// Mark `hash` used without executing. Returns `true` if it was unused.
    pub fn invalidate(&self, hash: TransferHash) -> bool {
        self.lock().used.insert(hash)
    }

    /// Reserve `hash` for one signed execution.
    ///
    /// A hash reserved by another execution is reported the same way as a
    /// used one, but it is not final: if that execution fails, its claim is
    /// released unconsumed and the hash can be claimed again. Only
    /// [`is_used`](Self::is_used) tells the two apart.
    ///
    /// # Errors
    /// Returns [`BridgeError::SignatureAlreadyUsedOrInvalidated`] if the hash
    /// is used or already reserved by another execution.
    pub fn claim(&self, hash: TransferHash) -> Result<ReplayClaim<'_>> {
        let mut state = self.lock();
        if state.used.contains(&hash) || !state.in_flight.insert(hash) {
            return Err(BridgeError::SignatureAlreadyUsedOrInvalidated(hash));
        }
        Ok(ReplayClaim {
            guard: self,
            hash,
            consumed: false,
        })
    }

    /// Number of used hashes.
    pub fn len(&self) -> usize {
        self.lock().used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().used.is_empty()
    }

    /// Copy of the used set, sorted for stable output.
    pub fn snapshot(&self) -> ReplaySnapshot {
        let mut used: Vec<TransferHash> = self.lock().used.iter().copied().collect();
        used.sort_unstable();
        ReplaySnapshot { used }
    }
}

/// A reservation of one transfer hash for one in-flight execution.
#[derive(Debug)]
#[must_use = "dropping a claim without consuming it releases the hash"]
pub struct ReplayClaim<'a> {
    guard: &'a ReplayGuard,
    hash: TransferHash,
    consumed: bool,
}

impl ReplayClaim<'_> {
    #[must_use]
    pub fn hash(&self) -> TransferHash {
        self.hash
    }

    /// Mark the hash used and release the reservation.
    pub fn consume(mut self) {
        let mut state = self.guard.lock();
        state.used.insert(self.hash);
        state.in_flight.remove(&self.hash);
        self.consumed = true;
    }
}

impl Drop for ReplayClaim<'_> {
    fn drop(&mut self) {
        if !self.consumed {
            self.guard.lock().in_flight.remove(&self.hash);
        }
    }
}
