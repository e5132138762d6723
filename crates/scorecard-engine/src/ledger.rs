//! Thread-safe cost ledger

use scorecard_domain::{CostLedgerEntry, CostSnapshot};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct LedgerState {
    totals: CostSnapshot,
    history: Vec<CostLedgerEntry>,
}

/// Running token and cost totals with an append-only call history
///
/// Clones share the same state, so one ledger can be handed to every worker
/// evaluating a score. Each `record` updates totals and history under one lock.
#[derive(Debug, Clone, Default)]
pub struct CostLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl CostLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record one model call
    pub fn record(&self, entry: CostLedgerEntry) {
        let mut state = self.lock();
        state.totals.add_entry(&entry);
        state.history.push(entry);
    }

    /// Immutable copy of the current totals
    pub fn snapshot(&self) -> CostSnapshot {
        self.lock().totals.clone()
    }

    /// Copy of the call history, in recording order
    pub fn history(&self) -> Vec<CostLedgerEntry> {
        self.lock().history.clone()
    }

    /// Number of recorded calls
    pub fn len(&self) -> usize {
        self.lock().history.len()
    }

    /// Whether no call has been recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
