//! Both ledgers' nonce state behind one coarse lock.
//!
//! The lock guards plain integers and is never held across an await point.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::blockchain::LedgerName;
use crate::nonce::chain_state::{ChainState, Reconciliation};
use crate::observability::metrics;

#[derive(Debug)]
struct Ledgers {
    home: ChainState,
    side: ChainState,
}

impl Ledgers {
    fn get_mut(&mut self, ledger: LedgerName) -> &mut ChainState {
        match ledger {
            LedgerName::Home => &mut self.home,
            LedgerName::Side => &mut self.side,
        }
    }
}

/// Point-in-time copy of one ledger's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub issued_nonce: u64,
    pub last_observed_mined_nonce: u64,
    pub stuck_poll_count: u64,
}

impl From<&ChainState> for LedgerSnapshot {
    fn from(state: &ChainState) -> Self {
        Self {
            issued_nonce: state.issued_nonce(),
            last_observed_mined_nonce: state.last_observed_mined_nonce(),
            stuck_poll_count: state.stuck_poll_count(),
        }
    }
}

/// Shared nonce tracker for the home and side ledgers.
#[derive(Debug)]
pub struct NonceBook {
    ledgers: Mutex<Ledgers>,
}

impl NonceBook {
    pub fn new(stuck_threshold: u64) -> Self {
        Self::from_states(
            ChainState::with_threshold(LedgerName::Home, stuck_threshold),
            ChainState::with_threshold(LedgerName::Side, stuck_threshold),
        )
    }

    pub fn from_states(home: ChainState, side: ChainState) -> Self {
        Self {
            ledgers: Mutex::new(Ledgers { home, side }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Ledgers> {
        self.ledgers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserve `weight` nonces on `ledger`, returning the first.
    pub fn allocate(&self, ledger: LedgerName, weight: u64) -> u64 {
        let (base, issued) = {
            let mut ledgers = self.lock();
            let state = ledgers.get_mut(ledger);
            let base = state.allocate(weight);
            (base, state.issued_nonce())
        };

        tracing::info!(ledger = %ledger, base_nonce = base, weight, "Allocated nonce");
        metrics::record_nonce_allocation(ledger.as_str(), issued);
        base
    }

    /// Fold a freshly observed mined nonce into `ledger`.
    pub fn reconcile(&self, ledger: LedgerName, mined_nonce: u64) -> Reconciliation {
        let (outcome, issued) = {
            let mut ledgers = self.lock();
            let state = ledgers.get_mut(ledger);
            let outcome = state.reconcile(mined_nonce);
            (outcome, state.issued_nonce())
        };

        match outcome {
            Reconciliation::Adopted { from, to } => {
                tracing::info!(ledger = %ledger, from, to, "Adopted chain nonce");
            }
            Reconciliation::Stuck { polls } => {
                tracing::debug!(ledger = %ledger, mined_nonce, issued, polls, "No nonce progress");
            }
            Reconciliation::RolledBack { from, to } => {
                tracing::warn!(ledger = %ledger, from, to, "Rolled back stale nonce allocation");
                metrics::record_nonce_rollback(ledger.as_str());
            }
            Reconciliation::Progressing => {}
        }
        metrics::record_nonce_observation(ledger.as_str(), mined_nonce, issued);

        outcome
    }

    pub fn snapshot(&self, ledger: LedgerName) -> LedgerSnapshot {
        let mut ledgers = self.lock();
        LedgerSnapshot::from(&*ledgers.get_mut(ledger))
    }
}

impl Default for NonceBook {
    fn default() -> Self {
        Self::new(crate::nonce::chain_state::DEFAULT_STUCK_POLL_THRESHOLD)
    }
}
