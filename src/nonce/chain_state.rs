//! Per-ledger nonce reconciliation.
//!
//! # Transitions on each observed mined nonce
//! ```text
//! mined > issued                         → adopt mined, reset stuck count
//! mined != issued && mined == last seen  → stuck poll; at threshold roll issued back to mined
//! otherwise                              → progress (or caught up), reset stuck count
//! always                                 → last seen = mined
//! ```

use crate::blockchain::LedgerName;

/// Consecutive stuck polls before an outstanding allocation is abandoned.
pub const DEFAULT_STUCK_POLL_THRESHOLD: u64 = 3;

/// What a reconcile step did to the issued nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// Chain moved past our allocations; issued nonce jumped forward.
    Adopted { from: u64, to: u64 },
    /// No progress while allocations are outstanding.
    Stuck { polls: u64 },
    /// Stuck threshold reached; issued nonce forced back to the mined nonce.
    RolledBack { from: u64, to: u64 },
    /// Caught up or confirmations progressing normally.
    Progressing,
}

/// Nonce bookkeeping for one ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainState {
    name: LedgerName,
    issued_nonce: u64,
    last_observed_mined_nonce: u64,
    stuck_poll_count: u64,
    stuck_threshold: u64,
}

impl ChainState {
    pub fn new(name: LedgerName) -> Self {
        Self::with_threshold(name, DEFAULT_STUCK_POLL_THRESHOLD)
    }

    pub fn with_threshold(name: LedgerName, stuck_threshold: u64) -> Self {
        Self {
            name,
            issued_nonce: 0,
            last_observed_mined_nonce: 0,
            stuck_poll_count: 0,
            stuck_threshold: stuck_threshold.max(1),
        }
    }

    /// Seed a state directly, e.g. to resume from known values.
    pub fn from_parts(name: LedgerName, issued_nonce: u64, last_observed_mined_nonce: u64) -> Self {
        Self {
            issued_nonce,
            last_observed_mined_nonce,
            ..Self::new(name)
        }
    }

    pub fn name(&self) -> LedgerName {
        self.name
    }

    /// Next nonce this proxy will hand out.
    pub fn issued_nonce(&self) -> u64 {
        self.issued_nonce
    }

    pub fn last_observed_mined_nonce(&self) -> u64 {
        self.last_observed_mined_nonce
    }

    pub fn stuck_poll_count(&self) -> u64 {
        self.stuck_poll_count
    }

    /// Hand out `weight` consecutive nonces, returning the first.
    pub fn allocate(&mut self, weight: u64) -> u64 {
        let base = self.issued_nonce;
        self.issued_nonce = self.issued_nonce.saturating_add(weight);
        base
    }

    /// Fold a freshly observed mined nonce into the state.
    pub fn reconcile(&mut self, mined_nonce: u64) -> Reconciliation {
        let outcome = if mined_nonce > self.issued_nonce {
            let from = self.issued_nonce;
            self.issued_nonce = mined_nonce;
            self.stuck_poll_count = 0;
            Reconciliation::Adopted { from, to: mined_nonce }
        } else if mined_nonce != self.issued_nonce
            && mined_nonce == self.last_observed_mined_nonce
        {
            self.stuck_poll_count += 1;
            if self.stuck_poll_count >= self.stuck_threshold {
                let from = self.issued_nonce;
                self.issued_nonce = mined_nonce;
                self.stuck_poll_count = 0;
                Reconciliation::RolledBack { from, to: mined_nonce }
            } else {
                Reconciliation::Stuck {
                    polls: self.stuck_poll_count,
                }
            }
        } else {
            self.stuck_poll_count = 0;
            Reconciliation::Progressing
        };

        self.last_observed_mined_nonce = mined_nonce;
        outcome
    }
}
