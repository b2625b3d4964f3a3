//! Nonce tracking subsystem.
//!
//! # Data Flow
//! ```text
//! startup:      sync.rs sync_once (fatal on failure)
//! every 20s:    sync.rs NonceSynchronizer → UpstreamClient::nonce per ledger
//!                   → book.rs reconcile (under lock) → chain_state.rs
//! per request:  book.rs allocate (under lock) → base_nonce
//! ```
//!
//! # Design Decisions
//! - One coarse lock over both ledgers, never held across I/O
//! - Requests never roll back their own allocations; reconciliation does

pub mod book;
pub mod chain_state;
pub mod sync;

pub use book::{LedgerSnapshot, NonceBook};
pub use chain_state::{ChainState, Reconciliation, DEFAULT_STUCK_POLL_THRESHOLD};
pub use sync::{sync_once, NonceSynchronizer, SyncError};
