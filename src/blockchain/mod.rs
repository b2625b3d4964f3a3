//! Blockchain subsystem: the signing key and transaction wire format.
//!
//! # Data Flow
//! ```text
//! upstream `result` JSON
//!     → types.rs (TransactionDescriptor, quantity decoding)
//!     → wallet.rs (EIP-155 legacy signing, RLP encoding)
//!     → hex strings submitted back upstream
//! ```
//!
//! # Security Constraints
//! - One key per process, read-only after load
//! - Never log private keys or sensitive data

pub mod types;
pub mod wallet;

pub use types::{
    LedgerName, SignedTransactions, SigningError, SigningResult, TransactionDescriptor,
    UnknownLedger, UnsignedTransactions,
};
pub use wallet::Signer;
