//! # L2 Core Mempool
//!
//! Transaction intake and the pending pool.
//!
//! This crate provides:
//! - Syntactic validation of untyped submissions ([`validation`])
//! - Canonical hashing and idempotent enqueueing ([`Intake`])
//! - The submission-ordered, hash-deduplicated [`PendingPool`]
//!
//! Intake is a cheap stateless filter. It never checks signatures against
//! keys or balances against state; the consensus engine does that when it
//! assembles a block.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use l2core_crypto::PrivateKey;
//! use l2core_mempool::{Intake, PendingPool, PoolConfig};
//! use l2core_types::{AccountId, RawTransaction, Transaction};
//!
//! let pool = Arc::new(PendingPool::new(PoolConfig::default()));
//! let intake = Intake::new(Arc::clone(&pool));
//!
//! let key = PrivateKey::random();
//! let tx = Transaction::transfer(key.account_id(), AccountId::new([2; 20]), 40, 1);
//! let raw = RawTransaction::from(&key.sign_transaction(tx).unwrap());
//!
//! let hash = intake.submit(raw.clone()).unwrap();
//! assert_eq!(intake.submit(raw).unwrap(), hash);
//! assert_eq!(pool.len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod intake;
pub mod pool;
pub mod validation;

// Re-export main types at crate root
pub use intake::Intake;
pub use pool::{InsertOutcome, PendingPool, PendingTransaction, PoolConfig, PoolStats};
pub use validation::parse_raw;

/// Result type alias for intake operations
pub type Result<T> = std::result::Result<T, IntakeError>;

/// Errors returned to submitters. All are final for the given input; the
/// caller may retry with corrected fields.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntakeError {
    /// Kind is not one of the recognised set
    #[error("unknown transaction kind: {0}")]
    UnknownKind(String),

    /// A field required for this kind is absent
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Amount is malformed, or zero where a positive amount is required
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Sender is not a well-formed non-zero account
    #[error("invalid sender: {0}")]
    InvalidSender(String),

    /// Recipient is not a well-formed account or validator id
    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),

    /// Signature is not 65 bytes of hex
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Transfer from an account to itself
    #[error("transfer to self")]
    SelfTransfer,

    /// Pool is at capacity and cannot accept more transactions
    #[error("pending pool is full ({capacity} transactions)")]
    PoolFull {
        /// Configured capacity
        capacity: usize,
    },
}
