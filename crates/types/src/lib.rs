//! # L2 Core Types
//!
//! Core type definitions for the L2 Core ledger.
//!
//! This crate provides the fundamental types shared by every other crate:
//! - [`AccountId`] - 20-byte account identifiers derived from secp256k1 keys
//! - [`H256`] - 32-byte hashes with Keccak256 support
//! - [`ValidatorId`] and [`DeploymentId`] - registry identifiers
//! - [`Transaction`], [`SignedTransaction`] and [`RawTransaction`] - the
//!   typed, signed and untyped forms of a ledger transaction
//! - [`BlockRecord`] and [`Receipt`] - the audit trail of committed work
//!
//! ## Example
//!
//! ```rust
//! use l2core_types::{AccountId, Transaction, H256};
//!
//! let alice: AccountId = "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEb1".parse().unwrap();
//! let bob = AccountId::new([2u8; 20]);
//!
//! let tx = Transaction::transfer(alice, bob, 40, 1_700_000_000_000);
//! assert_eq!(tx.canonical_hash(), tx.clone().canonical_hash());
//! assert_ne!(tx.canonical_hash(), H256::NIL);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod account;
pub mod block;
pub mod hash;
pub mod ids;
pub mod transaction;

// Re-export main types at crate root
pub use account::AccountId;
pub use block::{BlockRecord, Receipt};
pub use hash::H256;
pub use ids::{DeploymentId, ValidatorId};
pub use transaction::{
    RawTransaction, Signature, SignedTransaction, Transaction, TxKind, TxPayload,
};

/// Token amount in the smallest unit.
pub type Amount = u128;

/// Result type alias for L2 Core types operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when working with L2 Core types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid hex string
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// Invalid length for a fixed-size type
    #[error("invalid length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Invalid account identifier
    #[error("invalid account: {0}")]
    InvalidAccount(String),

    /// Invalid hash format
    #[error("invalid hash format: {0}")]
    InvalidHash(String),

    /// Invalid validator identifier
    #[error("invalid validator id: {0}")]
    InvalidValidatorId(String),

    /// Unknown transaction kind
    #[error("unknown transaction kind: {0}")]
    UnknownKind(String),

    /// Signature error
    #[error("signature error: {0}")]
    Signature(String),
}
