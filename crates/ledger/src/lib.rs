//! # L2 Core Ledger
//!
//! Ledger execution: the only writer of account balances.
//!
//! This crate provides:
//! - Account state with stake locks ([`AccountState`])
//! - Exactly-once application of transactions, producing [`Receipt`]s
//! - Side-effect-free simulation of a batch against pending state
//! - Genesis seeding and revocation unlocks
//!
//! Every mutation runs under the ledger's write lock. Registry calls made
//! during execution happen while that lock is held, so the lock order is
//! always ledger, then registry.
//!
//! [`Receipt`]: l2core_types::Receipt

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod account;
pub mod ledger;
mod pending;

pub use account::AccountState;
pub use ledger::{Ledger, LedgerSnapshot};

use l2core_registry::RegistryError;
use l2core_types::{Amount, ValidatorId, H256};

/// Result type alias for execution
pub type Result<T> = std::result::Result<T, ExecutionError>;

/// Reasons a transaction cannot be applied
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    /// Spendable balance does not cover the amount
    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        /// Amount needed
        required: Amount,
        /// Spendable balance
        available: Amount,
    },

    /// Signature does not recover to the sender
    #[error("signature does not match sender")]
    InvalidSignature,

    /// Delegation target does not exist
    #[error("unknown validator: {0}")]
    UnknownValidator(ValidatorId),

    /// Delegation target has been revoked
    #[error("validator revoked: {0}")]
    ValidatorRevoked(ValidatorId),

    /// A receipt already exists for this hash
    #[error("transaction {0} already applied")]
    AlreadyApplied(H256),

    /// Balance or lock arithmetic overflowed
    #[error("amount overflow")]
    Overflow,

    /// Registry rejected the registration or delegation
    #[error("registry: {0}")]
    Registry(#[from] RegistryError),
}

impl ExecutionError {
    /// Map a registry error raised while resolving a delegation target
    pub(crate) fn delegation_target(validator: &ValidatorId, err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(_) => Self::UnknownValidator(validator.clone()),
            RegistryError::ValidatorRevoked(id) => Self::ValidatorRevoked(id),
            other => Self::Registry(other),
        }
    }
}
