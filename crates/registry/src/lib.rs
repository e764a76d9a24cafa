//! # L2 Core Registry
//!
//! The permissioned validator set.
//!
//! This crate provides:
//! - Deployment requests and their admin approval or rejection
//! - Validator lifecycle: `PendingDeployment` → `Approved` → `Revoked`
//! - Delegation bookkeeping and per-validator stake aggregates
//! - Consistent stake snapshots for the consensus engine
//! - One-time node credential issuance ([`credentials`])
//!
//! The registry never touches balances. Requests that need a balance read it
//! through [`AccountStateProvider`]. Bonding is applied by ledger execution,
//! which takes its own lock before calling in here, and revocation,
//! rejection and undelegation unlock stake through the caller's
//! [`StakeLocks`].
//!
//! ## Example
//!
//! ```rust
//! use l2core_registry::{DeploymentConfig, MockAccountState, Registry, RegistryConfig};
//! use l2core_types::AccountId;
//!
//! let admin = AccountId::new([0xad; 20]);
//! let operator = AccountId::new([0x01; 20]);
//!
//! let state = MockAccountState::new();
//! state.set_balance(operator, 5_000);
//!
//! let registry = Registry::new(RegistryConfig::new(1_000, vec![admin]));
//! let id = registry
//!     .request_deployment(&state, operator, DeploymentConfig::with_validator_id("alpha"))
//!     .unwrap();
//! let approved = registry.approve_deployment(id, &admin).unwrap();
//!
//! assert!(approved.credentials.node_id.starts_with("node_"));
//! assert!(registry.authenticate_node(&approved.credentials.node_id, &approved.credentials.api_key));
//! assert_eq!(registry.active_validators().len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod credentials;
pub mod registry;
pub mod state;
pub mod types;

pub use credentials::{CredentialIssuer, IssuedCredentials, NodeCredentials};
pub use registry::{Registry, RegistryConfig};
pub use state::{AccountStateProvider, MockAccountState, StakeLocks};
pub use types::{
    ApprovedDeployment, Delegation, DeploymentConfig, DeploymentRequest, DeploymentStatus,
    NetworkOverview, NodeStatus, RegistrationOutcome, RegistrySnapshot, ReleasedStake,
    Revocation, Validator, ValidatorSnapshot, ValidatorStatus,
};

use l2core_types::{AccountId, Amount, DeploymentId, ValidatorId};

/// Result type alias for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Registry errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Caller is not in the admin set
    #[error("account {0} is not authorized for this operation")]
    Unauthorized(AccountId),

    /// Deployment was already approved or rejected
    #[error("deployment {id} already decided ({status})")]
    AlreadyDecided {
        /// Deployment id
        id: DeploymentId,
        /// Status it was decided with
        status: DeploymentStatus,
    },

    /// No such deployment, validator or node
    #[error("not found: {0}")]
    NotFound(String),

    /// Account balance is below the minimum for a deployment request
    #[error("insufficient stake: required {required}, available {available}")]
    InsufficientStake {
        /// Minimum required balance
        required: Amount,
        /// Balance of the requesting account
        available: Amount,
    },

    /// Validator id has been used before, possibly by a revoked validator
    #[error("validator id already in use: {0}")]
    ValidatorExists(ValidatorId),

    /// Validator has been revoked
    #[error("validator revoked: {0}")]
    ValidatorRevoked(ValidatorId),

    /// Account already has an undecided deployment request
    #[error("deployment {0} is already pending for this account")]
    DeploymentPending(DeploymentId),

    /// Proposed validator id is malformed
    #[error("invalid validator id: {0}")]
    InvalidValidatorId(String),

    /// Account already operates a different validator
    #[error("account {account} already operates validator {validator}")]
    OwnerMismatch {
        /// Account that sent the registration
        account: AccountId,
        /// Validator it already operates
        validator: ValidatorId,
    },

    /// Stake aggregate would overflow
    #[error("stake overflow")]
    Overflow,
}
