//! Registry records.

use std::collections::BTreeMap;
use std::fmt;

use l2core_types::{AccountId, Amount, DeploymentId, ValidatorId, H256};
use serde::{Deserialize, Serialize};

use crate::credentials::{IssuedCredentials, NodeCredentials};

/// Lifecycle state of a validator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorStatus {
    /// Requested, awaiting an admin decision
    PendingDeployment,
    /// Approved; votes and counts toward total stake
    Approved,
    /// Terminal
    Revoked,
}

impl fmt::Display for ValidatorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::PendingDeployment => "pending_deployment",
            Self::Approved => "approved",
            Self::Revoked => "revoked",
        };
        f.write_str(s)
    }
}

/// Why and when a validator was revoked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revocation {
    /// Free-form reason supplied by the admin
    pub reason: String,
    /// Unix milliseconds
    pub revoked_at: u64,
    /// Admin that revoked
    pub revoked_by: AccountId,
}

/// A validator known to the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    /// Unique id, never reused
    pub id: ValidatorId,
    /// Operating account
    pub owner: AccountId,
    /// Stake bonded by the owner
    pub self_stake: Amount,
    /// Sum of all delegations to this validator
    pub delegated_stake: Amount,
    /// Lifecycle state
    pub status: ValidatorStatus,
    /// Set once revoked
    pub revocation: Option<Revocation>,
    /// Unix milliseconds
    pub created_at: u64,
    /// Unix milliseconds
    pub approved_at: Option<u64>,
    /// Node id from the issued credentials
    pub node_id: Option<String>,
}

impl Validator {
    /// Only approved validators vote
    pub fn is_active(&self) -> bool {
        self.status == ValidatorStatus::Approved
    }

    /// Whether the validator has been revoked
    pub fn is_revoked(&self) -> bool {
        self.status == ValidatorStatus::Revoked
    }

    /// Self stake plus delegated stake
    pub fn effective_stake(&self) -> Amount {
        self.self_stake.saturating_add(self.delegated_stake)
    }
}

/// Stake one account has delegated to one validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    /// Delegating account
    pub delegator: AccountId,
    /// Target validator
    pub validator: ValidatorId,
    /// Accumulated amount
    pub amount: Amount,
}

/// Decision state of a deployment request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    /// Awaiting an admin
    Pending,
    /// Credentials issued
    Approved,
    /// Terminal without credentials
    Rejected,
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Operator-supplied deployment parameters.
///
/// `self_stake` records the operator's intent. Stake is only bonded by a
/// `register_validator` transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentConfig {
    /// Proposed validator id; generated when absent
    pub validator_id: Option<String>,
    /// Intended self stake
    pub self_stake: Amount,
    /// Public endpoint of the node
    pub endpoint: Option<String>,
    /// Hosting region
    pub region: Option<String>,
    /// Free-form operator metadata
    pub metadata: BTreeMap<String, String>,
}

impl DeploymentConfig {
    /// Config proposing a specific validator id
    pub fn with_validator_id(id: impl Into<String>) -> Self {
        Self {
            validator_id: Some(id.into()),
            ..Self::default()
        }
    }
}

/// A request to run a validator node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRequest {
    /// Monotonic id
    pub id: DeploymentId,
    /// Requesting account, owner of the validator
    pub account: AccountId,
    /// Validator created for this request
    pub validator_id: ValidatorId,
    /// Operator parameters
    pub config: DeploymentConfig,
    /// Decision state
    pub status: DeploymentStatus,
    /// Binds the request to the credentials issued on approval
    pub credentials_hash: Option<H256>,
    /// Unix milliseconds
    pub created_at: u64,
    /// Unix milliseconds
    pub decided_at: Option<u64>,
    /// Admin that decided
    pub decided_by: Option<AccountId>,
    /// Reason given on rejection
    pub rejection_reason: Option<String>,
}

impl DeploymentRequest {
    /// Still awaiting a decision
    pub fn is_pending(&self) -> bool {
        self.status == DeploymentStatus::Pending
    }
}

/// Returned once from a successful approval
#[derive(Debug, Clone, Serialize)]
pub struct ApprovedDeployment {
    /// Approved request
    pub deployment_id: DeploymentId,
    /// Validator that is now active
    pub validator_id: ValidatorId,
    /// Node credentials, including secrets that are not retained
    pub credentials: NodeCredentials,
}

/// Approved validators and their effective stake at one instant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSnapshot {
    /// Sorted by id
    pub validators: Vec<(ValidatorId, Amount)>,
    /// Sum of effective stake
    pub total_stake: Amount,
}

impl ValidatorSnapshot {
    /// Build from `(id, stake)` pairs, sorting by id
    pub fn new(mut validators: Vec<(ValidatorId, Amount)>) -> Self {
        validators.sort_by(|a, b| a.0.cmp(&b.0));
        let total_stake = validators
            .iter()
            .fold(0u128, |acc, (_, stake)| acc.saturating_add(*stake));
        Self {
            validators,
            total_stake,
        }
    }

    /// Number of validators
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// No approved validators
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Stake of one validator, if it is in the snapshot
    pub fn stake_of(&self, id: &ValidatorId) -> Option<Amount> {
        self.validators
            .iter()
            .find(|(v, _)| v == id)
            .map(|(_, stake)| *stake)
    }

    /// Whether a validator is in the snapshot
    pub fn contains(&self, id: &ValidatorId) -> bool {
        self.stake_of(id).is_some()
    }
}

/// Network-wide counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkOverview {
    /// Validators ever created
    pub total_validators: usize,
    /// Approved validators
    pub active_validators: usize,
    /// Revoked validators
    pub revoked_validators: usize,
    /// Undecided deployment requests
    pub pending_deployments: usize,
    /// Effective stake of approved validators
    pub total_active_stake: Amount,
    /// Minimum balance to request a deployment
    pub min_stake_requirement: Amount,
}

/// Status of one validator node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    /// Validator id
    pub validator_id: ValidatorId,
    /// Operating account
    pub owner: AccountId,
    /// Lifecycle state
    pub status: ValidatorStatus,
    /// Whether the validator currently votes
    pub is_active: bool,
    /// Bonded by the owner
    pub self_stake: Amount,
    /// Sum of delegations
    pub delegated_stake: Amount,
    /// Self plus delegated
    pub effective_stake: Amount,
    /// Number of delegators
    pub delegation_count: usize,
    /// Node id once approved
    pub node_id: Option<String>,
    /// Unix milliseconds
    pub created_at: u64,
    /// Unix milliseconds
    pub approved_at: Option<u64>,
    /// Unix milliseconds of the node's last successful authentication
    pub last_seen: Option<u64>,
    /// Present once revoked
    pub revocation: Option<Revocation>,
}

/// What a registration upsert did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// New validator in `PendingDeployment` plus a pending request
    Created {
        /// Request opened for the new validator
        deployment_id: DeploymentId,
    },
    /// Existing validator's self stake replaced
    Updated {
        /// Self stake before the update
        previous_self_stake: Amount,
    },
}

/// Stake bonded to a validator that has been revoked or rejected.
///
/// Ledger execution releases these locks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleasedStake {
    /// Owner and its self stake
    pub owner: Option<(AccountId, Amount)>,
    /// Each delegator and its removed delegation
    pub delegations: Vec<(AccountId, Amount)>,
}

impl ReleasedStake {
    /// Nothing to release
    pub fn is_empty(&self) -> bool {
        self.owner.map_or(true, |(_, amount)| amount == 0) && self.delegations.is_empty()
    }
}

/// Full registry state for persistence
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySnapshot {
    /// All validators, including revoked
    pub validators: Vec<Validator>,
    /// Live delegations
    pub delegations: Vec<Delegation>,
    /// All deployment requests
    pub deployments: Vec<DeploymentRequest>,
    /// Retained credential records
    pub credentials: Vec<IssuedCredentials>,
    /// Next id to assign
    pub next_deployment_id: DeploymentId,
}
