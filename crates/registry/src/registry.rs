//! Validator registry.
//!
//! All state sits behind one `RwLock`; every mutation takes the write lock
//! for its whole check-then-update sequence, so decisions on one deployment
//! or validator are serialized. Readers get consistent copies.
//!
//! Lock order: when called from ledger execution the ledger lock is already
//! held. Operations that drop bonded stake release it through the caller's
//! [`StakeLocks`] while the registry lock is still held; that is the only
//! way back into ledger state.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use l2core_crypto::{digest_eq, secret_digest, PublicKey};
use l2core_types::{AccountId, Amount, DeploymentId, Signature, ValidatorId, H256};
use parking_lot::RwLock;
use tracing::{debug, info, trace, warn};

use crate::credentials::{random_hex, CredentialIssuer, IssuedCredentials};
use crate::state::{AccountStateProvider, StakeLocks};
use crate::types::{
    ApprovedDeployment, Delegation, DeploymentConfig, DeploymentRequest, DeploymentStatus,
    NetworkOverview, NodeStatus, RegistrationOutcome, RegistrySnapshot, ReleasedStake,
    Revocation, Validator, ValidatorSnapshot, ValidatorStatus,
};
use crate::{RegistryError, Result};

/// Prefix of generated validator ids
pub const VALIDATOR_ID_PREFIX: &str = "val_";

/// Current Unix time in milliseconds
pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Registry configuration
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Minimum balance an account needs to request a deployment
    pub min_stake_requirement: Amount,
    /// Accounts allowed to approve, reject and revoke
    pub admins: HashSet<AccountId>,
}

impl RegistryConfig {
    /// Create a configuration
    pub fn new(min_stake_requirement: Amount, admins: impl IntoIterator<Item = AccountId>) -> Self {
        Self {
            min_stake_requirement,
            admins: admins.into_iter().collect(),
        }
    }

    /// Whether `account` is an admin
    pub fn is_admin(&self, account: &AccountId) -> bool {
        self.admins.contains(account)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::new(1_000, Vec::new())
    }
}

#[derive(Default)]
struct RegistryInner {
    /// Every validator ever created; ids are never reused
    validators: BTreeMap<ValidatorId, Validator>,
    /// Current validator of each owner
    owners: HashMap<AccountId, ValidatorId>,
    /// Delegated amount per (validator, delegator)
    delegations: BTreeMap<(ValidatorId, AccountId), Amount>,
    deployments: BTreeMap<DeploymentId, DeploymentRequest>,
    /// Undecided request per account
    open_deployments: HashMap<AccountId, DeploymentId>,
    /// Retained credentials by node id
    credentials: HashMap<String, IssuedCredentials>,
    next_deployment_id: DeploymentId,
}

impl RegistryInner {
    fn new() -> Self {
        Self {
            next_deployment_id: DeploymentId(1),
            ..Self::default()
        }
    }

    /// Current validator of an owner
    fn owned_validator(&self, owner: &AccountId) -> Option<&Validator> {
        self.owners.get(owner).and_then(|id| self.validators.get(id))
    }

    fn ensure_owner_free(&self, owner: &AccountId) -> Result<()> {
        if let Some(id) = self.open_deployments.get(owner) {
            return Err(RegistryError::DeploymentPending(*id));
        }
        match self.owned_validator(owner) {
            Some(v) if !v.is_revoked() => Err(RegistryError::OwnerMismatch {
                account: *owner,
                validator: v.id.clone(),
            }),
            _ => Ok(()),
        }
    }

    fn ensure_id_unused(&self, id: &ValidatorId) -> Result<()> {
        if self.validators.contains_key(id) {
            return Err(RegistryError::ValidatorExists(id.clone()));
        }
        Ok(())
    }

    fn generate_validator_id(&self) -> Result<ValidatorId> {
        loop {
            let id = ValidatorId::new(format!("{}{}", VALIDATOR_ID_PREFIX, random_hex::<8>()))
                .map_err(|e| RegistryError::InvalidValidatorId(e.to_string()))?;
            if !self.validators.contains_key(&id) {
                return Ok(id);
            }
        }
    }

    /// Create a pending validator and its open deployment request
    fn open_deployment(
        &mut self,
        account: AccountId,
        validator_id: ValidatorId,
        config: DeploymentConfig,
        self_stake: Amount,
    ) -> DeploymentId {
        let now = unix_millis();
        let id = self.next_deployment_id;
        self.next_deployment_id = id.next();

        self.validators.insert(
            validator_id.clone(),
            Validator {
                id: validator_id.clone(),
                owner: account,
                self_stake,
                delegated_stake: 0,
                status: ValidatorStatus::PendingDeployment,
                revocation: None,
                created_at: now,
                approved_at: None,
                node_id: None,
            },
        );
        self.owners.insert(account, validator_id.clone());
        self.deployments.insert(
            id,
            DeploymentRequest {
                id,
                account,
                validator_id,
                config,
                status: DeploymentStatus::Pending,
                credentials_hash: None,
                created_at: now,
                decided_at: None,
                decided_by: None,
                rejection_reason: None,
            },
        );
        self.open_deployments.insert(account, id);
        id
    }

    /// Guards shared by approve and reject
    fn pending_request(&self, id: DeploymentId) -> Result<&DeploymentRequest> {
        let request = self
            .deployments
            .get(&id)
            .ok_or_else(|| RegistryError::NotFound(format!("deployment {}", id)))?;
        if !request.is_pending() {
            return Err(RegistryError::AlreadyDecided {
                id,
                status: request.status,
            });
        }
        Ok(request)
    }

    fn decide(
        &mut self,
        id: DeploymentId,
        status: DeploymentStatus,
        decided_by: AccountId,
        reason: Option<String>,
    ) {
        if let Some(request) = self.deployments.get_mut(&id) {
            request.status = status;
            request.decided_at = Some(unix_millis());
            request.decided_by = Some(decided_by);
            request.rejection_reason = reason;
            self.open_deployments.remove(&request.account);
        }
    }

    fn undelegate(
        &mut self,
        delegator: &AccountId,
        validator: &ValidatorId,
        amount: Amount,
    ) -> Result<Amount> {
        let key = (validator.clone(), *delegator);
        let current = self.delegations.get(&key).copied().ok_or_else(|| {
            RegistryError::NotFound(format!("delegation {} -> {}", delegator, validator))
        })?;
        let remaining = current.checked_sub(amount).ok_or(RegistryError::Overflow)?;
        if remaining == 0 {
            self.delegations.remove(&key);
        } else {
            self.delegations.insert(key, remaining);
        }
        if let Some(v) = self.validators.get_mut(validator) {
            v.delegated_stake = v.delegated_stake.saturating_sub(amount);
        }
        Ok(remaining)
    }

    /// Mark a validator revoked and unbond everything staked on it
    fn revoke_validator(
        &mut self,
        validator_id: &ValidatorId,
        reason: String,
        authority: AccountId,
    ) -> ReleasedStake {
        let mut released = ReleasedStake::default();
        if let Some(v) = self.validators.get_mut(validator_id) {
            v.status = ValidatorStatus::Revoked;
            v.revocation = Some(Revocation {
                reason,
                revoked_at: unix_millis(),
                revoked_by: authority,
            });
            released.owner = Some((v.owner, v.self_stake));
            v.self_stake = 0;
        }

        let delegators: Vec<(AccountId, Amount)> = self
            .delegations
            .iter()
            .filter(|((v, _), _)| v == validator_id)
            .map(|((_, d), amount)| (*d, *amount))
            .collect();
        for (delegator, amount) in delegators {
            if self.undelegate(&delegator, validator_id, amount).is_ok() {
                released.delegations.push((delegator, amount));
            }
        }
        released
    }

    fn check_registration(
        &self,
        owner: &AccountId,
        validator_id: &ValidatorId,
        balance: Amount,
        required: Amount,
    ) -> Result<Option<Amount>> {
        if let Some(current) = self.owned_validator(owner) {
            if &current.id == validator_id {
                if current.is_revoked() {
                    return Err(RegistryError::ValidatorRevoked(validator_id.clone()));
                }
                return Ok(Some(current.self_stake));
            }
        }

        self.ensure_owner_free(owner)?;
        match self.validators.get(validator_id) {
            Some(v) if v.is_revoked() => {
                return Err(RegistryError::ValidatorRevoked(validator_id.clone()))
            }
            Some(_) => return Err(RegistryError::ValidatorExists(validator_id.clone())),
            None => {}
        }
        if balance < required {
            return Err(RegistryError::InsufficientStake {
                required,
                available: balance,
            });
        }
        Ok(None)
    }

    fn delegation_count(&self, validator: &ValidatorId) -> usize {
        self.delegations
            .keys()
            .filter(|(v, _)| v == validator)
            .count()
    }
}

/// Permissioned validator set.
pub struct Registry {
    inner: RwLock<RegistryInner>,
    config: RegistryConfig,
    issuer: CredentialIssuer,
}

impl Registry {
    /// Create an empty registry
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            inner: RwLock::new(RegistryInner::new()),
            config,
            issuer: CredentialIssuer::new(),
        }
    }

    /// Rebuild a registry from persisted state
    pub fn from_snapshot(config: RegistryConfig, snapshot: RegistrySnapshot) -> Self {
        let mut inner = RegistryInner::new();

        for validator in snapshot.validators {
            let replace = match inner.owned_validator(&validator.owner) {
                None => true,
                Some(current) => {
                    current.is_revoked()
                        && (!validator.is_revoked() || validator.created_at >= current.created_at)
                }
            };
            if replace {
                inner.owners.insert(validator.owner, validator.id.clone());
            }
            inner.validators.insert(validator.id.clone(), validator);
        }
        for d in snapshot.delegations {
            inner.delegations.insert((d.validator, d.delegator), d.amount);
        }

        let mut next = snapshot.next_deployment_id.max(DeploymentId(1));
        for request in snapshot.deployments {
            if request.is_pending() {
                inner.open_deployments.insert(request.account, request.id);
            }
            next = next.max(request.id.next());
            inner.deployments.insert(request.id, request);
        }
        inner.next_deployment_id = next;

        for issued in snapshot.credentials {
            inner.credentials.insert(issued.node_id.clone(), issued);
        }

        Self {
            inner: RwLock::new(inner),
            config,
            issuer: CredentialIssuer::new(),
        }
    }

    /// Registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Whether `account` is an admin
    pub fn is_admin(&self, account: &AccountId) -> bool {
        self.config.is_admin(account)
    }

    fn ensure_admin(&self, account: &AccountId) -> Result<()> {
        if !self.config.is_admin(account) {
            warn!(account = %account, "unauthorized registry operation");
            return Err(RegistryError::Unauthorized(*account));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Deployment lifecycle
    // ------------------------------------------------------------------

    /// Request a validator node deployment.
    ///
    /// The account's balance must meet the minimum stake requirement. The
    /// proposed validator id is used when given, otherwise one is generated.
    pub fn request_deployment<S>(
        &self,
        state: &S,
        account: AccountId,
        config: DeploymentConfig,
    ) -> Result<DeploymentId>
    where
        S: AccountStateProvider + ?Sized,
    {
        let required = self.config.min_stake_requirement;
        let available = state.balance(&account);
        if available < required {
            debug!(account = %account, required, available, "deployment request below minimum stake");
            return Err(RegistryError::InsufficientStake {
                required,
                available,
            });
        }

        let proposed = config
            .validator_id
            .as_deref()
            .map(ValidatorId::new)
            .transpose()
            .map_err(|e| RegistryError::InvalidValidatorId(e.to_string()))?;

        let mut inner = self.inner.write();
        inner.ensure_owner_free(&account)?;
        let validator_id = match proposed {
            Some(id) => {
                inner.ensure_id_unused(&id)?;
                id
            }
            None => inner.generate_validator_id()?,
        };

        let id = inner.open_deployment(account, validator_id.clone(), config, 0);
        info!(
            deployment_id = %id,
            validator_id = %validator_id,
            account = %account,
            "deployment requested"
        );
        Ok(id)
    }

    /// Approve a pending deployment and issue node credentials.
    ///
    /// Credentials are issued exactly once; only their digests are kept.
    pub fn approve_deployment(
        &self,
        id: DeploymentId,
        approver: &AccountId,
    ) -> Result<ApprovedDeployment> {
        self.ensure_admin(approver)?;
        let mut inner = self.inner.write();

        let request = inner.pending_request(id)?;
        let validator_id = request.validator_id.clone();
        match inner.validators.get(&validator_id) {
            None => return Err(RegistryError::NotFound(format!("validator {}", validator_id))),
            Some(v) if v.is_revoked() => return Err(RegistryError::ValidatorRevoked(validator_id)),
            Some(_) => {}
        }

        let (credentials, issued) = self.issuer.issue(request);
        let binding = issued.binding_hash();

        inner.decide(id, DeploymentStatus::Approved, *approver, None);
        if let Some(request) = inner.deployments.get_mut(&id) {
            request.credentials_hash = Some(binding);
        }
        if let Some(v) = inner.validators.get_mut(&validator_id) {
            v.status = ValidatorStatus::Approved;
            v.approved_at = Some(unix_millis());
            v.node_id = Some(issued.node_id.clone());
        }
        inner.credentials.insert(issued.node_id.clone(), issued);

        info!(
            deployment_id = %id,
            validator_id = %validator_id,
            node_id = %credentials.node_id,
            approver = %approver,
            "deployment approved"
        );
        Ok(ApprovedDeployment {
            deployment_id: id,
            validator_id,
            credentials,
        })
    }

    /// Reject a pending deployment.
    ///
    /// The validator created for the request is revoked, freeing its id
    /// for nothing and its owner for a new request. Stake bonded to it is
    /// unlocked through `locks`.
    pub fn reject_deployment(
        &self,
        id: DeploymentId,
        approver: &AccountId,
        reason: impl Into<String>,
        locks: &mut dyn StakeLocks,
    ) -> Result<ReleasedStake> {
        self.ensure_admin(approver)?;
        let reason = reason.into();
        let mut inner = self.inner.write();

        let validator_id = inner.pending_request(id)?.validator_id.clone();
        inner.decide(id, DeploymentStatus::Rejected, *approver, Some(reason.clone()));
        let released = inner.revoke_validator(
            &validator_id,
            format!("deployment rejected: {}", reason),
            *approver,
        );
        if !released.is_empty() {
            locks.release(&released);
        }

        info!(
            deployment_id = %id,
            validator_id = %validator_id,
            approver = %approver,
            reason = %reason,
            "deployment rejected"
        );
        Ok(released)
    }

    /// Permanently revoke a validator.
    ///
    /// Snapshots taken before this call still include the validator; every
    /// later snapshot excludes it. Its stake is unlocked through `locks`.
    pub fn revoke(
        &self,
        validator_id: &ValidatorId,
        reason: impl Into<String>,
        authority: &AccountId,
        locks: &mut dyn StakeLocks,
    ) -> Result<ReleasedStake> {
        self.ensure_admin(authority)?;
        let reason = reason.into();
        let mut inner = self.inner.write();

        match inner.validators.get(validator_id) {
            None => return Err(RegistryError::NotFound(format!("validator {}", validator_id))),
            Some(v) if v.is_revoked() => {
                return Err(RegistryError::ValidatorRevoked(validator_id.clone()))
            }
            Some(_) => {}
        }

        let open = inner
            .deployments
            .values()
            .find(|r| r.is_pending() && &r.validator_id == validator_id)
            .map(|r| r.id);
        if let Some(open) = open {
            inner.decide(
                open,
                DeploymentStatus::Rejected,
                *authority,
                Some("validator revoked".to_string()),
            );
        }

        let released = inner.revoke_validator(validator_id, reason.clone(), *authority);
        locks.release(&released);
        warn!(
            validator_id = %validator_id,
            authority = %authority,
            reason = %reason,
            released_delegations = released.delegations.len(),
            "validator revoked"
        );
        Ok(released)
    }

    /// Seed an approved validator at genesis
    pub fn seed_genesis_validator(
        &self,
        id: ValidatorId,
        owner: AccountId,
        self_stake: Amount,
    ) -> Result<()> {
        let mut inner = self.inner.write();
        inner.ensure_id_unused(&id)?;
        inner.ensure_owner_free(&owner)?;

        let now = unix_millis();
        inner.owners.insert(owner, id.clone());
        inner.validators.insert(
            id.clone(),
            Validator {
                id: id.clone(),
                owner,
                self_stake,
                delegated_stake: 0,
                status: ValidatorStatus::Approved,
                revocation: None,
                created_at: now,
                approved_at: Some(now),
                node_id: None,
            },
        );
        debug!(validator_id = %id, owner = %owner, self_stake, "genesis validator seeded");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Ledger execution hooks
    // ------------------------------------------------------------------

    /// Validator can receive a delegation
    pub fn check_delegation_target(&self, validator: &ValidatorId) -> Result<()> {
        match self.inner.read().validators.get(validator) {
            None => Err(RegistryError::NotFound(format!("validator {}", validator))),
            Some(v) if v.is_revoked() => Err(RegistryError::ValidatorRevoked(validator.clone())),
            Some(_) => Ok(()),
        }
    }

    /// Record a delegation, accumulating onto any existing one.
    ///
    /// Returns the delegator's new total on this validator.
    pub fn add_delegation(
        &self,
        delegator: AccountId,
        validator: &ValidatorId,
        amount: Amount,
    ) -> Result<Amount> {
        let mut inner = self.inner.write();
        let v = match inner.validators.get(validator) {
            None => return Err(RegistryError::NotFound(format!("validator {}", validator))),
            Some(v) if v.is_revoked() => {
                return Err(RegistryError::ValidatorRevoked(validator.clone()))
            }
            Some(v) => v,
        };
        let aggregate = v
            .delegated_stake
            .checked_add(amount)
            .ok_or(RegistryError::Overflow)?;

        let key = (validator.clone(), delegator);
        let total = inner
            .delegations
            .get(&key)
            .copied()
            .unwrap_or(0)
            .checked_add(amount)
            .ok_or(RegistryError::Overflow)?;

        inner.delegations.insert(key, total);
        if let Some(v) = inner.validators.get_mut(validator) {
            v.delegated_stake = aggregate;
        }
        debug!(delegator = %delegator, validator = %validator, amount, total, "delegation added");
        Ok(total)
    }

    /// Remove part or all of a delegation, unlocking the amount through
    /// `locks`. Returns what remains.
    pub fn undelegate(
        &self,
        delegator: &AccountId,
        validator: &ValidatorId,
        amount: Amount,
        locks: &mut dyn StakeLocks,
    ) -> Result<Amount> {
        let mut inner = self.inner.write();
        let remaining = inner.undelegate(delegator, validator, amount)?;
        locks.release(&ReleasedStake {
            owner: None,
            delegations: vec![(*delegator, amount)],
        });
        drop(inner);
        debug!(delegator = %delegator, validator = %validator, amount, remaining, "delegation removed");
        Ok(remaining)
    }

    /// Create or update the sender's validator.
    ///
    /// An existing validator gets its self stake replaced. Otherwise a new
    /// validator is created in `PendingDeployment` together with a pending
    /// deployment request; `balance` must meet the minimum stake
    /// requirement in that case.
    pub fn upsert_registration(
        &self,
        owner: AccountId,
        validator_id: &ValidatorId,
        self_stake: Amount,
        balance: Amount,
    ) -> Result<RegistrationOutcome> {
        let mut inner = self.inner.write();
        let required = self.config.min_stake_requirement;

        if let Some(previous_self_stake) =
            inner.check_registration(&owner, validator_id, balance, required)?
        {
            if let Some(v) = inner.validators.get_mut(validator_id) {
                v.self_stake = self_stake;
            }
            debug!(
                validator_id = %validator_id,
                previous_self_stake,
                self_stake,
                "self stake updated"
            );
            return Ok(RegistrationOutcome::Updated {
                previous_self_stake,
            });
        }

        let config = DeploymentConfig {
            validator_id: Some(validator_id.to_string()),
            self_stake,
            ..DeploymentConfig::default()
        };
        let deployment_id = inner.open_deployment(owner, validator_id.clone(), config, self_stake);
        info!(
            deployment_id = %deployment_id,
            validator_id = %validator_id,
            account = %owner,
            self_stake,
            "validator registered, awaiting approval"
        );
        Ok(RegistrationOutcome::Created { deployment_id })
    }

    /// Dry run of [`Registry::upsert_registration`].
    ///
    /// Returns the current self stake when the registration would update an
    /// existing validator, `None` when it would create one.
    pub fn check_registration(
        &self,
        owner: &AccountId,
        validator_id: &ValidatorId,
        balance: Amount,
    ) -> Result<Option<Amount>> {
        self.inner.read().check_registration(
            owner,
            validator_id,
            balance,
            self.config.min_stake_requirement,
        )
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Approved validators with effective stake, taken under one read lock
    pub fn active_validators(&self) -> ValidatorSnapshot {
        let inner = self.inner.read();
        ValidatorSnapshot::new(
            inner
                .validators
                .values()
                .filter(|v| v.is_active())
                .map(|v| (v.id.clone(), v.effective_stake()))
                .collect(),
        )
    }

    /// Look up a validator
    pub fn validator(&self, id: &ValidatorId) -> Option<Validator> {
        self.inner.read().validators.get(id).cloned()
    }

    /// Current validator of an owner
    pub fn validator_by_owner(&self, owner: &AccountId) -> Option<Validator> {
        self.inner.read().owned_validator(owner).cloned()
    }

    /// Validator authenticated by a node id
    pub fn validator_by_node(&self, node_id: &str) -> Option<Validator> {
        let inner = self.inner.read();
        let issued = inner.credentials.get(node_id)?;
        inner.validators.get(&issued.validator_id).cloned()
    }

    /// All validators, including revoked
    pub fn validators(&self) -> Vec<Validator> {
        self.inner.read().validators.values().cloned().collect()
    }

    /// Look up a deployment request
    pub fn deployment(&self, id: DeploymentId) -> Option<DeploymentRequest> {
        self.inner.read().deployments.get(&id).cloned()
    }

    /// Undecided requests, oldest first
    pub fn pending_deployments(&self) -> Vec<DeploymentRequest> {
        self.inner
            .read()
            .deployments
            .values()
            .filter(|r| r.is_pending())
            .cloned()
            .collect()
    }

    /// Delegations made by an account
    pub fn delegations_of(&self, delegator: &AccountId) -> Vec<Delegation> {
        self.inner
            .read()
            .delegations
            .iter()
            .filter(|((_, d), _)| d == delegator)
            .map(|((v, d), amount)| Delegation {
                delegator: *d,
                validator: v.clone(),
                amount: *amount,
            })
            .collect()
    }

    /// Delegations received by a validator
    pub fn delegations_to(&self, validator: &ValidatorId) -> Vec<Delegation> {
        self.inner
            .read()
            .delegations
            .iter()
            .filter(|((v, _), _)| v == validator)
            .map(|((v, d), amount)| Delegation {
                delegator: *d,
                validator: v.clone(),
                amount: *amount,
            })
            .collect()
    }

    /// Network-wide counters
    pub fn overview(&self) -> NetworkOverview {
        let inner = self.inner.read();
        let mut active = 0;
        let mut revoked = 0;
        let mut total_active_stake: Amount = 0;
        for v in inner.validators.values() {
            match v.status {
                ValidatorStatus::Approved => {
                    active += 1;
                    total_active_stake = total_active_stake.saturating_add(v.effective_stake());
                }
                ValidatorStatus::Revoked => revoked += 1,
                ValidatorStatus::PendingDeployment => {}
            }
        }
        NetworkOverview {
            total_validators: inner.validators.len(),
            active_validators: active,
            revoked_validators: revoked,
            pending_deployments: inner.open_deployments.len(),
            total_active_stake,
            min_stake_requirement: self.config.min_stake_requirement,
        }
    }

    /// Status of one validator node
    pub fn node_status(&self, id: &ValidatorId) -> Option<NodeStatus> {
        let inner = self.inner.read();
        let v = inner.validators.get(id)?;
        Some(NodeStatus {
            validator_id: v.id.clone(),
            owner: v.owner,
            status: v.status,
            is_active: v.is_active(),
            self_stake: v.self_stake,
            delegated_stake: v.delegated_stake,
            effective_stake: v.effective_stake(),
            delegation_count: inner.delegation_count(id),
            node_id: v.node_id.clone(),
            created_at: v.created_at,
            approved_at: v.approved_at,
            last_seen: v
                .node_id
                .as_ref()
                .and_then(|node_id| inner.credentials.get(node_id))
                .and_then(|issued| issued.last_seen),
            revocation: v.revocation.clone(),
        })
    }

    // ------------------------------------------------------------------
    // Node authentication
    // ------------------------------------------------------------------

    /// Check a node's API key against the retained digest, recording the
    /// time of every success as the node's `last_seen`.
    ///
    /// Nodes of revoked validators never authenticate.
    pub fn authenticate_node(&self, node_id: &str, api_key: &str) -> bool {
        let mut guard = self.inner.write();
        let inner = &mut *guard;
        let Some(issued) = inner.credentials.get_mut(node_id) else {
            return false;
        };
        let active = inner
            .validators
            .get(&issued.validator_id)
            .map_or(false, Validator::is_active);
        if !active || !digest_eq(&issued.api_key_hash, &secret_digest(api_key.as_bytes())) {
            return false;
        }
        issued.last_seen = Some(unix_millis());
        trace!(node_id, validator = %issued.validator_id, "node authenticated");
        true
    }

    /// Approved validators whose node has not authenticated within
    /// `max_idle`. A node that never authenticated counts from issuance.
    pub fn stale_nodes(&self, max_idle: Duration) -> Vec<ValidatorId> {
        let cutoff = unix_millis().saturating_sub(max_idle.as_millis() as u64);
        let inner = self.inner.read();
        let mut stale: Vec<_> = inner
            .credentials
            .values()
            .filter(|issued| {
                inner
                    .validators
                    .get(&issued.validator_id)
                    .map_or(false, Validator::is_active)
            })
            .filter(|issued| issued.last_seen.unwrap_or(issued.issued_at) < cutoff)
            .map(|issued| issued.validator_id.clone())
            .collect();
        stale.sort();
        stale
    }

    /// Verify a message hash signed with a node's key
    pub fn verify_node_signature(&self, node_id: &str, message: &H256, signature: &Signature) -> bool {
        let inner = self.inner.read();
        let Some(issued) = inner.credentials.get(node_id) else {
            return false;
        };
        let active = inner
            .validators
            .get(&issued.validator_id)
            .map_or(false, Validator::is_active);
        if !active {
            return false;
        }
        match PublicKey::from_hex(&issued.public_key) {
            Ok(key) => key.verify_prehash(message, signature),
            Err(_) => false,
        }
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Copy of all registry state
    pub fn snapshot(&self) -> RegistrySnapshot {
        let inner = self.inner.read();
        RegistrySnapshot {
            validators: inner.validators.values().cloned().collect(),
            delegations: inner
                .delegations
                .iter()
                .map(|((v, d), amount)| Delegation {
                    delegator: *d,
                    validator: v.clone(),
                    amount: *amount,
                })
                .collect(),
            deployments: inner.deployments.values().cloned().collect(),
            credentials: {
                let mut creds: Vec<_> = inner.credentials.values().cloned().collect();
                creds.sort_by_key(|c| c.deployment_id);
                creds
            },
            next_deployment_id: inner.next_deployment_id,
        }
    }
}
