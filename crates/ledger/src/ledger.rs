//! The ledger.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use l2core_registry::{
    AccountStateProvider, Registry, RegistrySnapshot, ReleasedStake, StakeLocks,
};
use l2core_types::{AccountId, Amount, DeploymentId, Receipt, SignedTransaction, ValidatorId, H256};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::account::AccountState;
use crate::pending::{PendingState, RegistryEffect};
use crate::{ExecutionError, Result};

/// Persisted ledger state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSnapshot {
    /// Every known account
    pub accounts: Vec<(AccountId, AccountState)>,
    /// Every receipt, in block order
    pub receipts: Vec<Receipt>,
}

#[derive(Default)]
struct LedgerInner {
    accounts: BTreeMap<AccountId, AccountState>,
    receipts: HashMap<H256, Receipt>,
}

impl LedgerInner {
    fn snapshot(&self) -> LedgerSnapshot {
        let mut receipts: Vec<Receipt> = self.receipts.values().cloned().collect();
        receipts.sort_by(|a, b| {
            a.block_number
                .cmp(&b.block_number)
                .then_with(|| a.tx_hash.cmp(&b.tx_hash))
        });
        LedgerSnapshot {
            accounts: self.accounts.iter().map(|(k, v)| (*k, *v)).collect(),
            receipts,
        }
    }

    fn balance(&self, account: &AccountId) -> Amount {
        self.accounts.get(account).map_or(0, |a| a.balance)
    }
}

impl StakeLocks for LedgerInner {
    fn release(&mut self, released: &ReleasedStake) {
        let owner = released.owner.iter().copied();
        for (account, amount) in owner.chain(released.delegations.iter().copied()) {
            if let Some(state) = self.accounts.get_mut(&account) {
                state.locked = state.locked.saturating_sub(amount);
            }
        }
    }
}

/// Account balances and receipts.
///
/// [`Ledger::apply`] is the single-writer path for balances.
pub struct Ledger {
    inner: RwLock<LedgerInner>,
    registry: Arc<Registry>,
}

impl Ledger {
    /// Create an empty ledger bound to a registry
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            inner: RwLock::new(LedgerInner::default()),
            registry,
        }
    }

    /// Rebuild from persisted state
    pub fn from_snapshot(registry: Arc<Registry>, snapshot: LedgerSnapshot) -> Self {
        let inner = LedgerInner {
            accounts: snapshot.accounts.into_iter().collect(),
            receipts: snapshot
                .receipts
                .into_iter()
                .map(|r| (r.tx_hash, r))
                .collect(),
        };
        Self {
            inner: RwLock::new(inner),
            registry,
        }
    }

    /// The registry this ledger executes against
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    // ------------------------------------------------------------------
    // Genesis
    // ------------------------------------------------------------------

    /// Credit an account at genesis
    pub fn credit_genesis(&self, account: AccountId, amount: Amount) -> Result<()> {
        let mut inner = self.inner.write();
        let state = inner.accounts.entry(account).or_default();
        state.balance = state
            .balance
            .checked_add(amount)
            .ok_or(ExecutionError::Overflow)?;
        debug!(account = %account, amount, "genesis credit");
        Ok(())
    }

    /// Seed an approved genesis validator, locking its self stake
    pub fn seed_genesis_validator(
        &self,
        id: ValidatorId,
        owner: AccountId,
        self_stake: Amount,
    ) -> Result<()> {
        let mut inner = self.inner.write();
        let mut state = inner.accounts.get(&owner).copied().unwrap_or_default();
        let available = state.spendable();
        if available < self_stake {
            return Err(ExecutionError::InsufficientBalance {
                required: self_stake,
                available,
            });
        }
        state.locked = state
            .locked
            .checked_add(self_stake)
            .ok_or(ExecutionError::Overflow)?;

        self.registry.seed_genesis_validator(id, owner, self_stake)?;
        inner.accounts.insert(owner, state);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    /// Apply one transaction in `block_number`.
    ///
    /// Either every effect lands, including the registry update, or none
    /// does. A hash that already has a receipt is rejected with
    /// [`ExecutionError::AlreadyApplied`].
    pub fn apply(&self, tx: &SignedTransaction, block_number: u64) -> Result<Receipt> {
        let hash = tx.hash();
        let mut inner = self.inner.write();

        if inner.receipts.contains_key(&hash) {
            return Err(ExecutionError::AlreadyApplied(hash));
        }
        if !tx.verify() {
            return Err(ExecutionError::InvalidSignature);
        }

        let mut pending = PendingState::new(&inner.accounts);
        let staged = pending.stage(tx, &self.registry)?;
        let changes = pending.into_changes();

        match &staged.effect {
            RegistryEffect::None => {}
            RegistryEffect::Delegate { validator, amount } => {
                self.registry
                    .add_delegation(tx.sender(), validator, *amount)
                    .map_err(|e| ExecutionError::delegation_target(validator, e))?;
            }
            RegistryEffect::Register {
                validator,
                self_stake,
                balance,
            } => {
                self.registry
                    .upsert_registration(tx.sender(), validator, *self_stake, *balance)?;
            }
        }

        inner.accounts.extend(changes);
        let receipt = Receipt {
            tx_hash: hash,
            block_number,
            kind: tx.kind(),
            balances: staged
                .touched
                .iter()
                .map(|account| (*account, inner.balance(account)))
                .collect(),
        };
        inner.receipts.insert(hash, receipt.clone());

        debug!(
            tx_hash = %hash,
            block_number,
            kind = %tx.kind(),
            sender = %tx.sender(),
            "transaction applied"
        );
        Ok(receipt)
    }

    /// Check a batch in order without mutating anything.
    ///
    /// Each transaction sees the effects of the earlier ones that passed.
    pub fn simulate(&self, txs: &[SignedTransaction]) -> Vec<Result<()>> {
        let inner = self.inner.read();
        let mut pending = PendingState::new(&inner.accounts);
        let mut seen = HashSet::with_capacity(txs.len());

        txs.iter()
            .map(|tx| {
                let hash = tx.hash();
                if inner.receipts.contains_key(&hash) || !seen.insert(hash) {
                    return Err(ExecutionError::AlreadyApplied(hash));
                }
                if !tx.verify() {
                    return Err(ExecutionError::InvalidSignature);
                }
                pending.stage(tx, &self.registry).map(|_| ())
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Registry decisions that release stake
    // ------------------------------------------------------------------

    /// Revoke a validator and unlock everything bonded to it
    pub fn revoke_validator(
        &self,
        validator_id: &ValidatorId,
        reason: impl Into<String>,
        authority: &AccountId,
    ) -> Result<ReleasedStake> {
        let mut inner = self.inner.write();
        let released = self
            .registry
            .revoke(validator_id, reason, authority, &mut *inner)?;
        info!(
            validator_id = %validator_id,
            delegations = released.delegations.len(),
            "stake released after revocation"
        );
        Ok(released)
    }

    /// Reject a deployment and unlock any stake bonded to its validator
    pub fn reject_deployment(
        &self,
        id: DeploymentId,
        approver: &AccountId,
        reason: impl Into<String>,
    ) -> Result<ReleasedStake> {
        let mut inner = self.inner.write();
        let released = self
            .registry
            .reject_deployment(id, approver, reason, &mut *inner)?;
        if !released.is_empty() {
            warn!(deployment_id = %id, "stake released after rejection");
        }
        Ok(released)
    }

    /// Withdraw part or all of a delegation and unlock the amount.
    ///
    /// Returns what remains delegated.
    pub fn undelegate(
        &self,
        delegator: &AccountId,
        validator: &ValidatorId,
        amount: Amount,
    ) -> Result<Amount> {
        let mut inner = self.inner.write();
        let remaining = self
            .registry
            .undelegate(delegator, validator, amount, &mut *inner)?;
        debug!(delegator = %delegator, validator = %validator, amount, remaining, "stake undelegated");
        Ok(remaining)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Total balance of an account
    pub fn balance(&self, account: &AccountId) -> Amount {
        self.inner.read().balance(account)
    }

    /// Balance minus locked stake
    pub fn spendable(&self, account: &AccountId) -> Amount {
        self.account(account).spendable()
    }

    /// Locked stake of an account
    pub fn locked(&self, account: &AccountId) -> Amount {
        self.account(account).locked
    }

    /// Full state of an account
    pub fn account(&self, account: &AccountId) -> AccountState {
        self.inner
            .read()
            .accounts
            .get(account)
            .copied()
            .unwrap_or_default()
    }

    /// Receipt of an applied transaction
    pub fn receipt(&self, hash: &H256) -> Option<Receipt> {
        self.inner.read().receipts.get(hash).cloned()
    }

    /// Whether a transaction has been applied
    pub fn has_receipt(&self, hash: &H256) -> bool {
        self.inner.read().receipts.contains_key(hash)
    }

    /// Number of applied transactions
    pub fn receipt_count(&self) -> usize {
        self.inner.read().receipts.len()
    }

    /// Sum of all balances
    pub fn total_supply(&self) -> Amount {
        self.inner
            .read()
            .accounts
            .values()
            .fold(0u128, |acc, a| acc.saturating_add(a.balance))
    }

    /// Copy of all ledger state
    pub fn snapshot(&self) -> LedgerSnapshot {
        self.inner.read().snapshot()
    }

    /// Ledger and registry state as one consistent pair.
    ///
    /// Every registry change that moves stake goes through the ledger write
    /// lock, so holding the read lock keeps both sides in step.
    pub fn snapshot_with_registry(&self) -> (LedgerSnapshot, RegistrySnapshot) {
        let inner = self.inner.read();
        (inner.snapshot(), self.registry.snapshot())
    }
}

impl AccountStateProvider for Ledger {
    fn balance(&self, account: &AccountId) -> Amount {
        Ledger::balance(self, account)
    }
}
