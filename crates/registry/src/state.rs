//! Account state the registry reads and the stake locks it releases.

use std::collections::HashMap;

use l2core_types::{AccountId, Amount};
use parking_lot::RwLock;

use crate::types::ReleasedStake;

/// Account state the registry consults when gating deployment requests.
///
/// Implemented by the ledger. The registry never holds its own lock while
/// calling this.
pub trait AccountStateProvider: Send + Sync {
    /// Total balance of an account, including locked stake
    fn balance(&self, account: &AccountId) -> Amount;
}

/// Holder of the stake locks behind validators and delegations.
///
/// Every registry operation that drops bonded stake takes one of these and
/// releases through it before the registry lock is let go, so a delegation
/// never disappears while its lock stays in place. The ledger implements it
/// on its already-locked state.
pub trait StakeLocks {
    /// Unlock the given amounts
    fn release(&mut self, released: &ReleasedStake);
}

/// In-memory balances and locks for tests and tooling
#[derive(Default)]
pub struct MockAccountState {
    balances: RwLock<HashMap<AccountId, Amount>>,
    locked: RwLock<HashMap<AccountId, Amount>>,
}

impl MockAccountState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the balance for an account
    pub fn set_balance(&self, account: AccountId, balance: Amount) {
        self.balances.write().insert(account, balance);
    }

    /// Add to the locked amount of an account
    pub fn lock(&self, account: AccountId, amount: Amount) {
        let mut locked = self.locked.write();
        let entry = locked.entry(account).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    /// Locked amount of an account
    pub fn locked(&self, account: &AccountId) -> Amount {
        self.locked.read().get(account).copied().unwrap_or(0)
    }
}

impl AccountStateProvider for MockAccountState {
    fn balance(&self, account: &AccountId) -> Amount {
        self.balances.read().get(account).copied().unwrap_or(0)
    }
}

impl StakeLocks for MockAccountState {
    fn release(&mut self, released: &ReleasedStake) {
        let locked = self.locked.get_mut();
        let owner = released.owner.iter().copied();
        for (account, amount) in owner.chain(released.delegations.iter().copied()) {
            if let Some(current) = locked.get_mut(&account) {
                *current = current.saturating_sub(amount);
            }
        }
    }
}
