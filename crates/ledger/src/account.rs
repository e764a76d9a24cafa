//! Account state.

use l2core_types::Amount;
use serde::{Deserialize, Serialize};

/// Balance of one account and the part of it bonded as stake
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    /// Total balance, including locked stake
    pub balance: Amount,
    /// Bonded as self stake or delegation
    pub locked: Amount,
}

impl AccountState {
    /// Account holding `balance` with nothing locked
    pub fn with_balance(balance: Amount) -> Self {
        Self { balance, locked: 0 }
    }

    /// Balance that can be transferred or newly bonded
    pub fn spendable(&self) -> Amount {
        self.balance.saturating_sub(self.locked)
    }

    /// No balance and no locks
    pub fn is_empty(&self) -> bool {
        self.balance == 0 && self.locked == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spendable_excludes_locked() {
        let state = AccountState {
            balance: 1_000,
            locked: 400,
        };
        assert_eq!(state.spendable(), 600);
        assert_eq!(AccountState::with_balance(5).spendable(), 5);
        assert!(AccountState::default().is_empty());
    }
}
