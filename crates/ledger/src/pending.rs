//! Pending state over committed accounts.
//!
//! Staging a transaction checks its preconditions and records the resulting
//! account states here without touching the committed map. A failed stage
//! leaves the pending state as it was, so a batch can be checked in order
//! with earlier effects visible to later transactions.

use std::collections::{BTreeMap, HashMap};

use l2core_registry::{Registry, RegistryError};
use l2core_types::{AccountId, Amount, SignedTransaction, TxPayload, ValidatorId};

use crate::account::AccountState;
use crate::{ExecutionError, Result};

/// Registry mutation a staged transaction still needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RegistryEffect {
    None,
    Delegate {
        validator: ValidatorId,
        amount: Amount,
    },
    Register {
        validator: ValidatorId,
        self_stake: Amount,
        balance: Amount,
    },
}

/// Outcome of staging one transaction
pub(crate) struct Staged {
    /// Accounts whose balance the receipt reports
    pub touched: Vec<AccountId>,
    pub effect: RegistryEffect,
}

pub(crate) struct PendingState<'a> {
    base: &'a BTreeMap<AccountId, AccountState>,
    pending: BTreeMap<AccountId, AccountState>,
    /// Registrations staged earlier in the batch: owner -> (validator, self stake)
    registrations: HashMap<AccountId, (ValidatorId, Amount)>,
}

impl<'a> PendingState<'a> {
    pub fn new(base: &'a BTreeMap<AccountId, AccountState>) -> Self {
        Self {
            base,
            pending: BTreeMap::new(),
            registrations: HashMap::new(),
        }
    }

    pub fn account(&self, id: &AccountId) -> AccountState {
        self.pending
            .get(id)
            .or_else(|| self.base.get(id))
            .copied()
            .unwrap_or_default()
    }

    fn registers(&self, validator: &ValidatorId) -> bool {
        self.registrations.values().any(|(v, _)| v == validator)
    }

    /// Check one transaction and record its effects
    pub fn stage(&mut self, tx: &SignedTransaction, registry: &Registry) -> Result<Staged> {
        let sender = tx.sender();
        let mut from = self.account(&sender);

        match tx.payload() {
            TxPayload::Transfer { to, amount } => {
                let available = from.spendable();
                if available < *amount {
                    return Err(ExecutionError::InsufficientBalance {
                        required: *amount,
                        available,
                    });
                }
                from.balance -= *amount;

                let mut dest = if *to == sender { from } else { self.account(to) };
                dest.balance = dest
                    .balance
                    .checked_add(*amount)
                    .ok_or(ExecutionError::Overflow)?;

                self.pending.insert(sender, from);
                self.pending.insert(*to, dest);
                Ok(Staged {
                    touched: vec![sender, *to],
                    effect: RegistryEffect::None,
                })
            }

            TxPayload::Delegate { validator, amount } => {
                let available = from.spendable();
                if available < *amount {
                    return Err(ExecutionError::InsufficientBalance {
                        required: *amount,
                        available,
                    });
                }
                if !self.registers(validator) {
                    registry
                        .check_delegation_target(validator)
                        .map_err(|e| ExecutionError::delegation_target(validator, e))?;
                }
                from.locked = from
                    .locked
                    .checked_add(*amount)
                    .ok_or(ExecutionError::Overflow)?;

                self.pending.insert(sender, from);
                Ok(Staged {
                    touched: vec![sender],
                    effect: RegistryEffect::Delegate {
                        validator: validator.clone(),
                        amount: *amount,
                    },
                })
            }

            TxPayload::RegisterValidator {
                validator,
                self_stake,
            } => {
                let previous = match self.registrations.get(&sender) {
                    Some((staged, stake)) if staged == validator => *stake,
                    Some((staged, _)) => {
                        return Err(RegistryError::OwnerMismatch {
                            account: sender,
                            validator: staged.clone(),
                        }
                        .into())
                    }
                    None => registry
                        .check_registration(&sender, validator, from.balance)?
                        .unwrap_or(0),
                };

                if *self_stake > previous {
                    let delta = *self_stake - previous;
                    let available = from.spendable();
                    if available < delta {
                        return Err(ExecutionError::InsufficientBalance {
                            required: delta,
                            available,
                        });
                    }
                    from.locked = from.locked.checked_add(delta).ok_or(ExecutionError::Overflow)?;
                } else {
                    from.locked = from.locked.saturating_sub(previous - *self_stake);
                }

                let balance = from.balance;
                self.pending.insert(sender, from);
                self.registrations
                    .insert(sender, (validator.clone(), *self_stake));
                Ok(Staged {
                    touched: vec![sender],
                    effect: RegistryEffect::Register {
                        validator: validator.clone(),
                        self_stake: *self_stake,
                        balance,
                    },
                })
            }
        }
    }

    /// Account states changed by staged transactions
    pub fn into_changes(self) -> BTreeMap<AccountId, AccountState> {
        self.pending
    }
}
