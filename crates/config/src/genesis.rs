//! Genesis configuration
//!
//! Initial balances and the initial approved validator set. Genesis
//! validators bond their self-stake from the owner's genesis balance, so the
//! owner must hold at least the sum of the stakes it bonds.

use crate::error::{ConfigError, ConfigResult};
use l2core_types::{AccountId, Amount, ValidatorId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info};

/// Genesis configuration containing initial state.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenesisConfig {
    /// Initial accounts with balances
    #[serde(default)]
    pub accounts: Vec<GenesisAccount>,

    /// Initial validators, approved from the first block
    #[serde(default)]
    pub validators: Vec<GenesisValidator>,
}

/// A genesis account balance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenesisAccount {
    /// Account as 0x-prefixed hex
    pub address: String,
    /// Balance in smallest unit, as string
    pub balance: String,
}

/// A genesis validator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenesisValidator {
    /// Validator identifier
    pub id: String,
    /// Owning account as 0x-prefixed hex
    pub owner: String,
    /// Self-stake in smallest unit, as string
    pub self_stake: String,
}

/// Parsed genesis state, ready to seed the ledger and registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenesisState {
    /// Account balances
    pub accounts: Vec<(AccountId, Amount)>,
    /// Validators as `(id, owner, self_stake)`
    pub validators: Vec<(ValidatorId, AccountId, Amount)>,
}

impl GenesisAccount {
    /// Parse into typed values.
    pub fn parse(&self) -> ConfigResult<(AccountId, Amount)> {
        let account = self
            .address
            .parse::<AccountId>()
            .map_err(|_| ConfigError::InvalidAccount(self.address.clone()))?;
        if account.is_zero() {
            return Err(ConfigError::InvalidAccount(self.address.clone()));
        }
        let balance = self
            .balance
            .parse::<Amount>()
            .map_err(|_| ConfigError::InvalidBalance(self.balance.clone()))?;
        Ok((account, balance))
    }
}

impl GenesisValidator {
    /// Parse into typed values.
    pub fn parse(&self) -> ConfigResult<(ValidatorId, AccountId, Amount)> {
        let id = ValidatorId::new(self.id.clone())
            .map_err(|e| ConfigError::InvalidValidatorId(e.to_string()))?;
        let owner = self
            .owner
            .parse::<AccountId>()
            .map_err(|_| ConfigError::InvalidAccount(self.owner.clone()))?;
        let stake = self
            .self_stake
            .parse::<Amount>()
            .map_err(|_| ConfigError::InvalidBalance(self.self_stake.clone()))?;
        Ok((id, owner, stake))
    }
}

impl GenesisConfig {
    /// Load genesis configuration from a JSON file.
    pub fn load_json(path: &Path) -> ConfigResult<Self> {
        info!("Loading genesis from JSON file: {:?}", path);

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        let genesis: GenesisConfig = serde_json::from_str(&content)?;
        genesis.validate()?;
        Ok(genesis)
    }

    /// Save genesis configuration to a JSON file.
    pub fn save_json(&self, path: &Path) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ConfigError::FileWrite {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(())
    }

    /// Validate the genesis configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        self.parse().map(|_| ())
    }

    /// Parse and cross-check the genesis configuration.
    pub fn parse(&self) -> ConfigResult<GenesisState> {
        let mut state = GenesisState::default();

        let mut seen_accounts = HashSet::new();
        let mut balances: HashMap<AccountId, Amount> = HashMap::new();
        for entry in &self.accounts {
            let (account, balance) = entry.parse()?;
            if !seen_accounts.insert(account) {
                return Err(ConfigError::DuplicateAccount(entry.address.clone()));
            }
            balances.insert(account, balance);
            state.accounts.push((account, balance));
        }

        let mut seen_validators = HashSet::new();
        let mut seen_owners = HashSet::new();
        let mut bonded: HashMap<AccountId, Amount> = HashMap::new();
        for entry in &self.validators {
            let (id, owner, stake) = entry.parse()?;
            if !seen_validators.insert(id.clone()) || !seen_owners.insert(owner) {
                return Err(ConfigError::DuplicateValidator(entry.id.clone()));
            }

            let total = bonded.entry(owner).or_insert(0);
            *total = total.saturating_add(stake);
            let balance = balances.get(&owner).copied().unwrap_or(0);
            if *total > balance {
                return Err(ConfigError::UncoveredStake {
                    id: entry.id.clone(),
                    owner: entry.owner.clone(),
                    stake: entry.self_stake.clone(),
                    balance: balance.to_string(),
                });
            }
            state.validators.push((id, owner, stake));
        }

        debug!(
            accounts = state.accounts.len(),
            validators = state.validators.len(),
            "Genesis validation passed"
        );

        Ok(state)
    }

    /// Sum of all genesis balances.
    pub fn total_supply(&self) -> ConfigResult<Amount> {
        Ok(self
            .parse()?
            .accounts
            .iter()
            .fold(0u128, |acc, (_, b)| acc.saturating_add(*b)))
    }
}
