//! Tests for genesis configuration

use l2core_config::{Config, ConfigError, GenesisAccount, GenesisConfig, GenesisValidator};

const ALICE: &str = "0x742d35cc6634c0532925a3b844bc9e7595f0beb1";
const BOB: &str = "0x0000000000000000000000000000000000000b0b";

fn account(address: &str, balance: &str) -> GenesisAccount {
    GenesisAccount {
        address: address.into(),
        balance: balance.into(),
    }
}

fn validator(id: &str, owner: &str, stake: &str) -> GenesisValidator {
    GenesisValidator {
        id: id.into(),
        owner: owner.into(),
        self_stake: stake.into(),
    }
}

#[test]
fn test_genesis_parse() {
    let genesis = GenesisConfig {
        accounts: vec![account(ALICE, "5000"), account(BOB, "100")],
        validators: vec![validator("val-alice", ALICE, "2000")],
    };
    let state = genesis.parse().unwrap();
    assert_eq!(state.accounts.len(), 2);
    assert_eq!(state.validators[0].0.as_str(), "val-alice");
    assert_eq!(state.validators[0].2, 2000);
    assert_eq!(genesis.total_supply().unwrap(), 5100);
}

#[test]
fn test_genesis_duplicate_account() {
    let genesis = GenesisConfig {
        accounts: vec![account(ALICE, "1"), account(&ALICE.to_uppercase().replace("0X", "0x"), "2")],
        validators: vec![],
    };
    assert!(matches!(
        genesis.validate(),
        Err(ConfigError::DuplicateAccount(_))
    ));
}

#[test]
fn test_genesis_duplicate_validator() {
    let genesis = GenesisConfig {
        accounts: vec![account(ALICE, "5000"), account(BOB, "5000")],
        validators: vec![validator("val-a", ALICE, "1"), validator("val-a", BOB, "1")],
    };
    assert!(matches!(
        genesis.validate(),
        Err(ConfigError::DuplicateValidator(_))
    ));
}

#[test]
fn test_genesis_stake_must_be_covered() {
    let genesis = GenesisConfig {
        accounts: vec![account(ALICE, "100")],
        validators: vec![validator("val-a", ALICE, "101")],
    };
    assert!(matches!(
        genesis.validate(),
        Err(ConfigError::UncoveredStake { .. })
    ));
}

#[test]
fn test_genesis_invalid_fields() {
    let bad_balance = GenesisConfig {
        accounts: vec![account(ALICE, "-1")],
        validators: vec![],
    };
    assert!(matches!(
        bad_balance.validate(),
        Err(ConfigError::InvalidBalance(_))
    ));

    let bad_id = GenesisConfig {
        accounts: vec![account(ALICE, "100")],
        validators: vec![validator("Bad Id", ALICE, "1")],
    };
    assert!(matches!(
        bad_id.validate(),
        Err(ConfigError::InvalidValidatorId(_))
    ));
}

#[test]
fn test_genesis_in_toml() {
    let config = Config::from_str(&format!(
        r#"
        [[genesis.accounts]]
        address = "{ALICE}"
        balance = "100000"

        [[genesis.validators]]
        id = "val-alice"
        owner = "{ALICE}"
        self_stake = "60000"
        "#
    ))
    .unwrap();
    assert_eq!(config.genesis.accounts.len(), 1);
    assert_eq!(config.genesis.validators.len(), 1);
}

#[test]
fn test_genesis_json_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("genesis.json");
    let genesis = GenesisConfig {
        accounts: vec![account(ALICE, "10")],
        validators: vec![],
    };
    genesis.save_json(&path).unwrap();
    let loaded = GenesisConfig::load_json(&path).unwrap();
    assert_eq!(loaded.accounts, genesis.accounts);
}
