//! Tests for Config module

use l2core_config::{
    ChainClientConfig, ChainConfig, Config, ConfigError, ConsensusConfig, LoggingConfig,
    MempoolConfig, RegistryConfig, StorageConfig,
};

#[test]
fn test_default_config() {
    let config = Config::default();
    assert_eq!(config.chain.chain_id, 1);
    assert_eq!(config.consensus.block_interval_ms, 3000);
    assert_eq!(config.consensus.consensus_threshold, 0.67);
    assert_eq!(config.registry.min_stake_requirement_u128(), 1000);
    assert!(config.storage.persist);
    config.validate().unwrap();
}

#[test]
fn test_threshold_bps_rounding() {
    let mut config = ConsensusConfig::default();
    assert_eq!(config.threshold_bps(), 6700);
    config.consensus_threshold = 2.0 / 3.0;
    assert_eq!(config.threshold_bps(), 6667);
    config.consensus_threshold = 1.0;
    assert_eq!(config.threshold_bps(), 10_000);
    // Finer than a basis point rounds up
    config.consensus_threshold = 0.66664;
    assert_eq!(config.threshold_bps(), 6667);
}

#[test]
fn test_threshold_must_be_whole_basis_points() {
    let mut config = ConsensusConfig {
        consensus_threshold: 0.6667,
        ..Default::default()
    };
    config.validate().unwrap();

    config.consensus_threshold = 0.66664;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InexactThreshold(_))
    ));
    config.consensus_threshold = 2.0 / 3.0;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InexactThreshold(_))
    ));
}

#[test]
fn test_invalid_chain_id() {
    let config = ChainConfig {
        chain_id: 0,
        ..Default::default()
    };
    assert!(matches!(config.validate(), Err(ConfigError::InvalidChainId)));
}

#[test]
fn test_invalid_block_interval() {
    let config = ConsensusConfig {
        block_interval_ms: 50,
        ..Default::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidBlockInterval(50))
    ));
}

#[test]
fn test_invalid_threshold() {
    for bad in [0.0, -0.5, 1.01, f64::NAN] {
        let config = ConsensusConfig {
            consensus_threshold: bad,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidThreshold(_))));
    }
}

#[test]
fn test_invalid_mempool() {
    let config = MempoolConfig {
        max_size: 0,
        ..Default::default()
    };
    assert!(matches!(config.validate(), Err(ConfigError::InvalidPoolSize)));
}

#[test]
fn test_invalid_registry() {
    let config = RegistryConfig {
        min_stake_requirement: "lots".into(),
        ..Default::default()
    };
    assert!(matches!(config.validate(), Err(ConfigError::InvalidBalance(_))));

    let config = RegistryConfig {
        admins: vec!["not-an-account".into()],
        ..Default::default()
    };
    assert!(matches!(config.validate(), Err(ConfigError::InvalidAccount(_))));
}

#[test]
fn test_invalid_chain_client_timeout() {
    let config = ChainClientConfig {
        timeout_ms: 0,
        ..Default::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidTimeout { .. })
    ));
}

#[test]
fn test_invalid_storage_and_logging() {
    let storage = StorageConfig {
        data_dir: String::new(),
        ..Default::default()
    };
    assert!(matches!(storage.validate(), Err(ConfigError::MissingField(_))));

    let logging = LoggingConfig {
        format: "xml".into(),
        ..Default::default()
    };
    assert!(matches!(logging.validate(), Err(ConfigError::InvalidLogFormat(_))));

    let logging = LoggingConfig {
        level: "loud".into(),
        ..Default::default()
    };
    assert!(matches!(logging.validate(), Err(ConfigError::InvalidLogLevel(_))));
}

#[test]
fn test_partial_toml_uses_defaults() {
    let config = Config::from_str(
        r#"
        [consensus]
        block_interval_ms = 500

        [registry]
        admins = ["0x742d35cc6634c0532925a3b844bc9e7595f0beb1"]
        "#,
    )
    .unwrap();
    assert_eq!(config.consensus.block_interval_ms, 500);
    assert_eq!(config.consensus.consensus_threshold, 0.67);
    assert_eq!(config.registry.admin_accounts().unwrap().len(), 1);
    assert_eq!(config.mempool.max_size, 10_000);
}

#[test]
fn test_save_and_load_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("l2core.toml");

    let mut config = Config::default();
    config.chain.chain_name = "testnet".into();
    config.consensus.block_interval_ms = 250;
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.chain.chain_name, "testnet");
    assert_eq!(loaded.consensus.block_interval_ms, 250);
}

#[test]
fn test_load_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        Config::load(&dir.path().join("absent.toml")),
        Err(ConfigError::FileRead { .. })
    ));
}

#[test]
fn test_malformed_toml() {
    assert!(matches!(
        Config::from_str("[consensus\nblock_interval_ms = 1"),
        Err(ConfigError::TomlParse(_))
    ));
}
