//! Configuration error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration loading and validation
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("Failed to read config file at {path}: {source}")]
    FileRead {
        /// Path that failed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to write configuration file
    #[error("Failed to write config file at {path}: {source}")]
    FileWrite {
        /// Path that failed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML configuration
    #[error("Failed to parse TOML config: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Failed to serialize TOML configuration
    #[error("Failed to serialize TOML config: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Failed to parse JSON (genesis)
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Invalid chain ID (must be non-zero)
    #[error("Invalid chain ID: chain_id must be non-zero")]
    InvalidChainId,

    /// Invalid block interval
    #[error("Invalid block interval: must be at least 100ms, got {0}ms")]
    InvalidBlockInterval(u64),

    /// Invalid consensus threshold
    #[error("Invalid consensus threshold: must be in (0.0, 1.0], got {0}")]
    InvalidThreshold(f64),

    /// Consensus threshold is finer than one basis point
    #[error("Invalid consensus threshold: {0} is not a whole number of basis points")]
    InexactThreshold(f64),

    /// Invalid timeout configuration
    #[error("Invalid timeout: {name} must be positive, got {value}ms")]
    InvalidTimeout {
        /// Setting name
        name: &'static str,
        /// Offending value
        value: u64,
    },

    /// Invalid mempool capacity
    #[error("Invalid mempool size: max_size must be non-zero")]
    InvalidPoolSize,

    /// Invalid account format
    #[error("Invalid account format: {0}")]
    InvalidAccount(String),

    /// Invalid validator id format
    #[error("Invalid validator id: {0}")]
    InvalidValidatorId(String),

    /// Invalid balance string
    #[error("Invalid balance value: {0}")]
    InvalidBalance(String),

    /// Duplicate genesis account
    #[error("Duplicate genesis account: {0}")]
    DuplicateAccount(String),

    /// Duplicate genesis validator
    #[error("Duplicate genesis validator: {0}")]
    DuplicateValidator(String),

    /// Genesis validator stake not covered by its owner's balance
    #[error("Genesis validator {id} stakes {stake} but owner {owner} only holds {balance}")]
    UncoveredStake {
        /// Validator id
        id: String,
        /// Owning account
        owner: String,
        /// Configured self-stake
        stake: String,
        /// Owner's genesis balance
        balance: String,
    },

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Invalid log level
    #[error("Invalid log level: {0}. Valid values: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    /// Invalid log format
    #[error("Invalid log format: {0}. Valid values: text, json, compact")]
    InvalidLogFormat(String),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;
