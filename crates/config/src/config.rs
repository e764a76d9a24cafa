//! Main configuration module for L2 Core
//!
//! All node settings are defined in one `l2core.toml` file.

use crate::error::{ConfigError, ConfigResult};
use crate::genesis::GenesisConfig;
use l2core_types::{AccountId, Amount};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Basis points in one whole
const BPS_SCALE: f64 = 10_000.0;

/// Largest distance from a whole basis point still read as float noise
const BPS_EPSILON: f64 = 1e-9;

/// Main configuration struct containing all L2 Core settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Ledger identity
    pub chain: ChainConfig,

    /// Block cycle parameters
    pub consensus: ConsensusConfig,

    /// Pending pool parameters
    pub mempool: MempoolConfig,

    /// Validator registry parameters
    pub registry: RegistryConfig,

    /// Public chain collaborator settings
    pub chain_client: ChainClientConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Genesis configuration (accounts and validators)
    pub genesis: GenesisConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use l2core_config::Config;
    /// use std::path::Path;
    ///
    /// let config = Config::load(Path::new("l2core.toml"))?;
    /// ```
    pub fn load(path: &Path) -> ConfigResult<Self> {
        info!("Loading configuration from {:?}", path);

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content)?;

        debug!("Configuration parsed successfully, validating...");
        config.validate()?;

        info!(
            chain_id = config.chain.chain_id,
            chain_name = %config.chain.chain_name,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Load configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> ConfigResult<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Checks that all values are within acceptable ranges and that
    /// the genesis state is internally consistent.
    pub fn validate(&self) -> ConfigResult<()> {
        self.chain.validate()?;
        self.consensus.validate()?;
        self.mempool.validate()?;
        self.registry.validate()?;
        self.chain_client.validate()?;
        self.storage.validate()?;
        self.logging.validate()?;
        self.genesis.validate()?;

        debug!("Configuration validation passed");
        Ok(())
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ConfigError::FileWrite {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(())
    }
}

// =============================================================================
// Chain Configuration
// =============================================================================

/// Ledger identity configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Unique chain identifier
    pub chain_id: u64,

    /// Human-readable chain name
    pub chain_name: String,

    /// Native token symbol
    pub token_symbol: String,
}

impl ChainConfig {
    /// Validate the chain section.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.chain_id == 0 {
            return Err(ConfigError::InvalidChainId);
        }
        Ok(())
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            chain_name: "L2 Core Local".to_string(),
            token_symbol: "L2C".to_string(),
        }
    }
}

// =============================================================================
// Consensus Configuration
// =============================================================================

/// Block cycle parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Interval between block cycles in milliseconds
    pub block_interval_ms: u64,

    /// Minimum fraction of active stake that must approve a block
    pub consensus_threshold: f64,
}

impl ConsensusConfig {
    /// Validate the consensus section.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.block_interval_ms < 100 {
            return Err(ConfigError::InvalidBlockInterval(self.block_interval_ms));
        }
        if !(self.consensus_threshold > 0.0 && self.consensus_threshold <= 1.0) {
            return Err(ConfigError::InvalidThreshold(self.consensus_threshold));
        }
        let scaled = self.consensus_threshold * BPS_SCALE;
        if (scaled - scaled.round()).abs() > BPS_EPSILON {
            return Err(ConfigError::InexactThreshold(self.consensus_threshold));
        }
        Ok(())
    }

    /// Block interval as a [`Duration`].
    pub fn block_interval(&self) -> Duration {
        Duration::from_millis(self.block_interval_ms)
    }

    /// Threshold in basis points. Anything finer than a basis point is
    /// rounded up, never down.
    pub fn threshold_bps(&self) -> u32 {
        let scaled = self.consensus_threshold * BPS_SCALE;
        let bps = if (scaled - scaled.round()).abs() <= BPS_EPSILON {
            scaled.round()
        } else {
            scaled.ceil()
        };
        bps.clamp(0.0, BPS_SCALE) as u32
    }
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            block_interval_ms: 3000,
            consensus_threshold: 0.67,
        }
    }
}

// =============================================================================
// Mempool Configuration
// =============================================================================

/// Pending pool parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MempoolConfig {
    /// Maximum number of pending transactions
    pub max_size: usize,

    /// Transaction time-to-live in seconds
    pub ttl_seconds: u64,
}

impl MempoolConfig {
    /// Validate the mempool section.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_size == 0 {
            return Err(ConfigError::InvalidPoolSize);
        }
        if self.ttl_seconds == 0 {
            return Err(ConfigError::InvalidTimeout {
                name: "mempool.ttl_seconds",
                value: 0,
            });
        }
        Ok(())
    }

    /// Transaction TTL as a [`Duration`].
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            max_size: 10_000,
            ttl_seconds: 3600,
        }
    }
}

// =============================================================================
// Registry Configuration
// =============================================================================

/// Validator registry parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Minimum balance to request a node deployment (smallest unit, as string)
    pub min_stake_requirement: String,

    /// Accounts allowed to approve, reject and revoke
    pub admins: Vec<String>,
}

impl RegistryConfig {
    /// Validate the registry section.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.min_stake_requirement.parse::<Amount>().is_err() {
            return Err(ConfigError::InvalidBalance(
                self.min_stake_requirement.clone(),
            ));
        }
        self.admin_accounts()?;
        Ok(())
    }

    /// Minimum stake requirement as an integer amount.
    pub fn min_stake_requirement_u128(&self) -> Amount {
        self.min_stake_requirement.parse().unwrap_or(0)
    }

    /// Parsed admin accounts.
    pub fn admin_accounts(&self) -> ConfigResult<Vec<AccountId>> {
        self.admins
            .iter()
            .map(|a| a.parse().map_err(|_| ConfigError::InvalidAccount(a.clone())))
            .collect()
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            min_stake_requirement: "1000".to_string(),
            admins: Vec::new(),
        }
    }
}

// =============================================================================
// Public Chain Client Configuration
// =============================================================================

/// Settings for the external public chain collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainClientConfig {
    /// Endpoint of the public chain node
    pub endpoint: String,

    /// Per-call timeout in milliseconds
    pub timeout_ms: u64,
}

impl ChainClientConfig {
    /// Validate the chain client section.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout {
                name: "chain_client.timeout_ms",
                value: 0,
            });
        }
        Ok(())
    }

    /// Call timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ChainClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8545".to_string(),
            timeout_ms: 5000,
        }
    }
}

// =============================================================================
// Storage Configuration
// =============================================================================

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Data directory path
    pub data_dir: String,

    /// Write a state snapshot after each committed block and on shutdown
    pub persist: bool,
}

impl StorageConfig {
    /// Validate the storage section.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.data_dir.is_empty() {
            return Err(ConfigError::MissingField("storage.data_dir"));
        }
        Ok(())
    }

    /// Data directory as a path.
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            persist: true,
        }
    }
}

// =============================================================================
// Logging Configuration
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json, compact)
    pub format: String,
}

impl LoggingConfig {
    /// Validate the logging section.
    pub fn validate(&self) -> ConfigResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.level.clone()));
        }

        let valid_formats = ["text", "json", "compact"];
        if !valid_formats.contains(&self.format.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogFormat(self.format.clone()));
        }

        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}
