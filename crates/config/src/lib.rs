//! # L2 Core Configuration
//!
//! Configuration parsing and genesis handling for an L2 Core node.
//!
//! All node settings live in one `l2core.toml` file. Every section has
//! defaults, so a file only needs the values it overrides.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use l2core_config::Config;
//! use std::path::Path;
//!
//! let config = Config::load(Path::new("l2core.toml"))?;
//! println!("Block interval: {}ms", config.consensus.block_interval_ms);
//! println!("Threshold: {} bps", config.consensus.threshold_bps());
//! ```
//!
//! ## Configuration Sections
//!
//! - `[chain]` - Ledger identity (chain_id, name, token symbol)
//! - `[consensus]` - Block cadence and commit threshold
//! - `[mempool]` - Pending pool capacity and transaction TTL
//! - `[registry]` - Minimum stake requirement and admin accounts
//! - `[chain_client]` - Public chain collaborator endpoint and timeout
//! - `[storage]` - Data directory and persistence switch
//! - `[logging]` - Log level and format
//! - `[[genesis.accounts]]` - Initial account balances
//! - `[[genesis.validators]]` - Initial approved validators

mod config;
mod error;
mod genesis;

pub use config::*;
pub use error::*;
pub use genesis::*;
