//! # L2 Core
//!
//! A permissioned ledger above a public chain. Validators stake tokens,
//! transactions are batched into blocks and committed once approving stake
//! meets the configured threshold.
//!
//! This crate wires the components into a [`Node`] and provides the `l2core`
//! binary.
//!
//! ## Components
//!
//! - **Intake** ([`l2core_mempool`]): validates submissions into the pending pool
//! - **Registry** ([`l2core_registry`]): validators, deployments, credentials
//! - **Ledger** ([`l2core_ledger`]): balances, stake locks, receipts
//! - **Consensus** ([`l2core_consensus`]): the block cycle
//! - **Storage** ([`l2core_storage`]): state snapshot between runs
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use l2core::Node;
//! use l2core_config::Config;
//! use l2core_core::MockPublicChain;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(Path::new("l2core.toml"))?;
//!     let node = Node::new(config, Arc::new(MockPublicChain::new()))?;
//!     node.run().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod node;

pub use node::{Node, NodeEvent, NodeInfo, NodeState};

use l2core_config::ConfigError;
use l2core_core::ChainError;
use l2core_ledger::ExecutionError;
use l2core_mempool::IntakeError;
use l2core_registry::RegistryError;
use l2core_storage::StorageError;
use thiserror::Error;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "l2core.toml";

/// Default keystore directory
pub const DEFAULT_KEYSTORE_DIR: &str = "./keystore";

/// Errors surfaced by node operations
#[derive(Error, Debug)]
pub enum NodeError {
    /// Invalid configuration or genesis
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Submission rejected at intake
    #[error(transparent)]
    Intake(#[from] IntakeError),

    /// Registry operation failed
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Ledger operation failed
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// State could not be loaded or saved
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Public chain call failed
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// Background save task panicked or was cancelled
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Persisted blocks do not form a valid chain
    #[error("persisted block history is inconsistent")]
    BrokenChain,
}

/// Result type for node operations
pub type Result<T> = std::result::Result<T, NodeError>;
