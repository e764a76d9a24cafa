//! L2 Core Storage Layer
//!
//! Persists the node's logical state between runs:
//!
//! - **Snapshot**: ledger accounts and receipts, registry validators,
//!   delegations, deployments and credential records, committed blocks
//! - **File store**: one JSON document at `<data_dir>/state.json`, replaced
//!   atomically (temp file in the same directory, then rename)
//!
//! Every stored document carries a Keccak-256 digest of its snapshot, checked
//! on load. Secret credential material is never part of a snapshot.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod snapshot;
pub mod store;

pub use snapshot::{NodeSnapshot, StoredState, SNAPSHOT_VERSION};
pub use store::{FileStore, STATE_FILE_NAME};

use l2core_types::H256;
use thiserror::Error;

/// Storage error types
#[derive(Error, Debug)]
pub enum StorageError {
    /// Filesystem failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Stored digest does not match the snapshot
    #[error("state file corrupted: expected digest {expected}, computed {actual}")]
    Corrupted {
        /// Digest recorded in the file
        expected: H256,
        /// Digest of the decoded snapshot
        actual: H256,
    },

    /// File written by an incompatible version
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;
