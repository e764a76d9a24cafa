//! Public chain client trait.
//!
//! The ledger never assumes synchronous finality from the public chain;
//! every call is fallible and may be slow, so callers wrap it in a timeout.

use async_trait::async_trait;
use l2core_types::Amount;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by a public chain client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// The endpoint could not be reached.
    #[error("chain unavailable: {0}")]
    Unavailable(String),

    /// The call did not complete in time.
    #[error("chain call timed out after {0}ms")]
    Timeout(u64),

    /// The chain rejected the request.
    #[error("rejected by chain: {0}")]
    Rejected(String),

    /// The account is not known to the chain.
    #[error("unknown account: {0}")]
    UnknownAccount(String),
}

/// Result type for public chain operations.
pub type ChainResult<T> = Result<T, ChainError>;

/// A signed transfer destined for the public chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalTransfer {
    /// Source account on the public chain
    pub from: String,
    /// Destination account on the public chain
    pub to: String,
    /// Amount in the chain's smallest unit
    pub amount: Amount,
    /// Hex-encoded signature produced by the sender's wallet
    pub signature: String,
}

/// Client for the external public chain.
#[async_trait]
pub trait PublicChainClient: Send + Sync {
    /// Fetch the balance of an account on the public chain.
    async fn get_balance(&self, account: &str) -> ChainResult<Amount>;

    /// Broadcast a signed transfer, returning the external transaction id.
    async fn broadcast_transfer(&self, transfer: ExternalTransfer) -> ChainResult<String>;
}
