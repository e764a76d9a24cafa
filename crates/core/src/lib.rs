//! # L2 Core - Collaborator Abstractions
//!
//! Traits for the systems the ledger talks to but does not own.
//!
//! - **Public chain**: balance lookups and transfer broadcast on the
//!   external chain the ledger sits above
//!
//! Implementations are `Send + Sync` and async, so a node can hold one behind
//! an `Arc<dyn PublicChainClient>` and call it without holding any lock.
//!
//! # Example
//!
//! ```
//! use l2core_core::{MockPublicChain, PublicChainClient};
//!
//! # async fn demo() {
//! let chain = MockPublicChain::new();
//! chain.set_balance("0xabc", 500);
//! assert_eq!(chain.get_balance("0xabc").await.unwrap(), 500);
//! # }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod traits;

pub use traits::{ChainError, ChainResult, ExternalTransfer, MockPublicChain, PublicChainClient};
