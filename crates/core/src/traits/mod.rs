//! Collaborator traits.
//!
//! Other crates depend on these traits rather than concrete clients so the
//! node can run against a real chain endpoint or the in-memory mock.

mod chain;
mod mock;

pub use chain::*;
pub use mock::*;
