//! # L2 Core Consensus
//!
//! Stake-weighted block cycle for the permissioned ledger.
//!
//! Each cycle drains the pending pool into one candidate, pre-checks every
//! transaction against simulated ledger state, collects one vote per
//! approved validator and commits when the approving share of stake meets
//! the configured threshold.
//!
//! ## Cycle Flow
//!
//! ```text
//! ┌──────────────┐
//! │  COLLECTING  │  drain whole pool into an immutable candidate
//! │              │  empty pool ──────────────────────────► IDLE
//! └──────┬───────┘
//!        │
//!        ▼
//! ┌──────────────┐
//! │    VOTING    │  snapshot approved validators and their stake
//! │              │  simulate candidate; drop failing transactions
//! │              │  one vote per validator via VoteCollector
//! │              │  approving * 10_000 < total * threshold_bps
//! │              │      requeue survivors ───────────────► IDLE
//! └──────┬───────┘
//!        │
//!        ▼
//! ┌──────────────┐
//! │  COMMITTING  │  apply survivors in submission order
//! │              │  nothing applied ─────────────────────► IDLE
//! │              │  record and broadcast the block ──────► IDLE
//! └──────────────┘
//! ```
//!
//! Cycles never overlap. Read queries never wait for a running cycle.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod collector;
pub mod engine;
pub mod types;
pub mod vote_set;

pub use collector::{LocalVoteCollector, VoteCollector};
pub use engine::{ConsensusEngine, CycleObserver};
pub use types::{
    threshold_to_bps, BlockCandidate, ConsensusConfig, CycleOutcome, EngineStats, Exclusion,
    Phase, Vote,
};
pub use vote_set::{meets_threshold, StakeTally, VoteError};
