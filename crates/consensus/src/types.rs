//! Core types for the block cycle.

use std::fmt;
use std::time::{Duration, Instant};

use l2core_ledger::ExecutionError;
use l2core_mempool::PendingTransaction;
use l2core_types::{Amount, BlockRecord, SignedTransaction, H256};
use serde::{Deserialize, Serialize};

/// Basis points in one whole
pub const BPS_SCALE: u32 = 10_000;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct ConsensusConfig {
    /// Time between cycles
    pub block_interval: Duration,
    /// Required approving share of stake, in basis points
    pub threshold_bps: u32,
}

impl ConsensusConfig {
    /// Configuration from a fractional threshold such as `0.67`.
    ///
    /// A threshold that is not a whole number of basis points is rounded
    /// up, so the commit rule is never looser than the fraction given.
    pub fn new(block_interval: Duration, threshold: f64) -> Self {
        Self {
            block_interval,
            threshold_bps: threshold_to_bps(threshold),
        }
    }
}

/// Largest distance from a whole basis point still read as float noise
const BPS_EPSILON: f64 = 1e-9;

/// Convert a fraction to basis points, rounding up anything that is not
/// already a whole basis point.
pub fn threshold_to_bps(threshold: f64) -> u32 {
    let scaled = threshold * f64::from(BPS_SCALE);
    let nearest = scaled.round();
    let bps = if (scaled - nearest).abs() <= BPS_EPSILON {
        nearest
    } else {
        scaled.ceil()
    };
    bps.clamp(0.0, f64::from(BPS_SCALE)) as u32
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self::new(Duration::from_millis(3000), 0.67)
    }
}

/// Phase of the block cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Waiting for the next tick
    #[default]
    Idle,
    /// Draining the pool into a candidate
    Collecting,
    /// Pre-checking the candidate and tallying stake
    Voting,
    /// Applying transactions and recording the block
    Committing,
}

impl Phase {
    /// Returns true if this phase can move to `target`
    #[must_use]
    pub fn can_transition_to(&self, target: Phase) -> bool {
        matches!(
            (self, target),
            (Phase::Idle, Phase::Collecting)
                | (Phase::Collecting, Phase::Voting)
                | (Phase::Voting, Phase::Committing)
                | (Phase::Committing, Phase::Idle)
                // Empty pool
                | (Phase::Collecting, Phase::Idle)
                // Shortfall, or nothing survived the pre-check
                | (Phase::Voting, Phase::Idle)
        )
    }

    /// All phases reachable from this one
    #[must_use]
    pub fn valid_transitions(&self) -> &'static [Phase] {
        match self {
            Phase::Idle => &[Phase::Collecting],
            Phase::Collecting => &[Phase::Voting, Phase::Idle],
            Phase::Voting => &[Phase::Committing, Phase::Idle],
            Phase::Committing => &[Phase::Idle],
        }
    }

    /// A cycle is in progress
    #[must_use]
    pub fn is_busy(&self) -> bool {
        !matches!(self, Phase::Idle)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::Collecting => write!(f, "collecting"),
            Phase::Voting => write!(f, "voting"),
            Phase::Committing => write!(f, "committing"),
        }
    }
}

/// A validator's decision on a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vote {
    /// Every transaction passes
    Approve,
    /// At least one transaction fails, or no answer
    Reject,
}

impl Vote {
    /// Whether the vote counts toward approving stake
    pub fn is_approve(&self) -> bool {
        matches!(self, Vote::Approve)
    }
}

/// The transactions drained for one cycle.
///
/// Fixed at creation; exclusions produce a new, smaller candidate.
#[derive(Debug, Clone)]
pub struct BlockCandidate {
    entries: Vec<PendingTransaction>,
    created_at: Instant,
}

impl BlockCandidate {
    /// Candidate over drained entries, kept in submission order
    pub fn new(mut entries: Vec<PendingTransaction>) -> Self {
        entries.sort_by_key(|e| e.seq);
        Self {
            entries,
            created_at: Instant::now(),
        }
    }

    /// Pending entries, in submission order
    pub fn entries(&self) -> &[PendingTransaction] {
        &self.entries
    }

    /// Signed transactions, in submission order
    pub fn transactions(&self) -> Vec<SignedTransaction> {
        self.entries.iter().map(|e| e.tx.clone()).collect()
    }

    /// Transaction hashes, in submission order
    pub fn hashes(&self) -> Vec<H256> {
        self.entries.iter().map(PendingTransaction::hash).collect()
    }

    /// Number of transactions
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No transactions
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Time since the pool was drained
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Keep only the entries `keep` accepts, as a new candidate
    pub fn retain(self, mut keep: impl FnMut(&PendingTransaction) -> bool) -> Self {
        Self {
            entries: self.entries.into_iter().filter(|e| keep(e)).collect(),
            created_at: self.created_at,
        }
    }

    /// Give up ownership of the entries
    pub fn into_entries(self) -> Vec<PendingTransaction> {
        self.entries
    }
}

/// A transaction dropped from a cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exclusion {
    /// Dropped transaction
    pub tx_hash: H256,
    /// Why it was dropped
    pub reason: ExecutionError,
}

/// Result of one cycle
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// Pool was empty; no block
    Empty,
    /// Every candidate transaction failed the pre-check; no block
    AllExcluded {
        /// Dropped transactions
        excluded: Vec<Exclusion>,
    },
    /// Approving stake fell short; survivors went back to the pool
    Shortfall {
        /// Approving share of total stake
        ratio: f64,
        /// Stake that approved
        approving_stake: Amount,
        /// Stake in the snapshot
        total_stake: Amount,
        /// Transactions returned to the pool
        requeued: usize,
        /// Transactions dropped by the pre-check
        excluded: Vec<Exclusion>,
    },
    /// The vote passed but every survivor failed during application; no
    /// block was recorded
    NothingApplied {
        /// Transactions dropped by the pre-check
        excluded: Vec<Exclusion>,
        /// Transactions that failed during application
        failed: Vec<Exclusion>,
    },
    /// A block was committed
    Committed {
        /// The recorded block
        block: BlockRecord,
        /// Transactions dropped by the pre-check
        excluded: Vec<Exclusion>,
        /// Transactions that failed during application
        failed: Vec<Exclusion>,
    },
}

impl CycleOutcome {
    /// The committed block, if any
    pub fn block(&self) -> Option<&BlockRecord> {
        match self {
            CycleOutcome::Committed { block, .. } => Some(block),
            _ => None,
        }
    }

    /// Transactions dropped by the pre-check
    pub fn excluded(&self) -> &[Exclusion] {
        match self {
            CycleOutcome::Empty => &[],
            CycleOutcome::AllExcluded { excluded }
            | CycleOutcome::Shortfall { excluded, .. }
            | CycleOutcome::NothingApplied { excluded, .. }
            | CycleOutcome::Committed { excluded, .. } => excluded,
        }
    }

    /// Transactions that failed during application
    pub fn failed(&self) -> &[Exclusion] {
        match self {
            CycleOutcome::NothingApplied { failed, .. } | CycleOutcome::Committed { failed, .. } => {
                failed
            }
            _ => &[],
        }
    }

    /// Short label for logs
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Empty => "empty",
            CycleOutcome::AllExcluded { .. } => "all_excluded",
            CycleOutcome::Shortfall { .. } => "shortfall",
            CycleOutcome::NothingApplied { .. } => "nothing_applied",
            CycleOutcome::Committed { .. } => "committed",
        }
    }
}

/// Engine counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Latest committed block number
    pub height: u64,
    /// Current phase
    pub phase: Phase,
    /// Cycles run
    pub cycles: u64,
    /// Cycles that found the pool empty
    pub empty_cycles: u64,
    /// Cycles that ended on a stake shortfall
    pub shortfalls: u64,
    /// Blocks committed
    pub blocks_committed: u64,
    /// Transactions with receipts
    pub transactions_committed: u64,
    /// Transactions dropped by the pre-check
    pub transactions_excluded: u64,
    /// Transactions that failed during application
    pub transactions_failed: u64,
}
