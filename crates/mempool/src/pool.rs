//! Pending transaction pool.
//!
//! An ordered, hash-deduplicated set of transactions awaiting a block cycle:
//! - Submission order is kept by a monotonically increasing sequence number
//! - `drain` hands the whole pool to the consensus engine in one step
//! - `requeue` returns undecided transactions under their original sequence
//!   numbers, so they stay ahead of anything submitted later
//! - TTL-based expiration
//!
//! The dedup key is the canonical hash, which does not cover the signature.
//! A pending entry whose signature does not verify gives way to a
//! resubmission of the same transaction whose signature does, so a forged
//! copy submitted first cannot hold the slot.
//!
//! A single `RwLock` guards all state. Insert and drain both take the write
//! lock, so a transaction is either in the drained batch or still in the
//! pool, never both and never neither.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use l2core_types::{SignedTransaction, H256};
use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use crate::{IntakeError, Result};

/// Pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of transactions in the pool
    pub max_size: usize,
    /// Time-to-live for pending transactions
    pub ttl: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 10_000,
            ttl: Duration::from_secs(3600),
        }
    }
}

/// Pending transaction with metadata
#[derive(Debug, Clone)]
pub struct PendingTransaction {
    /// The signed transaction
    pub tx: SignedTransaction,
    /// Submission sequence number
    pub seq: u64,
    /// Time when the transaction was first received
    pub received_at: Instant,
}

impl PendingTransaction {
    /// Check if the transaction has expired
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.received_at.elapsed() > ttl
    }

    /// Get the transaction hash
    pub fn hash(&self) -> H256 {
        self.tx.hash()
    }
}

/// Result of an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The transaction was added
    Inserted,
    /// A transaction with the same hash was already pending
    AlreadyPending,
    /// A pending entry with an invalid signature was replaced by a valid one
    Replaced,
}

/// Internal pool state
#[derive(Default)]
struct PoolInner {
    /// All transactions by hash
    by_hash: HashMap<H256, PendingTransaction>,
    /// Hashes in submission order
    by_seq: BTreeMap<u64, H256>,
    /// Next sequence number to hand out
    next_seq: u64,
}

impl PoolInner {
    fn insert_entry(&mut self, entry: PendingTransaction) {
        self.by_seq.insert(entry.seq, entry.hash());
        self.by_hash.insert(entry.hash(), entry);
    }

    fn remove_entry(&mut self, hash: &H256) -> Option<PendingTransaction> {
        let entry = self.by_hash.remove(hash)?;
        self.by_seq.remove(&entry.seq);
        Some(entry)
    }
}

/// Submission-ordered pool of pending transactions.
pub struct PendingPool {
    inner: RwLock<PoolInner>,
    config: PoolConfig,
}

impl PendingPool {
    /// Create an empty pool
    pub fn new(config: PoolConfig) -> Self {
        Self {
            inner: RwLock::new(PoolInner::default()),
            config,
        }
    }

    /// Pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Add a transaction.
    ///
    /// A hash that is already pending is left untouched and reported as
    /// [`InsertOutcome::AlreadyPending`], unless the pending copy carries a
    /// different signature that fails verification and the new one passes.
    /// The replacement keeps the original sequence number.
    pub fn insert(&self, tx: SignedTransaction) -> Result<InsertOutcome> {
        let hash = tx.hash();
        let mut inner = self.inner.write();

        if let Some(existing) = inner.by_hash.get_mut(&hash) {
            if existing.tx.signature != tx.signature && !existing.tx.verify() && tx.verify() {
                warn!(tx_hash = %hash, seq = existing.seq, "replaced pending transaction with invalid signature");
                existing.tx = tx;
                return Ok(InsertOutcome::Replaced);
            }
            trace!(tx_hash = %hash, "transaction already pending");
            return Ok(InsertOutcome::AlreadyPending);
        }
        if inner.by_hash.len() >= self.config.max_size {
            return Err(IntakeError::PoolFull {
                capacity: self.config.max_size,
            });
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.insert_entry(PendingTransaction {
            tx,
            seq,
            received_at: Instant::now(),
        });

        debug!(tx_hash = %hash, seq, pending = inner.by_hash.len(), "transaction added to pool");
        Ok(InsertOutcome::Inserted)
    }

    /// Check whether a hash is pending
    pub fn contains(&self, hash: &H256) -> bool {
        self.inner.read().by_hash.contains_key(hash)
    }

    /// Get a pending transaction by hash
    pub fn get(&self, hash: &H256) -> Option<SignedTransaction> {
        self.inner.read().by_hash.get(hash).map(|e| e.tx.clone())
    }

    /// Number of pending transactions
    pub fn len(&self) -> usize {
        self.inner.read().by_hash.len()
    }

    /// Whether the pool is empty
    pub fn is_empty(&self) -> bool {
        self.inner.read().by_hash.is_empty()
    }

    /// Remove and return every pending transaction in submission order.
    pub fn drain(&self) -> Vec<PendingTransaction> {
        let mut inner = self.inner.write();
        let order = std::mem::take(&mut inner.by_seq);
        let mut by_hash = std::mem::take(&mut inner.by_hash);
        let drained: Vec<_> = order
            .into_values()
            .filter_map(|hash| by_hash.remove(&hash))
            .collect();

        if !drained.is_empty() {
            debug!(count = drained.len(), "drained pending pool");
        }
        drained
    }

    /// Return drained transactions to the pool.
    ///
    /// Entries keep their original sequence numbers and received time, so
    /// they sort ahead of later submissions in their original relative order.
    /// Capacity is not enforced here; nothing handed back is dropped. If the
    /// same hash was resubmitted while the batch was out, the older entry wins.
    pub fn requeue(&self, entries: Vec<PendingTransaction>) {
        if entries.is_empty() {
            return;
        }
        let mut inner = self.inner.write();
        let count = entries.len();
        for entry in entries {
            inner.remove_entry(&entry.hash());
            inner.insert_entry(entry);
        }
        debug!(count, pending = inner.by_hash.len(), "requeued transactions");
    }

    /// Remove a transaction by hash
    pub fn remove(&self, hash: &H256) -> Option<SignedTransaction> {
        self.inner.write().remove_entry(hash).map(|e| e.tx)
    }

    /// Remove transactions older than `ttl`, returning their hashes.
    pub fn remove_expired(&self, ttl: Duration) -> Vec<H256> {
        let mut inner = self.inner.write();

        let expired: Vec<H256> = inner
            .by_hash
            .values()
            .filter(|e| e.is_expired(ttl))
            .map(|e| e.hash())
            .collect();

        for hash in &expired {
            inner.remove_entry(hash);
        }

        if !expired.is_empty() {
            debug!(count = expired.len(), "removed expired transactions");
        }
        expired
    }

    /// Remove transactions older than the configured TTL.
    pub fn prune(&self) -> Vec<H256> {
        self.remove_expired(self.config.ttl)
    }

    /// Pool statistics
    pub fn stats(&self) -> PoolStats {
        let inner = self.inner.read();
        PoolStats {
            pending_count: inner.by_hash.len(),
            capacity: self.config.max_size,
            next_seq: inner.next_seq,
            oldest_age: inner
                .by_seq
                .values()
                .next()
                .and_then(|h| inner.by_hash.get(h))
                .map(|e| e.received_at.elapsed()),
        }
    }

    /// Pending hashes in submission order
    pub fn hashes(&self) -> Vec<H256> {
        self.inner.read().by_seq.values().copied().collect()
    }
}

/// Pool statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of pending transactions
    pub pending_count: usize,
    /// Configured capacity
    pub capacity: usize,
    /// Total sequence numbers handed out so far
    pub next_seq: u64,
    /// Age of the oldest pending transaction
    pub oldest_age: Option<Duration>,
}
