//! Transaction intake.

use std::sync::Arc;

use l2core_types::{RawTransaction, SignedTransaction, H256};
use tracing::{debug, warn};

use crate::pool::{InsertOutcome, PendingPool};
use crate::validation::{check_signed, parse_raw};
use crate::Result;

/// Entry point for new transactions.
///
/// Validates syntax, computes the canonical hash and enqueues. Only insert is
/// reachable through here; draining the pool belongs to the consensus engine.
#[derive(Clone)]
pub struct Intake {
    pool: Arc<PendingPool>,
}

impl Intake {
    /// Create an intake feeding `pool`
    pub fn new(pool: Arc<PendingPool>) -> Self {
        Self { pool }
    }

    /// Validate and enqueue an untyped submission.
    ///
    /// Resubmitting a transaction that is already pending returns its hash
    /// and leaves the pool unchanged.
    pub fn submit(&self, raw: RawTransaction) -> Result<H256> {
        match parse_raw(&raw) {
            Ok(tx) => self.enqueue(tx),
            Err(e) => {
                debug!(error = %e, kind = ?raw.kind, "rejected submission");
                Err(e)
            }
        }
    }

    /// Validate and enqueue a typed transaction.
    pub fn submit_signed(&self, tx: SignedTransaction) -> Result<H256> {
        if let Err(e) = check_signed(&tx) {
            debug!(error = %e, tx_hash = %tx.hash(), "rejected submission");
            return Err(e);
        }
        self.enqueue(tx)
    }

    fn enqueue(&self, tx: SignedTransaction) -> Result<H256> {
        let hash = tx.hash();
        let kind = tx.kind();
        match self.pool.insert(tx) {
            Ok(InsertOutcome::Inserted) => {
                debug!(tx_hash = %hash, kind = %kind, "transaction submitted");
            }
            Ok(InsertOutcome::AlreadyPending) => {
                debug!(tx_hash = %hash, "duplicate submission ignored");
            }
            Ok(InsertOutcome::Replaced) => {
                debug!(tx_hash = %hash, kind = %kind, "transaction resubmitted with valid signature");
            }
            Err(e) => {
                warn!(tx_hash = %hash, error = %e, "pending pool full");
                return Err(e);
            }
        }
        Ok(hash)
    }

    /// Whether `hash` is pending
    pub fn is_pending(&self, hash: &H256) -> bool {
        self.pool.contains(hash)
    }

    /// Number of pending transactions
    pub fn pending_count(&self) -> usize {
        self.pool.len()
    }
}
