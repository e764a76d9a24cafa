//! Vote collection.
//!
//! The engine asks a [`VoteCollector`] for one vote per validator in the
//! snapshot. The in-process [`LocalVoteCollector`] votes by simulating the
//! candidate against the ledger; a networked collector would ask the
//! validator nodes themselves.

use std::sync::Arc;

use async_trait::async_trait;
use l2core_ledger::Ledger;
use l2core_types::{Amount, SignedTransaction, ValidatorId};
use tracing::trace;

use crate::types::Vote;

/// Source of validator votes
#[async_trait]
pub trait VoteCollector: Send + Sync {
    /// Vote of `validator` on the surviving candidate transactions
    async fn collect_vote(
        &self,
        validator: &ValidatorId,
        stake: Amount,
        candidate: &[SignedTransaction],
    ) -> Vote;
}

/// Votes locally: approve when every transaction passes simulation
pub struct LocalVoteCollector {
    ledger: Arc<Ledger>,
}

impl LocalVoteCollector {
    /// Collector simulating against `ledger`
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl VoteCollector for LocalVoteCollector {
    async fn collect_vote(
        &self,
        validator: &ValidatorId,
        stake: Amount,
        candidate: &[SignedTransaction],
    ) -> Vote {
        let approve = self.ledger.simulate(candidate).iter().all(Result::is_ok);
        trace!(validator = %validator, stake, approve, "local vote");
        if approve {
            Vote::Approve
        } else {
            Vote::Reject
        }
    }
}
