//! Stake tally for one cycle.
//!
//! Votes are counted against the validator snapshot taken when the cycle
//! entered voting. A validator outside the snapshot cannot vote, and each
//! validator votes at most once.

use std::collections::HashMap;

use l2core_registry::ValidatorSnapshot;
use l2core_types::{Amount, ValidatorId};
use tracing::{debug, trace};

use crate::types::{Vote, BPS_SCALE};

/// Error types for tallying
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VoteError {
    /// Validator already voted this cycle
    #[error("duplicate vote from validator {0}")]
    DuplicateVote(ValidatorId),

    /// Validator is not in the snapshot
    #[error("validator {0} is not in the voting snapshot")]
    UnknownValidator(ValidatorId),
}

/// Commit rule: `approving / total >= threshold_bps / 10_000`, compared in
/// integers. Zero total stake never commits.
pub fn meets_threshold(approving: Amount, total: Amount, threshold_bps: u32) -> bool {
    total > 0
        && approving.saturating_mul(u128::from(BPS_SCALE))
            >= total.saturating_mul(u128::from(threshold_bps))
}

/// Votes collected against one snapshot
#[derive(Debug, Clone)]
pub struct StakeTally {
    snapshot: ValidatorSnapshot,
    votes: HashMap<ValidatorId, Vote>,
    approving_stake: Amount,
    rejecting_stake: Amount,
}

impl StakeTally {
    /// Empty tally over `snapshot`
    pub fn new(snapshot: ValidatorSnapshot) -> Self {
        Self {
            snapshot,
            votes: HashMap::new(),
            approving_stake: 0,
            rejecting_stake: 0,
        }
    }

    /// Record one validator's vote
    pub fn add_vote(&mut self, validator: ValidatorId, vote: Vote) -> Result<(), VoteError> {
        if self.votes.contains_key(&validator) {
            return Err(VoteError::DuplicateVote(validator));
        }
        let stake = self
            .snapshot
            .stake_of(&validator)
            .ok_or_else(|| VoteError::UnknownValidator(validator.clone()))?;

        trace!(validator = %validator, stake, vote = ?vote, "adding vote");
        if vote.is_approve() {
            self.approving_stake = self.approving_stake.saturating_add(stake);
        } else {
            self.rejecting_stake = self.rejecting_stake.saturating_add(stake);
        }
        self.votes.insert(validator, vote);
        Ok(())
    }

    /// Snapshot the tally counts against
    pub fn snapshot(&self) -> &ValidatorSnapshot {
        &self.snapshot
    }

    /// Stake that approved
    pub fn approving_stake(&self) -> Amount {
        self.approving_stake
    }

    /// Stake that rejected
    pub fn rejecting_stake(&self) -> Amount {
        self.rejecting_stake
    }

    /// Stake in the snapshot
    pub fn total_stake(&self) -> Amount {
        self.snapshot.total_stake
    }

    /// Number of votes recorded
    pub fn vote_count(&self) -> usize {
        self.votes.len()
    }

    /// Vote of one validator
    pub fn vote_of(&self, validator: &ValidatorId) -> Option<Vote> {
        self.votes.get(validator).copied()
    }

    /// Approving share of total stake, for logging
    pub fn ratio(&self) -> f64 {
        if self.snapshot.total_stake == 0 {
            return 0.0;
        }
        self.approving_stake as f64 / self.snapshot.total_stake as f64
    }

    /// Whether approving stake meets the threshold
    pub fn meets_threshold(&self, threshold_bps: u32) -> bool {
        let reached = meets_threshold(self.approving_stake, self.snapshot.total_stake, threshold_bps);
        if reached {
            debug!(
                approving = self.approving_stake,
                total = self.snapshot.total_stake,
                threshold_bps,
                "stake threshold reached"
            );
        }
        reached
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vid(s: &str) -> ValidatorId {
        ValidatorId::new(s).unwrap()
    }

    fn snapshot(stakes: &[(&str, Amount)]) -> ValidatorSnapshot {
        ValidatorSnapshot::new(stakes.iter().map(|(id, s)| (vid(id), *s)).collect())
    }

    #[test]
    fn test_threshold_boundary() {
        assert!(meets_threshold(67, 100, 6_700));
        assert!(!meets_threshold(66, 100, 6_700));
        assert!(meets_threshold(100, 100, 10_000));
        assert!(!meets_threshold(0, 0, 0));
        assert!(meets_threshold(0, 100, 0));
        // 2/3 is below 0.67
        assert!(!meets_threshold(2, 3, 6_700));
        assert!(meets_threshold(2, 3, 6_666));
    }

    #[test]
    fn test_tally_counts_snapshot_stake() {
        let mut tally = StakeTally::new(snapshot(&[("alpha", 30), ("beta", 70)]));
        tally.add_vote(vid("alpha"), Vote::Approve).unwrap();
        tally.add_vote(vid("beta"), Vote::Reject).unwrap();

        assert_eq!(tally.approving_stake(), 30);
        assert_eq!(tally.rejecting_stake(), 70);
        assert_eq!(tally.total_stake(), 100);
        assert!((tally.ratio() - 0.3).abs() < f64::EPSILON);
        assert!(!tally.meets_threshold(6_700));
    }

    #[test]
    fn test_duplicate_and_unknown_votes() {
        let mut tally = StakeTally::new(snapshot(&[("alpha", 10)]));
        tally.add_vote(vid("alpha"), Vote::Approve).unwrap();

        assert_eq!(
            tally.add_vote(vid("alpha"), Vote::Approve),
            Err(VoteError::DuplicateVote(vid("alpha")))
        );
        assert_eq!(
            tally.add_vote(vid("ghost"), Vote::Approve),
            Err(VoteError::UnknownValidator(vid("ghost")))
        );
        assert_eq!(tally.approving_stake(), 10);
        assert_eq!(tally.vote_count(), 1);
    }

    #[test]
    fn test_zero_stake_never_commits() {
        let mut tally = StakeTally::new(snapshot(&[("alpha", 0)]));
        tally.add_vote(vid("alpha"), Vote::Approve).unwrap();
        assert!(!tally.meets_threshold(0));
        assert_eq!(tally.ratio(), 0.0);
    }
}
