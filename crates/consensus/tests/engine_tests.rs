//! Block cycle tests

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use l2core_consensus::{
    meets_threshold, threshold_to_bps, ConsensusConfig, ConsensusEngine, CycleObserver,
    CycleOutcome, LocalVoteCollector, Phase, Vote, VoteCollector,
};
use l2core_crypto::PrivateKey;
use l2core_ledger::{ExecutionError, Ledger};
use l2core_mempool::{PendingPool, PoolConfig};
use l2core_registry::{Registry, RegistryConfig};
use l2core_types::{AccountId, Amount, SignedTransaction, Transaction, ValidatorId};
use parking_lot::Mutex;
use tokio::sync::watch;

fn admin() -> AccountId {
    AccountId::new([0xad; 20])
}

fn vid(s: &str) -> ValidatorId {
    ValidatorId::new(s).unwrap()
}

struct Harness {
    pool: Arc<PendingPool>,
    ledger: Arc<Ledger>,
}

impl Harness {
    fn new() -> Self {
        let registry = Arc::new(Registry::new(RegistryConfig::new(10, [admin()])));
        Self {
            pool: Arc::new(PendingPool::new(PoolConfig::default())),
            ledger: Arc::new(Ledger::new(registry)),
        }
    }

    fn funded(&self, amount: Amount) -> PrivateKey {
        let key = PrivateKey::random();
        self.ledger.credit_genesis(key.account_id(), amount).unwrap();
        key
    }

    fn validator(&self, id: &str, stake: Amount) -> AccountId {
        let owner = self.funded(stake).account_id();
        self.ledger
            .seed_genesis_validator(vid(id), owner, stake)
            .unwrap();
        owner
    }

    fn local_engine(&self) -> ConsensusEngine {
        let collector = Arc::new(LocalVoteCollector::new(self.ledger.clone()));
        self.engine(collector)
    }

    fn engine(&self, collector: Arc<dyn VoteCollector>) -> ConsensusEngine {
        self.engine_with_threshold(collector, 0.67)
    }

    fn engine_with_threshold(
        &self,
        collector: Arc<dyn VoteCollector>,
        threshold: f64,
    ) -> ConsensusEngine {
        ConsensusEngine::new(
            ConsensusConfig::new(Duration::from_millis(10), threshold),
            self.pool.clone(),
            self.ledger.clone(),
            collector,
        )
    }

    fn submit(&self, tx: SignedTransaction) {
        self.pool.insert(tx).unwrap();
    }
}

fn transfer(key: &PrivateKey, to: AccountId, amount: Amount, ts: u64) -> SignedTransaction {
    key.sign_transaction(Transaction::transfer(key.account_id(), to, amount, ts))
        .unwrap()
}

/// Rejects for a fixed set of validators, approves for the rest
struct SplitCollector {
    rejecting: HashSet<ValidatorId>,
}

#[async_trait]
impl VoteCollector for SplitCollector {
    async fn collect_vote(
        &self,
        validator: &ValidatorId,
        _stake: Amount,
        _candidate: &[SignedTransaction],
    ) -> Vote {
        if self.rejecting.contains(validator) {
            Vote::Reject
        } else {
            Vote::Approve
        }
    }
}

/// Revokes a validator while the first vote is being collected
struct RevokingCollector {
    ledger: Arc<Ledger>,
    target: ValidatorId,
}

#[async_trait]
impl VoteCollector for RevokingCollector {
    async fn collect_vote(
        &self,
        _validator: &ValidatorId,
        _stake: Amount,
        _candidate: &[SignedTransaction],
    ) -> Vote {
        if self
            .ledger
            .registry()
            .validator(&self.target)
            .is_some_and(|v| !v.is_revoked())
        {
            self.ledger
                .revoke_validator(&self.target, "misbehaving", &admin())
                .unwrap();
        }
        Vote::Approve
    }
}

/// Applies a conflicting spend straight to the ledger during the vote
struct SpendingCollector {
    ledger: Arc<Ledger>,
    spend: SignedTransaction,
}

#[async_trait]
impl VoteCollector for SpendingCollector {
    async fn collect_vote(
        &self,
        _validator: &ValidatorId,
        _stake: Amount,
        _candidate: &[SignedTransaction],
    ) -> Vote {
        if self.ledger.receipt(&self.spend.hash()).is_none() {
            self.ledger.apply(&self.spend, 0).unwrap();
        }
        Vote::Approve
    }
}

/// Records the label of every outcome it is shown
#[derive(Default)]
struct RecordingObserver {
    seen: Mutex<Vec<&'static str>>,
}

#[async_trait]
impl CycleObserver for RecordingObserver {
    async fn cycle_finished(&self, outcome: &CycleOutcome) {
        self.seen.lock().push(outcome.label());
    }
}

#[tokio::test]
async fn test_transfer_commits_with_full_stake() {
    let h = Harness::new();
    h.validator("alpha", 100);
    let alice = h.funded(100);
    let bob = PrivateKey::random().account_id();
    let engine = h.local_engine();

    let tx = transfer(&alice, bob, 40, 1);
    h.submit(tx.clone());

    let outcome = engine.run_cycle().await;
    let block = outcome.block().expect("block committed").clone();

    assert_eq!(block.number, 1);
    assert!(block.parent_hash.is_nil());
    assert_eq!(block.transactions, vec![tx.hash()]);
    assert!(block.verify_hash());
    assert_eq!(block.total_stake, 100);
    assert_eq!(block.approving_stake, 100);
    assert_eq!(h.ledger.balance(&alice.account_id()), 60);
    assert_eq!(h.ledger.balance(&bob), 40);
    assert_eq!(h.ledger.receipt_count(), 1);
    assert!(h.ledger.has_receipt(&tx.hash()));
    assert!(h.pool.is_empty());
    assert_eq!(engine.height(), 1);
    assert_eq!(engine.phase(), Phase::Idle);
}

#[tokio::test]
async fn test_overdraft_is_excluded_and_dropped() {
    let h = Harness::new();
    h.validator("alpha", 100);
    let alice = h.funded(100);
    let bob = PrivateKey::random().account_id();
    let engine = h.local_engine();

    let tx = transfer(&alice, bob, 1_000, 1);
    h.submit(tx.clone());

    let outcome = engine.run_cycle().await;
    assert!(matches!(outcome, CycleOutcome::AllExcluded { .. }));
    assert_eq!(outcome.excluded().len(), 1);
    assert_eq!(outcome.excluded()[0].tx_hash, tx.hash());
    assert_eq!(
        outcome.excluded()[0].reason,
        ExecutionError::InsufficientBalance {
            required: 1_000,
            available: 100
        }
    );

    assert_eq!(h.ledger.balance(&alice.account_id()), 100);
    assert_eq!(h.ledger.balance(&bob), 0);
    assert!(!h.ledger.has_receipt(&tx.hash()));
    assert!(!h.pool.contains(&tx.hash()));
    assert_eq!(engine.height(), 0);

    // Not retried on the next cycle
    assert!(matches!(engine.run_cycle().await, CycleOutcome::Empty));
}

#[tokio::test]
async fn test_excluded_transaction_does_not_block_others() {
    let h = Harness::new();
    h.validator("alpha", 100);
    let alice = h.funded(100);
    let bob = PrivateKey::random().account_id();
    let engine = h.local_engine();

    let bad = transfer(&alice, bob, 1_000, 1);
    let good = transfer(&alice, bob, 10, 2);
    h.submit(bad.clone());
    h.submit(good.clone());

    let outcome = engine.run_cycle().await;
    let block = outcome.block().expect("block committed");
    assert_eq!(block.transactions, vec![good.hash()]);
    assert_eq!(outcome.excluded().len(), 1);
    assert_eq!(outcome.excluded()[0].tx_hash, bad.hash());
    assert_eq!(h.ledger.balance(&bob), 10);
}

#[tokio::test]
async fn test_stake_shortfall_keeps_transaction_pending() {
    let h = Harness::new();
    h.validator("alpha", 30);
    h.validator("beta", 70);
    let alice = h.funded(100);
    let bob = PrivateKey::random().account_id();
    let engine = h.engine(Arc::new(SplitCollector {
        rejecting: [vid("beta")].into_iter().collect(),
    }));

    let tx = transfer(&alice, bob, 40, 1);
    h.submit(tx.clone());

    match engine.run_cycle().await {
        CycleOutcome::Shortfall {
            approving_stake,
            total_stake,
            requeued,
            ..
        } => {
            assert_eq!(approving_stake, 30);
            assert_eq!(total_stake, 100);
            assert_eq!(requeued, 1);
        }
        other => panic!("expected shortfall, got {}", other.label()),
    }

    assert!(h.pool.contains(&tx.hash()));
    assert!(!h.ledger.has_receipt(&tx.hash()));
    assert_eq!(h.ledger.balance(&alice.account_id()), 100);
    assert_eq!(engine.height(), 0);
    assert_eq!(engine.stats().shortfalls, 1);

    // Still pending after another failed round
    assert!(matches!(
        engine.run_cycle().await,
        CycleOutcome::Shortfall { .. }
    ));
    assert_eq!(h.pool.len(), 1);
}

#[tokio::test]
async fn test_requeued_transactions_keep_order() {
    let h = Harness::new();
    h.validator("alpha", 30);
    h.validator("beta", 70);
    let alice = h.funded(100);
    let bob = PrivateKey::random().account_id();

    let first = transfer(&alice, bob, 1, 1);
    let second = transfer(&alice, bob, 2, 2);
    h.submit(first.clone());
    h.submit(second.clone());

    let stalled = h.engine(Arc::new(SplitCollector {
        rejecting: [vid("beta")].into_iter().collect(),
    }));
    assert!(matches!(
        stalled.run_cycle().await,
        CycleOutcome::Shortfall { .. }
    ));

    let engine = h.local_engine();
    let outcome = engine.run_cycle().await;
    let block = outcome.block().expect("block committed");
    assert_eq!(block.transactions, vec![first.hash(), second.hash()]);
}

#[tokio::test]
async fn test_revocation_applies_from_next_cycle() {
    let h = Harness::new();
    h.validator("alpha", 30);
    h.validator("beta", 70);
    let alice = h.funded(100);
    let bob = PrivateKey::random().account_id();
    let engine = h.engine(Arc::new(RevokingCollector {
        ledger: h.ledger.clone(),
        target: vid("beta"),
    }));

    h.submit(transfer(&alice, bob, 1, 1));
    let first = engine.run_cycle().await;
    let first = first.block().expect("first block");
    assert_eq!(first.total_stake, 100);
    assert!(first
        .stake_snapshot
        .iter()
        .any(|(id, stake)| id == &vid("beta") && *stake == 70));
    assert!(h.ledger.registry().validator(&vid("beta")).unwrap().is_revoked());

    h.submit(transfer(&alice, bob, 2, 2));
    let second = engine.run_cycle().await;
    let second = second.block().expect("second block");
    assert_eq!(second.number, 2);
    assert_eq!(second.parent_hash, first.hash);
    assert_eq!(second.total_stake, 30);
    assert_eq!(second.stake_snapshot, vec![(vid("alpha"), 30)]);
}

#[tokio::test]
async fn test_no_validators_never_commits() {
    let h = Harness::new();
    let alice = h.funded(100);
    let engine = h.local_engine();

    let tx = transfer(&alice, PrivateKey::random().account_id(), 1, 1);
    h.submit(tx.clone());

    assert!(matches!(
        engine.run_cycle().await,
        CycleOutcome::Shortfall { total_stake: 0, .. }
    ));
    assert!(h.pool.contains(&tx.hash()));
}

#[tokio::test]
async fn test_empty_pool_produces_no_block() {
    let h = Harness::new();
    h.validator("alpha", 100);
    let engine = h.local_engine();

    assert!(matches!(engine.run_cycle().await, CycleOutcome::Empty));
    assert_eq!(engine.height(), 0);
    assert!(engine.latest_block().is_none());
    let stats = engine.stats();
    assert_eq!(stats.cycles, 1);
    assert_eq!(stats.empty_cycles, 1);
}

#[tokio::test]
async fn test_blocks_hold_invariants() {
    let h = Harness::new();
    h.validator("alpha", 40);
    h.validator("beta", 60);
    let senders: Vec<_> = (0..4).map(|_| h.funded(1_000)).collect();
    let sink = PrivateKey::random().account_id();
    let engine = h.local_engine();
    let supply = h.ledger.total_supply();
    let threshold = engine.config().threshold_bps;

    let mut submitted = Vec::new();
    for round in 0..5u64 {
        for (i, key) in senders.iter().enumerate() {
            let tx = transfer(key, sink, 10 + i as u128, round * 10 + i as u64);
            submitted.push(tx.hash());
            h.submit(tx.clone());
            // Same transaction twice in one round is a no-op
            let _ = h.pool.insert(tx);
        }
        engine.run_cycle().await;
    }

    let blocks = engine.blocks();
    assert_eq!(blocks.len(), 5);
    let mut parent = l2core_types::H256::NIL;
    let mut seen = HashSet::new();
    for block in &blocks {
        assert!(meets_threshold(block.approving_stake, block.total_stake, threshold));
        assert_eq!(block.parent_hash, parent);
        assert!(block.verify_hash());
        for hash in &block.transactions {
            assert!(seen.insert(*hash), "transaction committed twice");
        }
        parent = block.hash;
    }

    assert_eq!(seen.len(), submitted.len());
    assert_eq!(h.ledger.receipt_count(), submitted.len());
    assert_eq!(h.ledger.total_supply(), supply);
    assert_eq!(engine.stats().transactions_committed, submitted.len() as u64);
}

#[tokio::test]
async fn test_concurrent_cycles_do_not_overlap() {
    let h = Harness::new();
    h.validator("alpha", 100);
    let alice = h.funded(100);
    let bob = PrivateKey::random().account_id();
    let engine = Arc::new(h.local_engine());

    for i in 0..10 {
        h.submit(transfer(&alice, bob, 1, i));
    }

    let (a, b) = tokio::join!(engine.run_cycle(), engine.run_cycle());
    let committed: usize = [a, b]
        .iter()
        .filter_map(CycleOutcome::block)
        .map(|b| b.tx_count())
        .sum();

    assert_eq!(committed, 10);
    assert_eq!(h.ledger.receipt_count(), 10);
    assert_eq!(h.ledger.balance(&bob), 10);
    assert_eq!(engine.phase(), Phase::Idle);
}

#[tokio::test]
async fn test_subscribers_see_committed_blocks() {
    let h = Harness::new();
    h.validator("alpha", 100);
    let alice = h.funded(100);
    let engine = h.local_engine();
    let mut blocks = engine.subscribe();

    h.submit(transfer(&alice, PrivateKey::random().account_id(), 5, 1));
    engine.run_cycle().await;

    let block = blocks.recv().await.unwrap();
    assert_eq!(block.number, 1);
    assert_eq!(Some(block), engine.block(1));
}

#[tokio::test]
async fn test_restored_engine_continues_numbering() {
    let h = Harness::new();
    h.validator("alpha", 100);
    let alice = h.funded(100);
    let bob = PrivateKey::random().account_id();
    let engine = h.local_engine();

    h.submit(transfer(&alice, bob, 5, 1));
    engine.run_cycle().await;
    let previous = engine.latest_block().unwrap();

    let restored = ConsensusEngine::with_blocks(
        engine.config().clone(),
        h.pool.clone(),
        h.ledger.clone(),
        Arc::new(LocalVoteCollector::new(h.ledger.clone())),
        engine.blocks(),
    );
    assert_eq!(restored.height(), 1);

    h.submit(transfer(&alice, bob, 5, 2));
    let outcome = restored.run_cycle().await;
    let block = outcome.block().unwrap();
    assert_eq!(block.number, 2);
    assert_eq!(block.parent_hash, previous.hash);
}

#[tokio::test]
async fn test_run_loop_commits_and_stops() {
    let h = Harness::new();
    h.validator("alpha", 100);
    let alice = h.funded(100);
    let bob = PrivateKey::random().account_id();
    let engine = Arc::new(h.local_engine());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.run(shutdown_rx).await })
    };

    h.submit(transfer(&alice, bob, 40, 1));
    tokio::time::timeout(Duration::from_secs(5), async {
        while engine.height() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("block committed in time");

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), runner)
        .await
        .expect("engine stopped in time")
        .unwrap();

    assert_eq!(h.ledger.balance(&bob), 40);
    assert_eq!(engine.phase(), Phase::Idle);
}

#[test]
fn test_commit_rule_never_looser_than_fractional_threshold() {
    let bps = ConsensusConfig::new(Duration::ZERO, 0.66664).threshold_bps;
    assert!(!meets_threshold(66_662, 100_000, bps));

    for threshold in [0.5, 0.66664, 2.0 / 3.0, 0.70001, 0.99999] {
        let bps = threshold_to_bps(threshold);
        for approving in 0..=1_000u128 {
            if meets_threshold(approving, 1_000, bps) {
                assert!(
                    approving as f64 / 1_000.0 >= threshold,
                    "{} of 1000 committed at threshold {}",
                    approving,
                    threshold
                );
            }
        }
    }
}

#[tokio::test]
async fn test_stake_just_below_fractional_threshold_stalls() {
    let h = Harness::new();
    h.validator("alpha", 66_662);
    h.validator("beta", 33_338);
    let alice = h.funded(100);
    let engine = h.engine_with_threshold(
        Arc::new(SplitCollector {
            rejecting: HashSet::from([vid("beta")]),
        }),
        0.66664,
    );

    let tx = transfer(&alice, PrivateKey::random().account_id(), 10, 1);
    h.submit(tx.clone());

    assert!(matches!(engine.run_cycle().await, CycleOutcome::Shortfall { .. }));
    assert!(h.pool.contains(&tx.hash()));
    assert_eq!(engine.height(), 0);
}

#[tokio::test]
async fn test_no_block_when_every_survivor_fails_at_commit() {
    let h = Harness::new();
    h.validator("alpha", 100);
    let alice = h.funded(100);
    let bob = PrivateKey::random().account_id();

    let engine = h.engine(Arc::new(SpendingCollector {
        ledger: h.ledger.clone(),
        spend: transfer(&alice, bob, 50, 2),
    }));
    let mut blocks = engine.subscribe();

    let late = transfer(&alice, bob, 80, 1);
    h.submit(late.clone());
    let outcome = engine.run_cycle().await;

    match &outcome {
        CycleOutcome::NothingApplied { excluded, failed } => {
            assert!(excluded.is_empty());
            assert_eq!(failed.len(), 1);
            assert_eq!(failed[0].tx_hash, late.hash());
            assert!(matches!(
                failed[0].reason,
                ExecutionError::InsufficientBalance { .. }
            ));
        }
        other => panic!("expected nothing applied, got {}", other.label()),
    }
    assert!(outcome.block().is_none());
    assert_eq!(engine.height(), 0);
    assert!(engine.latest_block().is_none());
    assert!(blocks.try_recv().is_err());
    assert!(h.ledger.receipt(&late.hash()).is_none());
    assert!(!h.pool.contains(&late.hash()));

    let stats = engine.stats();
    assert_eq!(stats.blocks_committed, 0);
    assert_eq!(stats.transactions_failed, 1);
    assert_eq!(stats.phase, Phase::Idle);

    // Numbering is unaffected
    h.submit(transfer(&alice, bob, 10, 3));
    let outcome = engine.run_cycle().await;
    assert_eq!(outcome.block().unwrap().number, 1);
}

#[tokio::test]
async fn test_run_loop_reports_every_cycle_to_observer() {
    let h = Harness::new();
    h.validator("alpha", 100);
    let alice = h.funded(100);
    let bob = PrivateKey::random().account_id();
    let engine = Arc::new(h.local_engine());
    let observer = Arc::new(RecordingObserver::default());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let runner = {
        let engine = engine.clone();
        let observer = observer.clone();
        tokio::spawn(async move { engine.run_observed(shutdown_rx, &*observer).await })
    };

    h.submit(transfer(&alice, bob, 40, 1));
    tokio::time::timeout(Duration::from_secs(5), async {
        while !observer.seen.lock().contains(&"committed") {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("commit observed in time");

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), runner)
        .await
        .expect("engine stopped in time")
        .unwrap();

    let seen = observer.seen.lock().clone();
    assert_eq!(seen.len() as u64, engine.stats().cycles);
    assert_eq!(seen.iter().filter(|l| **l == "committed").count(), 1);
}
