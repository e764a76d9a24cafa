//! Block cycle engine.
//!
//! ## Cycle
//!
//! 1. **Collecting**: drain the whole pool into a [`BlockCandidate`]
//! 2. **Voting**: snapshot approved validators, pre-check the candidate,
//!    collect one vote per validator and tally stake
//! 3. **Committing**: apply survivors through the ledger and record the block,
//!    unless none of them applied
//!
//! A cycle holds an async mutex for its whole run, so two cycles never
//! overlap. Phase, height and block queries use short `parking_lot` locks
//! that are never held across an `.await`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use l2core_ledger::{ExecutionError, Ledger};
use l2core_mempool::PendingPool;
use async_trait::async_trait;
use l2core_types::{BlockRecord, H256};
use parking_lot::RwLock;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace, warn};

use crate::collector::VoteCollector;
use crate::types::{BlockCandidate, ConsensusConfig, CycleOutcome, EngineStats, Exclusion, Phase};
use crate::vote_set::StakeTally;

/// Capacity of the committed-block broadcast channel
const COMMIT_CHANNEL_CAPACITY: usize = 64;

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Hook run on the driving task after every cycle of [`ConsensusEngine::run_observed`].
///
/// The next cycle does not start until the hook returns, so work done here
/// always sees state between two cycles.
#[async_trait]
pub trait CycleObserver: Send + Sync {
    /// Called with the outcome of each finished cycle
    async fn cycle_finished(&self, outcome: &CycleOutcome);
}

struct NoopObserver;

#[async_trait]
impl CycleObserver for NoopObserver {
    async fn cycle_finished(&self, _outcome: &CycleOutcome) {}
}

#[derive(Default)]
struct ChainState {
    blocks: BTreeMap<u64, BlockRecord>,
    stats: EngineStats,
}

impl ChainState {
    fn height(&self) -> u64 {
        self.blocks.keys().next_back().copied().unwrap_or(0)
    }

    fn parent_hash(&self) -> H256 {
        self.blocks
            .values()
            .next_back()
            .map_or(H256::NIL, |b| b.hash)
    }
}

/// Main consensus engine
pub struct ConsensusEngine {
    config: ConsensusConfig,
    pool: Arc<PendingPool>,
    ledger: Arc<Ledger>,
    collector: Arc<dyn VoteCollector>,

    /// Current phase
    phase: RwLock<Phase>,
    /// Committed blocks and counters
    chain: RwLock<ChainState>,
    /// Held for the whole of a cycle
    cycle_lock: Mutex<()>,
    /// Committed blocks, for subscribers
    commit_tx: broadcast::Sender<BlockRecord>,
}

impl ConsensusEngine {
    /// Create an engine with no committed blocks
    pub fn new(
        config: ConsensusConfig,
        pool: Arc<PendingPool>,
        ledger: Arc<Ledger>,
        collector: Arc<dyn VoteCollector>,
    ) -> Self {
        Self::with_blocks(config, pool, ledger, collector, Vec::new())
    }

    /// Create an engine continuing from persisted blocks
    pub fn with_blocks(
        config: ConsensusConfig,
        pool: Arc<PendingPool>,
        ledger: Arc<Ledger>,
        collector: Arc<dyn VoteCollector>,
        blocks: Vec<BlockRecord>,
    ) -> Self {
        let (commit_tx, _) = broadcast::channel(COMMIT_CHANNEL_CAPACITY);
        let mut chain = ChainState {
            blocks: blocks.into_iter().map(|b| (b.number, b)).collect(),
            stats: EngineStats::default(),
        };
        chain.stats.height = chain.height();
        chain.stats.blocks_committed = chain.blocks.len() as u64;

        Self {
            config,
            pool,
            ledger,
            collector,
            phase: RwLock::new(Phase::Idle),
            chain: RwLock::new(chain),
            cycle_lock: Mutex::new(()),
            commit_tx,
        }
    }

    /// Engine configuration
    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    /// Receive every block committed from now on
    pub fn subscribe(&self) -> broadcast::Receiver<BlockRecord> {
        self.commit_tx.subscribe()
    }

    fn transition(&self, to: Phase) {
        let mut phase = self.phase.write();
        if !phase.can_transition_to(to) {
            error!(from = %*phase, to = %to, "invalid phase transition");
        }
        trace!(from = %*phase, to = %to, "phase transition");
        *phase = to;
    }

    /// Run one cycle to completion.
    ///
    /// Waits for any cycle already in progress.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let _cycle = self.cycle_lock.lock().await;
        self.chain.write().stats.cycles += 1;

        // Collecting
        self.transition(Phase::Collecting);
        let candidate = BlockCandidate::new(self.pool.drain());
        if candidate.is_empty() {
            self.chain.write().stats.empty_cycles += 1;
            self.transition(Phase::Idle);
            trace!("pool empty, no block");
            return CycleOutcome::Empty;
        }
        debug!(transactions = candidate.len(), "candidate collected");

        // Voting
        self.transition(Phase::Voting);
        let snapshot = self.ledger.registry().active_validators();
        let (candidate, excluded) = self.pre_check(candidate);
        self.chain.write().stats.transactions_excluded += excluded.len() as u64;

        if candidate.is_empty() {
            warn!(excluded = excluded.len(), "every candidate transaction failed the pre-check");
            self.transition(Phase::Idle);
            return CycleOutcome::AllExcluded { excluded };
        }

        let transactions = candidate.transactions();
        let mut tally = StakeTally::new(snapshot);
        let voters = tally.snapshot().validators.clone();
        for (validator, stake) in &voters {
            let vote = self
                .collector
                .collect_vote(validator, *stake, &transactions)
                .await;
            if let Err(e) = tally.add_vote(validator.clone(), vote) {
                warn!(validator = %validator, error = %e, "vote discarded");
            }
        }

        if !tally.meets_threshold(self.config.threshold_bps) {
            let ratio = tally.ratio();
            let requeued = candidate.len();
            warn!(
                approving_stake = tally.approving_stake(),
                total_stake = tally.total_stake(),
                ratio,
                threshold_bps = self.config.threshold_bps,
                validators = voters.len(),
                requeued,
                "stake shortfall, transactions returned to pool"
            );
            self.pool.requeue(candidate.into_entries());
            self.chain.write().stats.shortfalls += 1;
            self.transition(Phase::Idle);
            return CycleOutcome::Shortfall {
                ratio,
                approving_stake: tally.approving_stake(),
                total_stake: tally.total_stake(),
                requeued,
                excluded,
            };
        }

        // Committing
        self.transition(Phase::Committing);
        let (block, failed) = self.commit(candidate, &tally);
        self.transition(Phase::Idle);

        match block {
            Some(block) => CycleOutcome::Committed {
                block,
                excluded,
                failed,
            },
            None => CycleOutcome::NothingApplied { excluded, failed },
        }
    }

    /// Drop candidate transactions that fail signature or precondition
    /// checks. Dropped transactions are not retried.
    fn pre_check(&self, candidate: BlockCandidate) -> (BlockCandidate, Vec<Exclusion>) {
        let results = self.ledger.simulate(&candidate.transactions());
        let mut excluded = Vec::new();
        let mut verdicts = results.into_iter();

        let survivors = candidate.retain(|entry| match verdicts.next() {
            Some(Ok(())) | None => true,
            Some(Err(ExecutionError::InvalidSignature)) => {
                warn!(
                    tx_hash = %entry.hash(),
                    sender = %entry.tx.sender(),
                    kind = %entry.tx.kind(),
                    "signature does not recover to sender, transaction dropped; sender must resubmit"
                );
                excluded.push(Exclusion {
                    tx_hash: entry.hash(),
                    reason: ExecutionError::InvalidSignature,
                });
                false
            }
            Some(Err(reason)) => {
                warn!(
                    tx_hash = %entry.hash(),
                    sender = %entry.tx.sender(),
                    kind = %entry.tx.kind(),
                    error = %reason,
                    "transaction excluded from block"
                );
                excluded.push(Exclusion {
                    tx_hash: entry.hash(),
                    reason,
                });
                false
            }
        });
        (survivors, excluded)
    }

    fn commit(
        &self,
        candidate: BlockCandidate,
        tally: &StakeTally,
    ) -> (Option<BlockRecord>, Vec<Exclusion>) {
        let (number, parent_hash) = {
            let chain = self.chain.read();
            (chain.height() + 1, chain.parent_hash())
        };

        let mut included = Vec::with_capacity(candidate.len());
        let mut failed = Vec::new();
        for entry in candidate.entries() {
            match self.ledger.apply(&entry.tx, number) {
                Ok(receipt) => included.push(receipt.tx_hash),
                Err(ExecutionError::AlreadyApplied(hash)) => {
                    error!(
                        tx_hash = %hash,
                        block_number = number,
                        "receipt already exists for committed transaction"
                    );
                    failed.push(Exclusion {
                        tx_hash: hash,
                        reason: ExecutionError::AlreadyApplied(hash),
                    });
                }
                Err(reason) => {
                    error!(
                        tx_hash = %entry.hash(),
                        block_number = number,
                        sender = %entry.tx.sender(),
                        kind = %entry.tx.kind(),
                        seq = entry.seq,
                        error = %reason,
                        "transaction failed during commit"
                    );
                    failed.push(Exclusion {
                        tx_hash: entry.hash(),
                        reason,
                    });
                }
            }
        }

        if included.is_empty() {
            self.chain.write().stats.transactions_failed += failed.len() as u64;
            warn!(
                number,
                failed = failed.len(),
                "every approved transaction failed during commit, no block recorded"
            );
            return (None, failed);
        }

        let timestamp = unix_millis();
        let block = BlockRecord {
            number,
            hash: BlockRecord::compute_hash(number, &parent_hash, timestamp, &included),
            parent_hash,
            timestamp,
            transactions: included,
            stake_snapshot: tally.snapshot().validators.clone(),
            total_stake: tally.total_stake(),
            approving_stake: tally.approving_stake(),
        };

        {
            let mut chain = self.chain.write();
            chain.blocks.insert(number, block.clone());
            chain.stats.height = number;
            chain.stats.blocks_committed += 1;
            chain.stats.transactions_committed += block.transactions.len() as u64;
            chain.stats.transactions_failed += failed.len() as u64;
        }

        info!(
            number,
            hash = %block.hash,
            transactions = block.tx_count(),
            failed = failed.len(),
            approving_stake = block.approving_stake,
            total_stake = block.total_stake,
            "block committed"
        );
        if self.commit_tx.send(block.clone()).is_err() {
            trace!(number, "no block subscribers");
        }
        (Some(block), failed)
    }

    /// Drive cycles on the block interval until `shutdown` flips to true.
    ///
    /// A cycle that has started always runs to completion.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) {
        self.run_observed(shutdown, &NoopObserver).await;
    }

    /// Like [`run`](Self::run), handing every outcome to `observer` before
    /// the next tick is awaited.
    pub async fn run_observed(
        &self,
        mut shutdown: watch::Receiver<bool>,
        observer: &dyn CycleObserver,
    ) {
        let mut ticker = tokio::time::interval(self.config.block_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            interval_ms = self.config.block_interval.as_millis() as u64,
            threshold_bps = self.config.threshold_bps,
            "consensus engine started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }

            let outcome = self.step().await;
            observer.cycle_finished(&outcome).await;
        }

        info!(height = self.height(), "consensus engine stopped");
    }

    /// One tick: drop expired pool entries, then run a cycle
    pub async fn step(&self) -> CycleOutcome {
        let expired = self.pool.prune();
        if !expired.is_empty() {
            debug!(expired = expired.len(), "expired transactions removed");
        }

        let outcome = self.run_cycle().await;
        trace!(outcome = outcome.label(), "cycle finished");
        outcome
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Current phase
    pub fn phase(&self) -> Phase {
        *self.phase.read()
    }

    /// Latest committed block number, 0 before the first block
    pub fn height(&self) -> u64 {
        self.chain.read().height()
    }

    /// Latest committed block
    pub fn latest_block(&self) -> Option<BlockRecord> {
        self.chain.read().blocks.values().next_back().cloned()
    }

    /// Block by number
    pub fn block(&self, number: u64) -> Option<BlockRecord> {
        self.chain.read().blocks.get(&number).cloned()
    }

    /// All committed blocks, oldest first
    pub fn blocks(&self) -> Vec<BlockRecord> {
        self.chain.read().blocks.values().cloned().collect()
    }

    /// Engine counters
    pub fn stats(&self) -> EngineStats {
        let mut stats = self.chain.read().stats.clone();
        stats.phase = self.phase();
        stats
    }

    /// Transactions waiting in the pool
    pub fn pending_count(&self) -> usize {
        self.pool.len()
    }
}
