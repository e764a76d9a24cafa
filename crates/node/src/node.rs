//! # L2 Core Node
//!
//! The `Node` owns every component and is the surface an outer API calls:
//! - Restores state from the data directory, or seeds it from genesis
//! - Accepts submissions through intake
//! - Drives the block cycle on the configured interval
//! - Persists state after every committed block, after registry decisions
//!   and on shutdown
//! - Forwards public-chain calls with a timeout
//!
//! Persistence only happens on the task that drives cycles, between cycles,
//! so a saved snapshot never holds half of a block. The node observes the
//! engine's own run loop and hands the file write to the blocking pool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use l2core_config::Config;
use async_trait::async_trait;
use l2core_consensus::{
    ConsensusConfig, ConsensusEngine, CycleObserver, CycleOutcome, LocalVoteCollector, Phase,
};
use l2core_core::{ChainError, ExternalTransfer, PublicChainClient};
use l2core_ledger::{AccountState, Ledger};
use l2core_mempool::{Intake, PendingPool, PoolConfig};
use l2core_registry::{
    ApprovedDeployment, DeploymentConfig, DeploymentRequest, NetworkOverview, NodeStatus, Registry,
    RegistryConfig, ReleasedStake,
};
use l2core_storage::{FileStore, NodeSnapshot};
use l2core_types::{
    AccountId, Amount, BlockRecord, DeploymentId, RawTransaction, Receipt, SignedTransaction,
    ValidatorId, H256,
};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use crate::{NodeError, Result};

/// Lifecycle state of the node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    /// Built, not yet running cycles
    Starting,
    /// Running cycles
    Running,
    /// Stopping, final save in progress
    ShuttingDown,
    /// Stopped
    Stopped,
}

/// Events emitted by the node for external monitoring
#[derive(Debug, Clone)]
pub enum NodeEvent {
    /// Node state changed
    StateChanged(NodeState),
    /// New block committed
    BlockCommitted {
        /// Block number
        number: u64,
        /// Block hash
        hash: H256,
        /// Transactions in the block
        transactions: usize,
    },
    /// Approving stake fell short; transactions stay pending
    StakeShortfall {
        /// Approving share of total stake
        ratio: f64,
        /// Transactions returned to the pool
        requeued: usize,
    },
}

/// Summary returned by [`Node::status`]
#[derive(Debug, Clone, Serialize)]
pub struct NodeInfo {
    /// Chain identifier
    pub chain_id: u64,
    /// Lifecycle state
    pub state: NodeState,
    /// Block cycle phase
    pub phase: Phase,
    /// Latest block number
    pub height: u64,
    /// Latest block hash
    pub latest_hash: Option<H256>,
    /// Transactions waiting in the pool
    pub pending_transactions: usize,
    /// Approved validators
    pub active_validators: usize,
    /// Their combined effective stake
    pub active_stake: Amount,
    /// Applied transactions
    pub receipts: usize,
}

/// Node wiring all components together
pub struct Node {
    config: Arc<Config>,
    state: RwLock<NodeState>,

    intake: Intake,
    registry: Arc<Registry>,
    ledger: Arc<Ledger>,
    engine: Arc<ConsensusEngine>,
    chain: Arc<dyn PublicChainClient>,

    /// `None` when persistence is disabled
    store: Option<Arc<FileStore>>,
    /// Registry changed since the last save
    dirty: AtomicBool,

    event_tx: broadcast::Sender<NodeEvent>,
    shutdown_tx: watch::Sender<bool>,
}

impl Node {
    /// Build a node from configuration.
    ///
    /// Loads `<data_dir>/state.json` when persistence is on and the file
    /// exists; otherwise seeds accounts and validators from genesis.
    pub fn new(config: Config, chain: Arc<dyn PublicChainClient>) -> Result<Self> {
        config.validate()?;

        let registry_config = RegistryConfig::new(
            config.registry.min_stake_requirement_u128(),
            config.registry.admin_accounts()?,
        );

        let store = if config.storage.persist {
            Some(Arc::new(FileStore::open(config.storage.data_path())?))
        } else {
            None
        };
        let snapshot = match &store {
            Some(store) => store.load()?,
            None => None,
        };

        let (registry, ledger, blocks) = match snapshot {
            Some(snapshot) => {
                if !snapshot.verify_chain() {
                    return Err(NodeError::BrokenChain);
                }
                info!(height = snapshot.height(), "resuming from saved state");
                let registry = Arc::new(Registry::from_snapshot(registry_config, snapshot.registry));
                let ledger = Arc::new(Ledger::from_snapshot(registry.clone(), snapshot.ledger));
                (registry, ledger, snapshot.blocks)
            }
            None => {
                let registry = Arc::new(Registry::new(registry_config));
                let ledger = Arc::new(Ledger::new(registry.clone()));
                Self::apply_genesis(&config, &ledger)?;
                (registry, ledger, Vec::new())
            }
        };

        let pool = Arc::new(PendingPool::new(PoolConfig {
            max_size: config.mempool.max_size,
            ttl: config.mempool.ttl(),
        }));
        let engine = Arc::new(ConsensusEngine::with_blocks(
            ConsensusConfig {
                block_interval: config.consensus.block_interval(),
                threshold_bps: config.consensus.threshold_bps(),
            },
            pool.clone(),
            ledger.clone(),
            Arc::new(LocalVoteCollector::new(ledger.clone())),
            blocks,
        ));

        let (event_tx, _) = broadcast::channel(256);
        let (shutdown_tx, _) = watch::channel(false);

        info!(
            chain_id = config.chain.chain_id,
            height = engine.height(),
            validators = registry.active_validators().len(),
            persist = store.is_some(),
            "node initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            state: RwLock::new(NodeState::Starting),
            intake: Intake::new(pool),
            registry,
            ledger,
            engine,
            chain,
            store,
            dirty: AtomicBool::new(false),
            event_tx,
            shutdown_tx,
        })
    }

    fn apply_genesis(config: &Config, ledger: &Ledger) -> Result<()> {
        let genesis = config.genesis.parse()?;
        for (account, balance) in &genesis.accounts {
            ledger.credit_genesis(*account, *balance)?;
        }
        for (id, owner, stake) in genesis.validators {
            ledger.seed_genesis_validator(id, owner, stake)?;
        }
        info!(
            accounts = genesis.accounts.len(),
            supply = ledger.total_supply(),
            validators = ledger.registry().active_validators().len(),
            "genesis applied"
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Run block cycles until shutdown is requested or Ctrl+C arrives
    pub async fn run(&self) -> Result<()> {
        self.set_state(NodeState::Running);
        info!(
            interval_ms = self.config.consensus.block_interval_ms,
            threshold = self.config.consensus.consensus_threshold,
            "node running"
        );

        let cycles = self.engine.run_observed(self.shutdown_tx.subscribe(), self);
        tokio::pin!(cycles);
        tokio::select! {
            _ = &mut cycles => {
                info!("Received shutdown signal");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, initiating shutdown");
                self.request_shutdown();
                // Let a cycle in progress finish
                cycles.await;
            }
        }

        self.shutdown().await
    }

    /// Run one cycle, then save if anything changed
    pub async fn run_cycle(&self) -> CycleOutcome {
        let outcome = self.engine.step().await;
        self.cycle_finished(&outcome).await;
        outcome
    }

    async fn shutdown(&self) -> Result<()> {
        info!("Initiating graceful shutdown");
        self.set_state(NodeState::ShuttingDown);
        self.persist().await?;
        self.set_state(NodeState::Stopped);
        info!(height = self.engine.height(), "Node shutdown complete");
        Ok(())
    }

    /// Ask a running node to stop after its current cycle
    pub fn request_shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Save state now.
    ///
    /// The snapshot is taken on the calling task; the write and fsync run
    /// on the blocking pool.
    pub async fn persist(&self) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let (ledger, registry) = self.ledger.snapshot_with_registry();
        let snapshot = NodeSnapshot::new(ledger, registry, self.engine.blocks());
        let store = Arc::clone(store);
        tokio::task::spawn_blocking(move || store.save(snapshot)).await??;
        Ok(())
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    fn set_state(&self, state: NodeState) {
        *self.state.write() = state;
        let _ = self.event_tx.send(NodeEvent::StateChanged(state));
    }

    /// Subscribe to node events
    pub fn subscribe_events(&self) -> broadcast::Receiver<NodeEvent> {
        self.event_tx.subscribe()
    }

    // ------------------------------------------------------------------
    // Submissions
    // ------------------------------------------------------------------

    /// Validate and enqueue an untyped transaction
    pub fn submit(&self, raw: RawTransaction) -> Result<H256> {
        Ok(self.intake.submit(raw)?)
    }

    /// Validate and enqueue a signed transaction
    pub fn submit_signed(&self, tx: SignedTransaction) -> Result<H256> {
        Ok(self.intake.submit_signed(tx)?)
    }

    // ------------------------------------------------------------------
    // Validator lifecycle
    // ------------------------------------------------------------------

    /// Request a node deployment for `account`
    pub fn request_deployment(
        &self,
        account: AccountId,
        config: DeploymentConfig,
    ) -> Result<DeploymentId> {
        let id = self
            .registry
            .request_deployment(&*self.ledger, account, config)?;
        self.mark_dirty();
        Ok(id)
    }

    /// Approve a deployment; the returned credentials are not stored
    pub fn approve_deployment(
        &self,
        id: DeploymentId,
        approver: &AccountId,
    ) -> Result<ApprovedDeployment> {
        let approved = self.registry.approve_deployment(id, approver)?;
        self.mark_dirty();
        Ok(approved)
    }

    /// Reject a deployment, releasing any stake bonded to its validator
    pub fn reject_deployment(
        &self,
        id: DeploymentId,
        approver: &AccountId,
        reason: impl Into<String>,
    ) -> Result<ReleasedStake> {
        let released = self.ledger.reject_deployment(id, approver, reason)?;
        self.mark_dirty();
        Ok(released)
    }

    /// Revoke a validator, excluding it from every later cycle
    pub fn revoke_validator(
        &self,
        id: &ValidatorId,
        reason: impl Into<String>,
        authority: &AccountId,
    ) -> Result<ReleasedStake> {
        let released = self.ledger.revoke_validator(id, reason, authority)?;
        self.mark_dirty();
        Ok(released)
    }

    /// Check a node's api key, recording when it was last seen
    pub fn authenticate_node(&self, node_id: &str, api_key: &str) -> bool {
        let authenticated = self.registry.authenticate_node(node_id, api_key);
        if authenticated {
            self.mark_dirty();
        }
        authenticated
    }

    /// Approved validators whose node has gone quiet for longer than `max_idle`
    pub fn stale_nodes(&self, max_idle: Duration) -> Vec<ValidatorId> {
        self.registry.stale_nodes(max_idle)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Total balance of an account
    pub fn balance(&self, account: &AccountId) -> Amount {
        self.ledger.balance(account)
    }

    /// Balance and locked stake of an account
    pub fn account(&self, account: &AccountId) -> AccountState {
        self.ledger.account(account)
    }

    /// Receipt of an applied transaction
    pub fn receipt(&self, hash: &H256) -> Option<Receipt> {
        self.ledger.receipt(hash)
    }

    /// Block by number
    pub fn block(&self, number: u64) -> Option<BlockRecord> {
        self.engine.block(number)
    }

    /// Latest committed block
    pub fn latest_block(&self) -> Option<BlockRecord> {
        self.engine.latest_block()
    }

    /// Whether a transaction is waiting in the pool
    pub fn is_pending(&self, hash: &H256) -> bool {
        self.intake.is_pending(hash)
    }

    /// Node summary
    pub fn status(&self) -> NodeInfo {
        let latest = self.engine.latest_block();
        let active = self.registry.active_validators();
        NodeInfo {
            chain_id: self.config.chain.chain_id,
            state: *self.state.read(),
            phase: self.engine.phase(),
            height: latest.as_ref().map_or(0, |b| b.number),
            latest_hash: latest.map(|b| b.hash),
            pending_transactions: self.intake.pending_count(),
            active_validators: active.len(),
            active_stake: active.total_stake,
            receipts: self.ledger.receipt_count(),
        }
    }

    /// Validator network summary
    pub fn overview(&self) -> NetworkOverview {
        self.registry.overview()
    }

    /// Status of one validator
    pub fn node_status(&self, id: &ValidatorId) -> Option<NodeStatus> {
        self.registry.node_status(id)
    }

    /// Deployments awaiting a decision
    pub fn pending_deployments(&self) -> Vec<DeploymentRequest> {
        self.registry.pending_deployments()
    }

    /// Lifecycle state
    pub fn state(&self) -> NodeState {
        *self.state.read()
    }

    /// Node configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    // ------------------------------------------------------------------
    // Public chain
    // ------------------------------------------------------------------

    /// Balance of an account on the public chain
    pub async fn external_balance(&self, account: &str) -> Result<Amount> {
        let timeout = self.config.chain_client.timeout();
        match tokio::time::timeout(timeout, self.chain.get_balance(account)).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                warn!(account, timeout_ms = self.config.chain_client.timeout_ms, "balance lookup timed out");
                Err(ChainError::Timeout(self.config.chain_client.timeout_ms).into())
            }
        }
    }

    /// Broadcast a signed transfer on the public chain
    pub async fn broadcast_external_transfer(&self, transfer: ExternalTransfer) -> Result<String> {
        let timeout = self.config.chain_client.timeout();
        let amount = transfer.amount;
        match tokio::time::timeout(timeout, self.chain.broadcast_transfer(transfer)).await {
            Ok(result) => {
                let id = result?;
                debug!(external_tx = %id, amount, "external transfer broadcast");
                Ok(id)
            }
            Err(_) => {
                warn!(amount, timeout_ms = self.config.chain_client.timeout_ms, "broadcast timed out");
                Err(ChainError::Timeout(self.config.chain_client.timeout_ms).into())
            }
        }
    }
}

#[async_trait]
impl CycleObserver for Node {
    async fn cycle_finished(&self, outcome: &CycleOutcome) {
        let mut changed = self.dirty.swap(false, Ordering::AcqRel);
        match outcome {
            CycleOutcome::Committed { block, .. } => {
                changed = true;
                let _ = self.event_tx.send(NodeEvent::BlockCommitted {
                    number: block.number,
                    hash: block.hash,
                    transactions: block.tx_count(),
                });
            }
            CycleOutcome::Shortfall {
                ratio, requeued, ..
            } => {
                let _ = self.event_tx.send(NodeEvent::StakeShortfall {
                    ratio: *ratio,
                    requeued: *requeued,
                });
            }
            CycleOutcome::NothingApplied { failed, .. } => {
                debug!(failed = failed.len(), "cycle applied nothing");
            }
            CycleOutcome::AllExcluded { .. } | CycleOutcome::Empty => {}
        }

        if changed {
            if let Err(e) = self.persist().await {
                error!(error = %e, "failed to save state");
                self.dirty.store(true, Ordering::Release);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_state_serializes_snake_case() {
        let json = serde_json::to_string(&NodeState::ShuttingDown).unwrap();
        assert_eq!(json, "\"shutting_down\"");
    }

    #[test]
    fn test_node_event_clone() {
        let event = NodeEvent::StateChanged(NodeState::Running);
        match event.clone() {
            NodeEvent::StateChanged(state) => assert_eq!(state, NodeState::Running),
            _ => panic!("Events should match"),
        }
    }
}
