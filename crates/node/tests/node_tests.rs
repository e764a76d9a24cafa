//! Node wiring tests

use std::sync::Arc;
use std::time::Duration;

use l2core::{Node, NodeError, NodeEvent, NodeState};
use l2core_config::{Config, GenesisAccount, GenesisValidator};
use l2core_consensus::CycleOutcome;
use l2core_core::{ChainError, ExternalTransfer, MockPublicChain};
use l2core_crypto::PrivateKey;
use l2core_ledger::ExecutionError;
use l2core_mempool::IntakeError;
use l2core_registry::{DeploymentConfig, RegistryError, ValidatorStatus};
use l2core_storage::FileStore;
use l2core_types::{AccountId, RawTransaction, Transaction, ValidatorId};
use tempfile::TempDir;

struct Genesis {
    admin: PrivateKey,
    alice: PrivateKey,
    operator: PrivateKey,
}

fn genesis() -> Genesis {
    Genesis {
        admin: PrivateKey::random(),
        alice: PrivateKey::random(),
        operator: PrivateKey::random(),
    }
}

fn config(g: &Genesis, data_dir: Option<&TempDir>) -> Config {
    let mut config = Config::default();
    config.consensus.block_interval_ms = 100;
    config.registry.admins = vec![g.admin.account_id().to_hex()];
    config.chain_client.timeout_ms = 50;
    match data_dir {
        Some(dir) => config.storage.data_dir = dir.path().to_string_lossy().into_owned(),
        None => config.storage.persist = false,
    }

    for (key, balance) in [(&g.admin, "500"), (&g.alice, "100"), (&g.operator, "5000")] {
        config.genesis.accounts.push(GenesisAccount {
            address: key.account_id().to_hex(),
            balance: balance.to_string(),
        });
    }
    config.genesis.validators.push(GenesisValidator {
        id: "genesis-0".to_string(),
        owner: g.admin.account_id().to_hex(),
        self_stake: "500".to_string(),
    });
    config
}

fn node(config: Config) -> Node {
    Node::new(config, Arc::new(MockPublicChain::new())).unwrap()
}

fn transfer(key: &PrivateKey, to: AccountId, amount: u128, ts: u64) -> RawTransaction {
    let tx = key
        .sign_transaction(Transaction::transfer(key.account_id(), to, amount, ts))
        .unwrap();
    RawTransaction::from(&tx)
}

#[tokio::test]
async fn test_genesis_seeds_ledger_and_registry() {
    let g = genesis();
    let node = node(config(&g, None));

    assert_eq!(node.balance(&g.alice.account_id()), 100);
    assert_eq!(node.account(&g.admin.account_id()).locked, 500);

    let status = node.status();
    assert_eq!(status.state, NodeState::Starting);
    assert_eq!(status.height, 0);
    assert_eq!(status.active_validators, 1);
    assert_eq!(status.active_stake, 500);
}

#[tokio::test]
async fn test_submitted_transfer_commits() {
    let g = genesis();
    let node = node(config(&g, None));
    let bob = PrivateKey::random().account_id();
    let mut events = node.subscribe_events();

    let hash = node.submit(transfer(&g.alice, bob, 40, 1)).unwrap();
    // Resubmission returns the same hash and changes nothing
    assert_eq!(node.submit(transfer(&g.alice, bob, 40, 1)).unwrap(), hash);
    assert!(node.is_pending(&hash));

    let outcome = node.run_cycle().await;
    let block = outcome.block().expect("block committed");
    assert_eq!(block.transactions, vec![hash]);

    assert_eq!(node.balance(&g.alice.account_id()), 60);
    assert_eq!(node.balance(&bob), 40);
    assert_eq!(node.receipt(&hash).unwrap().block_number, 1);
    assert_eq!(node.block(1), node.latest_block());
    assert!(!node.is_pending(&hash));

    match events.recv().await.unwrap() {
        NodeEvent::BlockCommitted { number, transactions, .. } => {
            assert_eq!(number, 1);
            assert_eq!(transactions, 1);
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_submission_rejected() {
    let g = genesis();
    let node = node(config(&g, None));

    let mut raw = transfer(&g.alice, PrivateKey::random().account_id(), 5, 1);
    raw.amount = None;
    assert!(matches!(
        node.submit(raw),
        Err(NodeError::Intake(IntakeError::MissingField(_)))
    ));
    assert_eq!(node.status().pending_transactions, 0);
}

#[tokio::test]
async fn test_overdraft_dropped_without_receipt() {
    let g = genesis();
    let node = node(config(&g, None));
    let bob = PrivateKey::random().account_id();

    let hash = node.submit(transfer(&g.alice, bob, 1_000, 1)).unwrap();
    let outcome = node.run_cycle().await;

    assert!(matches!(outcome, CycleOutcome::AllExcluded { .. }));
    assert!(node.receipt(&hash).is_none());
    assert!(!node.is_pending(&hash));
    assert_eq!(node.balance(&g.alice.account_id()), 100);
}

#[tokio::test]
async fn test_deployment_lifecycle() {
    let g = genesis();
    let node = node(config(&g, None));
    let admin = g.admin.account_id();
    let operator = g.operator.account_id();

    // Alice holds less than the minimum
    assert!(matches!(
        node.request_deployment(g.alice.account_id(), DeploymentConfig::default()),
        Err(NodeError::Registry(RegistryError::InsufficientStake { .. }))
    ));

    let id = node
        .request_deployment(operator, DeploymentConfig::with_validator_id("edge-1"))
        .unwrap();
    assert_eq!(node.pending_deployments().len(), 1);
    assert!(matches!(
        node.approve_deployment(id, &operator),
        Err(NodeError::Registry(RegistryError::Unauthorized(_)))
    ));

    let approved = node.approve_deployment(id, &admin).unwrap();
    let edge = ValidatorId::new("edge-1").unwrap();
    assert_eq!(node.node_status(&edge).unwrap().last_seen, None);
    assert!(node.authenticate_node(&approved.credentials.node_id, &approved.credentials.api_key));
    assert!(node.node_status(&edge).unwrap().last_seen.is_some());
    assert!(node.stale_nodes(Duration::from_secs(60)).is_empty());
    assert!(node.pending_deployments().is_empty());

    // Bond stake through the ledger, then revoke
    let register = g
        .operator
        .sign_transaction(Transaction::register_validator(
            operator,
            ValidatorId::new("edge-1").unwrap(),
            2_000,
            1,
        ))
        .unwrap();
    node.submit_signed(register).unwrap();
    assert!(node.run_cycle().await.block().is_some());
    assert_eq!(node.account(&operator).locked, 2_000);
    assert_eq!(node.status().active_stake, 2_500);

    node.revoke_validator(&edge, "offline", &admin).unwrap();
    assert_eq!(node.account(&operator).locked, 0);
    assert_eq!(node.node_status(&edge).unwrap().status, ValidatorStatus::Revoked);
    assert!(!node.authenticate_node(&approved.credentials.node_id, &approved.credentials.api_key));

    let overview = node.overview();
    assert_eq!(overview.revoked_validators, 1);
    assert_eq!(overview.active_validators, 1);
}

#[tokio::test]
async fn test_rejected_deployment() {
    let g = genesis();
    let node = node(config(&g, None));
    let admin = g.admin.account_id();

    let id = node
        .request_deployment(g.operator.account_id(), DeploymentConfig::default())
        .unwrap();
    node.reject_deployment(id, &admin, "region full").unwrap();

    assert!(node.pending_deployments().is_empty());
    assert!(matches!(
        node.approve_deployment(id, &admin),
        Err(NodeError::Registry(RegistryError::AlreadyDecided { .. }))
    ));
}

#[tokio::test]
async fn test_delegation_to_unknown_validator_dropped() {
    let g = genesis();
    let node = node(config(&g, None));

    let tx = g
        .alice
        .sign_transaction(Transaction::delegate(
            g.alice.account_id(),
            ValidatorId::new("ghost").unwrap(),
            10,
            1,
        ))
        .unwrap();
    node.submit_signed(tx).unwrap();

    let outcome = node.run_cycle().await;
    assert_eq!(outcome.excluded().len(), 1);
    assert!(matches!(
        outcome.excluded()[0].reason,
        ExecutionError::UnknownValidator(_)
    ));
}

#[tokio::test]
async fn test_state_survives_restart() {
    let dir = TempDir::new().unwrap();
    let g = genesis();
    let bob = PrivateKey::random().account_id();

    let first_hash = {
        let node = node(config(&g, Some(&dir)));
        let hash = node.submit(transfer(&g.alice, bob, 30, 1)).unwrap();
        node.run_cycle().await;
        node.request_deployment(g.operator.account_id(), DeploymentConfig::default())
            .unwrap();
        node.persist().await.unwrap();
        hash
    };

    let node = node(config(&g, Some(&dir)));
    assert_eq!(node.balance(&bob), 30);
    assert_eq!(node.balance(&g.alice.account_id()), 70);
    assert!(node.receipt(&first_hash).is_some());
    assert_eq!(node.status().height, 1);
    assert_eq!(node.pending_deployments().len(), 1);

    // Already applied: a replay is dropped
    node.submit(transfer(&g.alice, bob, 30, 1)).unwrap();
    assert!(matches!(
        node.run_cycle().await,
        CycleOutcome::AllExcluded { .. }
    ));
    assert_eq!(node.balance(&bob), 30);

    node.submit(transfer(&g.alice, bob, 5, 2)).unwrap();
    let outcome = node.run_cycle().await;
    let block = outcome.block().unwrap();
    assert_eq!(block.number, 2);
    assert_eq!(Some(block.parent_hash), node.block(1).map(|b| b.hash));
}

#[tokio::test]
async fn test_run_until_shutdown() {
    let dir = TempDir::new().unwrap();
    let g = genesis();
    let bob = PrivateKey::random().account_id();
    let node = Arc::new(node(config(&g, Some(&dir))));

    let runner = {
        let node = node.clone();
        tokio::spawn(async move { node.run().await })
    };

    node.submit(transfer(&g.alice, bob, 10, 1)).unwrap();
    // Saved by the run loop after the commit, before any shutdown
    let store = FileStore::open(dir.path()).unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while store.load().unwrap().map_or(0, |s| s.height()) == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("block saved in time");
    assert_eq!(node.state(), NodeState::Running);

    node.request_shutdown();
    tokio::time::timeout(Duration::from_secs(5), runner)
        .await
        .expect("node stopped in time")
        .unwrap()
        .unwrap();

    assert_eq!(node.state(), NodeState::Stopped);
    assert_eq!(store.load().unwrap().unwrap().height(), node.status().height);
}

#[tokio::test]
async fn test_public_chain_calls() {
    let g = genesis();
    let chain = Arc::new(MockPublicChain::new());
    chain.set_balance("0xaaa", 100);
    let node = Node::new(config(&g, None), chain.clone()).unwrap();

    assert_eq!(node.external_balance("0xaaa").await.unwrap(), 100);

    let id = node
        .broadcast_external_transfer(ExternalTransfer {
            from: "0xaaa".into(),
            to: "0xbbb".into(),
            amount: 40,
            signature: "0xsig".into(),
        })
        .await
        .unwrap();
    assert!(!id.is_empty());
    assert_eq!(node.external_balance("0xbbb").await.unwrap(), 40);

    chain.set_latency(Some(Duration::from_millis(500)));
    assert!(matches!(
        node.external_balance("0xaaa").await,
        Err(NodeError::Chain(ChainError::Timeout(50)))
    ));

    chain.set_latency(None);
    chain.set_offline(true);
    assert!(matches!(
        node.external_balance("0xaaa").await,
        Err(NodeError::Chain(ChainError::Unavailable(_)))
    ));
}
