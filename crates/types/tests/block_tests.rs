//! Tests for BlockRecord and Receipt types

use l2core_types::{AccountId, BlockRecord, Receipt, TxKind, ValidatorId, H256};

fn record(number: u64, parent: H256, txs: Vec<H256>) -> BlockRecord {
    let timestamp = 1_700_000_000_000;
    BlockRecord {
        number,
        hash: BlockRecord::compute_hash(number, &parent, timestamp, &txs),
        parent_hash: parent,
        timestamp,
        transactions: txs,
        stake_snapshot: vec![(ValidatorId::new("val-a").unwrap(), 100)],
        total_stake: 100,
        approving_stake: 100,
    }
}

#[test]
fn test_block_hash_deterministic() {
    let txs = vec![H256::keccak256(b"a"), H256::keccak256(b"b")];
    let a = BlockRecord::compute_hash(1, &H256::NIL, 5, &txs);
    let b = BlockRecord::compute_hash(1, &H256::NIL, 5, &txs);
    assert_eq!(a, b);
    assert!(!a.is_nil());
}

#[test]
fn test_block_hash_depends_on_tx_order() {
    let a = H256::keccak256(b"a");
    let b = H256::keccak256(b"b");
    assert_ne!(
        BlockRecord::compute_hash(1, &H256::NIL, 5, &[a, b]),
        BlockRecord::compute_hash(1, &H256::NIL, 5, &[b, a])
    );
}

#[test]
fn test_block_chain_links() {
    let first = record(1, H256::NIL, vec![H256::keccak256(b"tx1")]);
    let second = record(2, first.hash, vec![H256::keccak256(b"tx2")]);
    assert!(first.parent_hash.is_nil());
    assert_eq!(second.parent_hash, first.hash);
    assert!(first.verify_hash());
    assert!(second.verify_hash());
}

#[test]
fn test_block_verify_detects_tamper() {
    let mut block = record(1, H256::NIL, vec![H256::keccak256(b"tx1")]);
    block.transactions.push(H256::keccak256(b"injected"));
    assert!(!block.verify_hash());
}

#[test]
fn test_block_serde_roundtrip() {
    let block = record(3, H256::keccak256(b"p"), vec![H256::keccak256(b"t")]);
    let json = serde_json::to_string(&block).unwrap();
    let decoded: BlockRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(block, decoded);
}

#[test]
fn test_receipt_balance_lookup() {
    let a = AccountId::new([1; 20]);
    let b = AccountId::new([2; 20]);
    let receipt = Receipt {
        tx_hash: H256::keccak256(b"tx"),
        block_number: 1,
        kind: TxKind::Transfer,
        balances: vec![(a, 60), (b, 40)],
    };
    assert_eq!(receipt.balance_of(&a), Some(60));
    assert_eq!(receipt.balance_of(&b), Some(40));
    assert_eq!(receipt.balance_of(&AccountId::new([3; 20])), None);
}
