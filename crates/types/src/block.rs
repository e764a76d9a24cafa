//! Block records and transaction receipts.

use crate::{AccountId, Amount, TxKind, ValidatorId, H256};
use serde::{Deserialize, Serialize};

/// Immutable proof that a transaction was applied exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Canonical hash of the applied transaction
    pub tx_hash: H256,
    /// Block the transaction was committed in
    pub block_number: u64,
    /// Transaction kind
    pub kind: TxKind,
    /// Resulting balance of every account the transaction touched
    pub balances: Vec<(AccountId, Amount)>,
}

impl Receipt {
    /// Returns the resulting balance of `account`, if it was touched.
    pub fn balance_of(&self, account: &AccountId) -> Option<Amount> {
        self.balances
            .iter()
            .find(|(a, _)| a == account)
            .map(|(_, b)| *b)
    }
}

/// Audit record of a committed block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    /// Block number, starting at 1
    pub number: u64,
    /// Block hash
    pub hash: H256,
    /// Hash of the previous block, [`H256::NIL`] for the first block
    pub parent_hash: H256,
    /// Commit time in Unix milliseconds
    pub timestamp: u64,
    /// Hashes of the transactions that produced receipts, in order
    pub transactions: Vec<H256>,
    /// Effective stake of every validator in the voting snapshot
    pub stake_snapshot: Vec<(ValidatorId, Amount)>,
    /// Sum of the snapshot's effective stake
    pub total_stake: Amount,
    /// Stake that approved the block
    pub approving_stake: Amount,
}

impl BlockRecord {
    /// Computes a block hash over number, parent, timestamp and transaction hashes.
    pub fn compute_hash(number: u64, parent_hash: &H256, timestamp: u64, txs: &[H256]) -> H256 {
        let number = number.to_be_bytes();
        let timestamp = timestamp.to_be_bytes();
        let mut parts: Vec<&[u8]> = Vec::with_capacity(3 + txs.len());
        parts.push(&number);
        parts.push(parent_hash.as_bytes());
        parts.push(&timestamp);
        parts.extend(txs.iter().map(|h| h.as_bytes()));
        H256::keccak256_concat(&parts)
    }

    /// Returns true if the stored hash matches the block contents.
    pub fn verify_hash(&self) -> bool {
        self.hash
            == Self::compute_hash(
                self.number,
                &self.parent_hash,
                self.timestamp,
                &self.transactions,
            )
    }

    /// Number of transactions in the block.
    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }
}
