//! Logical state snapshot.

use std::time::{SystemTime, UNIX_EPOCH};

use l2core_ledger::LedgerSnapshot;
use l2core_registry::RegistrySnapshot;
use l2core_types::{BlockRecord, H256};
use serde::{Deserialize, Serialize};

use crate::{Result, StorageError};

/// Current on-disk format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Everything a node needs to resume
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSnapshot {
    /// Accounts and receipts
    pub ledger: LedgerSnapshot,
    /// Validators, delegations, deployments and credential records
    pub registry: RegistrySnapshot,
    /// Committed blocks, oldest first
    pub blocks: Vec<BlockRecord>,
}

impl NodeSnapshot {
    /// Assemble a snapshot
    pub fn new(ledger: LedgerSnapshot, registry: RegistrySnapshot, blocks: Vec<BlockRecord>) -> Self {
        Self {
            ledger,
            registry,
            blocks,
        }
    }

    /// Number of the latest block, 0 if none
    pub fn height(&self) -> u64 {
        self.blocks.last().map_or(0, |b| b.number)
    }

    /// Keccak-256 of the JSON encoding
    pub fn digest(&self) -> Result<H256> {
        let bytes = serde_json::to_vec(self)?;
        Ok(H256::keccak256(&bytes))
    }

    /// Blocks form one chain starting at 1, each hash matching its contents
    pub fn verify_chain(&self) -> bool {
        let mut parent = H256::NIL;
        for (i, block) in self.blocks.iter().enumerate() {
            if block.number != i as u64 + 1 || block.parent_hash != parent || !block.verify_hash() {
                return false;
            }
            parent = block.hash;
        }
        true
    }
}

/// Envelope written to disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredState {
    /// Format version
    pub version: u32,
    /// Latest block number at save time
    pub height: u64,
    /// Save time in Unix milliseconds
    pub saved_at: u64,
    /// Digest of `snapshot`
    pub digest: H256,
    /// The state itself
    pub snapshot: NodeSnapshot,
}

impl StoredState {
    /// Wrap a snapshot for writing
    pub fn seal(snapshot: NodeSnapshot) -> Result<Self> {
        let saved_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Ok(Self {
            version: SNAPSHOT_VERSION,
            height: snapshot.height(),
            saved_at,
            digest: snapshot.digest()?,
            snapshot,
        })
    }

    /// Check version and digest, returning the snapshot
    pub fn open(self) -> Result<NodeSnapshot> {
        if self.version != SNAPSHOT_VERSION {
            return Err(StorageError::UnsupportedVersion(self.version));
        }
        let actual = self.snapshot.digest()?;
        if actual != self.digest {
            return Err(StorageError::Corrupted {
                expected: self.digest,
                actual,
            });
        }
        Ok(self.snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(number: u64, parent_hash: H256) -> BlockRecord {
        let txs = vec![H256::keccak256(&number.to_be_bytes())];
        BlockRecord {
            number,
            hash: BlockRecord::compute_hash(number, &parent_hash, 1_000 + number, &txs),
            parent_hash,
            timestamp: 1_000 + number,
            transactions: txs,
            stake_snapshot: Vec::new(),
            total_stake: 100,
            approving_stake: 100,
        }
    }

    fn chain(len: u64) -> Vec<BlockRecord> {
        let mut blocks = Vec::new();
        let mut parent = H256::NIL;
        for n in 1..=len {
            let b = block(n, parent);
            parent = b.hash;
            blocks.push(b);
        }
        blocks
    }

    #[test]
    fn test_height_and_chain() {
        let snapshot = NodeSnapshot {
            blocks: chain(3),
            ..Default::default()
        };
        assert_eq!(snapshot.height(), 3);
        assert!(snapshot.verify_chain());
        assert_eq!(NodeSnapshot::default().height(), 0);
    }

    #[test]
    fn test_broken_chain_detected() {
        let mut blocks = chain(3);
        blocks.remove(1);
        let snapshot = NodeSnapshot {
            blocks,
            ..Default::default()
        };
        assert!(!snapshot.verify_chain());
    }

    #[test]
    fn test_seal_and_open() {
        let snapshot = NodeSnapshot {
            blocks: chain(2),
            ..Default::default()
        };
        let sealed = StoredState::seal(snapshot.clone()).unwrap();
        assert_eq!(sealed.height, 2);
        assert_eq!(sealed.open().unwrap(), snapshot);
    }

    #[test]
    fn test_tampered_snapshot_rejected() {
        let mut sealed = StoredState::seal(NodeSnapshot {
            blocks: chain(1),
            ..Default::default()
        })
        .unwrap();
        sealed.snapshot.blocks[0].approving_stake = 1;
        assert!(matches!(sealed.open(), Err(StorageError::Corrupted { .. })));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut sealed = StoredState::seal(NodeSnapshot::default()).unwrap();
        sealed.version = 99;
        assert!(matches!(
            sealed.open(),
            Err(StorageError::UnsupportedVersion(99))
        ));
    }
}
