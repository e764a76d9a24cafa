//! In-memory public chain.

use super::{ChainError, ChainResult, ExternalTransfer, PublicChainClient};
use async_trait::async_trait;
use l2core_types::{Amount, H256};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Default)]
struct MockState {
    balances: HashMap<String, Amount>,
    broadcasts: Vec<ExternalTransfer>,
    offline: bool,
    latency: Option<Duration>,
}

/// In-memory [`PublicChainClient`] for tests and local runs.
///
/// Transfers move balances immediately. The mock can be switched offline or
/// given artificial latency to exercise caller timeouts.
#[derive(Debug, Default)]
pub struct MockPublicChain {
    state: RwLock<MockState>,
}

impl MockPublicChain {
    /// Create an empty mock chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an account's balance.
    pub fn set_balance(&self, account: &str, amount: Amount) {
        self.state
            .write()
            .balances
            .insert(account.to_lowercase(), amount);
    }

    /// Make every call fail with [`ChainError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.state.write().offline = offline;
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.state.write().latency = latency;
    }

    /// Transfers broadcast so far.
    pub fn broadcasts(&self) -> Vec<ExternalTransfer> {
        self.state.read().broadcasts.clone()
    }

    async fn simulate_network(&self) -> ChainResult<()> {
        // Copy out before awaiting so no lock is held across the sleep
        let (offline, latency) = {
            let state = self.state.read();
            (state.offline, state.latency)
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if offline {
            return Err(ChainError::Unavailable("mock chain offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl PublicChainClient for MockPublicChain {
    async fn get_balance(&self, account: &str) -> ChainResult<Amount> {
        self.simulate_network().await?;
        self.state
            .read()
            .balances
            .get(&account.to_lowercase())
            .copied()
            .ok_or_else(|| ChainError::UnknownAccount(account.to_string()))
    }

    async fn broadcast_transfer(&self, transfer: ExternalTransfer) -> ChainResult<String> {
        self.simulate_network().await?;
        if transfer.signature.is_empty() {
            return Err(ChainError::Rejected("missing signature".into()));
        }

        let mut state = self.state.write();
        let from = transfer.from.to_lowercase();
        let to = transfer.to.to_lowercase();
        let available = state.balances.get(&from).copied().unwrap_or(0);
        if available < transfer.amount {
            return Err(ChainError::Rejected(format!(
                "insufficient funds: {} < {}",
                available, transfer.amount
            )));
        }
        state.balances.insert(from, available - transfer.amount);
        let credited = state.balances.entry(to).or_insert(0);
        *credited = credited.saturating_add(transfer.amount);

        let id = H256::keccak256_concat(&[
            transfer.from.as_bytes(),
            transfer.to.as_bytes(),
            &transfer.amount.to_be_bytes(),
            &(state.broadcasts.len() as u64).to_be_bytes(),
        ]);
        debug!(external_tx = %id, amount = transfer.amount, "mock chain accepted transfer");
        state.broadcasts.push(transfer);
        Ok(id.to_hex())
    }
}
