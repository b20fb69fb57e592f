//! Read-only cluster views: slot and epoch position, SOL supply, wallet balances.

use std::sync::Arc;

use solana_sdk::native_token::LAMPORTS_PER_SOL;
use tracing::debug;

use crate::errors::LaunchpadError;
use crate::ledger::LedgerClient;
use crate::types::{ChainStatus, ChainSupply, WalletBalance};
use crate::validation::parse_pubkey;

type Result<T> = std::result::Result<T, LaunchpadError>;

pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

pub struct ChainService {
    ledger: Arc<dyn LedgerClient>,
}

impl ChainService {
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self { ledger }
    }

    pub async fn status(&self) -> Result<ChainStatus> {
        let snapshot = self
            .ledger
            .cluster_snapshot()
            .await
            .map_err(|e| LaunchpadError::upstream(e.to_string()))?;

        let epoch_progress = if snapshot.slots_in_epoch == 0 {
            0.0
        } else {
            snapshot.slot_index as f64 / snapshot.slots_in_epoch as f64 * 100.0
        };
        debug!(slot = snapshot.slot, epoch = snapshot.epoch, "cluster status read");
        Ok(ChainStatus {
            slot: snapshot.slot,
            block_height: snapshot.block_height,
            epoch: snapshot.epoch,
            slot_index: snapshot.slot_index,
            slots_in_epoch: snapshot.slots_in_epoch,
            epoch_progress,
            solana_version: snapshot.solana_version,
        })
    }

    pub async fn supply(&self) -> Result<ChainSupply> {
        let supply = self
            .ledger
            .supply()
            .await
            .map_err(|e| LaunchpadError::upstream(e.to_string()))?;
        Ok(ChainSupply {
            total: lamports_to_sol(supply.total),
            circulating: lamports_to_sol(supply.circulating),
            non_circulating: lamports_to_sol(supply.non_circulating),
        })
    }

    pub async fn balance(&self, address: &str) -> Result<WalletBalance> {
        let pubkey = parse_pubkey("address", address)?;
        let lamports = self
            .ledger
            .balance(&pubkey)
            .await
            .map_err(|e| LaunchpadError::upstream(e.to_string()))?;
        Ok(WalletBalance {
            address: address.to_string(),
            lamports,
            sol: lamports_to_sol(lamports),
        })
    }
}
