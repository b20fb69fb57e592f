use async_trait::async_trait;
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    curve, derive_pool_address, CreatePoolParams, PoolConfig, PoolProtocol, PoolState,
    ProtocolError, QuoteResult, SwapParams, NATIVE_MINT,
};
use crate::tx_builder::spl_memo;
use crate::types::{PoolPrice, SwapSide};

pub const DEFAULT_TOTAL_SUPPLY: u64 = 1_000_000_000_000_000;

/// Pool protocol kept entirely in memory. Created pools are staged until they
/// "land": immediately with `auto_land`, otherwise when `mark_landed` is called.
#[derive(Default)]
pub struct InMemoryPoolProtocol {
    configs: RwLock<HashMap<Pubkey, PoolConfig>>,
    pools: RwLock<HashMap<Pubkey, PoolState>>,
    staged: RwLock<HashMap<Pubkey, PoolState>>,
    auto_land: bool,
}

impl InMemoryPoolProtocol {
    pub fn new(auto_land: bool) -> Self {
        Self {
            auto_land,
            ..Default::default()
        }
    }

    /// A config with the platform's standard curve parameters.
    pub fn standard_config(address: Pubkey) -> PoolConfig {
        PoolConfig {
            address,
            quote_mint: NATIVE_MINT,
            fee_bps: 100,
            virtual_quote_reserve: 30_000_000_000,
            migration_quote_threshold: 85_000_000_000,
        }
    }

    pub async fn insert_config(&self, config: PoolConfig) {
        self.configs.write().await.insert(config.address, config);
    }

    pub async fn insert_pool(&self, pool: PoolState) {
        self.pools.write().await.insert(pool.address, pool);
    }

    /// Promote a staged pool to on-chain. Returns false if nothing was staged.
    pub async fn mark_landed(&self, pool_address: &Pubkey) -> bool {
        let staged = self.staged.write().await.remove(pool_address);
        match staged {
            Some(pool) => {
                self.pools.write().await.insert(pool.address, pool);
                true
            }
            None => false,
        }
    }

    pub async fn staged_pools(&self) -> Vec<Pubkey> {
        self.staged.read().await.keys().copied().collect()
    }

    pub async fn pool_count(&self) -> usize {
        self.pools.read().await.len()
    }

    async fn require_pool_and_config(
        &self,
        pool_address: &Pubkey,
    ) -> Result<(PoolState, PoolConfig), ProtocolError> {
        let pool = self
            .get_pool(pool_address)
            .await?
            .ok_or(ProtocolError::PoolNotFound(*pool_address))?;
        let config = self
            .get_pool_config(&pool.config)
            .await?
            .ok_or(ProtocolError::ConfigNotFound(pool.config))?;
        Ok((pool, config))
    }
}

#[async_trait]
impl PoolProtocol for InMemoryPoolProtocol {
    async fn create_pool(&self, params: &CreatePoolParams) -> Result<Vec<Instruction>, ProtocolError> {
        let config = self
            .get_pool_config(&params.config)
            .await?
            .ok_or(ProtocolError::ConfigNotFound(params.config))?;
        let address = derive_pool_address(&params.config, &params.base_mint, &config.quote_mint);

        let memo = format!(
            "create_pool:{}:{}:{}:{}",
            params.name, params.symbol, params.uri, address
        );
        let mut ix = spl_memo::build_memo(memo.as_bytes(), &[&params.payer]);
        ix.accounts = vec![
            AccountMeta::new(params.payer, true),
            AccountMeta::new(params.base_mint, true),
            AccountMeta::new_readonly(params.pool_creator, false),
            AccountMeta::new_readonly(params.config, false),
        ];

        let pool = PoolState {
            address,
            config: params.config,
            base_mint: params.base_mint,
            creator: params.pool_creator,
            base_reserve: DEFAULT_TOTAL_SUPPLY,
            quote_reserve: 0,
            total_supply: DEFAULT_TOTAL_SUPPLY,
            is_migrated: false,
        };
        if self.auto_land {
            self.pools.write().await.insert(address, pool);
        } else {
            self.staged.write().await.insert(address, pool);
        }
        debug!(pool = %address, auto_land = self.auto_land, "in-memory pool created");
        Ok(vec![ix])
    }

    async fn swap(&self, params: &SwapParams) -> Result<Vec<Instruction>, ProtocolError> {
        if !self.pools.read().await.contains_key(&params.pool) {
            return Err(ProtocolError::PoolNotFound(params.pool));
        }
        let memo = format!(
            "swap:{}:{}:{}:{}",
            params.pool, params.side, params.amount_in, params.minimum_amount_out
        );
        let mut ix = spl_memo::build_memo(memo.as_bytes(), &[&params.owner]);
        ix.accounts = vec![
            AccountMeta::new(params.owner, true),
            AccountMeta::new(params.pool, false),
        ];
        Ok(vec![ix])
    }

    async fn get_pool(&self, address: &Pubkey) -> Result<Option<PoolState>, ProtocolError> {
        Ok(self.pools.read().await.get(address).cloned())
    }

    async fn get_pool_config(&self, address: &Pubkey) -> Result<Option<PoolConfig>, ProtocolError> {
        Ok(self.configs.read().await.get(address).cloned())
    }

    async fn swap_quote(
        &self,
        pool: &PoolState,
        config: &PoolConfig,
        side: SwapSide,
        amount_in: u64,
        slippage_bps: u16,
    ) -> Result<QuoteResult, ProtocolError> {
        Ok(curve::quote(pool, config, side, amount_in, slippage_bps))
    }

    async fn pool_price(&self, address: &Pubkey) -> Result<Option<PoolPrice>, ProtocolError> {
        match self.require_pool_and_config(address).await {
            Ok((pool, config)) => Ok(Some(PoolPrice {
                pool_address: address.to_string(),
                base_mint: pool.base_mint.to_string(),
                spot_price: curve::spot_price(&pool, &config),
                pool_liquidity_sol: curve::lamports_to_sol(pool.quote_reserve),
                total_supply: pool.total_supply as f64 / 10f64.powi(super::BASE_DECIMALS as i32),
            })),
            Err(ProtocolError::PoolNotFound(_)) | Err(ProtocolError::ConfigNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(config: Pubkey) -> CreatePoolParams {
        let creator = Pubkey::new_unique();
        CreatePoolParams {
            name: "Alpha".to_string(),
            symbol: "ALPHAᴾ".to_string(),
            uri: "https://parity.sh/api/metadata/x.json".to_string(),
            payer: creator,
            pool_creator: creator,
            config,
            base_mint: Pubkey::new_unique(),
        }
    }

    #[tokio::test]
    async fn staged_pool_is_invisible_until_landed() {
        let protocol = InMemoryPoolProtocol::new(false);
        let config = Pubkey::new_unique();
        protocol.insert_config(InMemoryPoolProtocol::standard_config(config)).await;

        let p = params(config);
        let ixs = protocol.create_pool(&p).await.unwrap();
        assert!(ixs[0].accounts.iter().any(|a| a.pubkey == p.base_mint && a.is_signer));

        let address = derive_pool_address(&config, &p.base_mint, &NATIVE_MINT);
        assert!(protocol.get_pool(&address).await.unwrap().is_none());
        assert!(protocol.mark_landed(&address).await);
        assert!(protocol.get_pool(&address).await.unwrap().is_some());
        assert!(protocol.pool_price(&address).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn create_requires_known_config() {
        let protocol = InMemoryPoolProtocol::new(true);
        let err = protocol.create_pool(&params(Pubkey::new_unique())).await.unwrap_err();
        assert!(matches!(err, ProtocolError::ConfigNotFound(_)));
    }
}
