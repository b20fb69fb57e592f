use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::Config;
use crate::errors::LaunchpadError;
use crate::metrics::metrics;
use crate::protocol::{PoolConfig, PoolProtocol, PoolState, SwapParams};
use crate::tx_builder::TransactionAssembler;
use crate::types::{BuiltSwap, PoolPrice, PoolPriceEntry, SwapQuote, SwapSide};
use crate::validation::{check_slippage, parse_amount, parse_pubkey};

type Result<T> = std::result::Result<T, LaunchpadError>;

const QUOTE_FAILED: &str = "Failed to get swap quote";
pub const MAX_BATCH_PRICES: usize = 20;

pub struct SwapService {
    protocol: Arc<dyn PoolProtocol>,
    assembler: Arc<TransactionAssembler>,
    quote_slippage_bps: u16,
    default_slippage_bps: u16,
}

impl SwapService {
    pub fn new(protocol: Arc<dyn PoolProtocol>, assembler: Arc<TransactionAssembler>, config: &Config) -> Self {
        Self {
            protocol,
            assembler,
            quote_slippage_bps: config.quote_slippage_bps,
            default_slippage_bps: config.default_slippage_bps,
        }
    }

    /// Pool and its config, or `None` when either is missing or unreadable.
    async fn pool_and_config(&self, pool: &solana_sdk::pubkey::Pubkey) -> Option<(PoolState, PoolConfig)> {
        let state = self.protocol.get_pool(pool).await.ok().flatten()?;
        let config = self.protocol.get_pool_config(&state.config).await.ok().flatten()?;
        Some((state, config))
    }

    pub async fn quote(&self, pool_address: &str, amount: &str, side: SwapSide) -> Result<SwapQuote> {
        let pool = parse_pubkey("poolAddress", pool_address)?;
        let amount_in = parse_amount("amount", amount)?;

        let (state, config) = self
            .pool_and_config(&pool)
            .await
            .ok_or_else(|| LaunchpadError::not_found(QUOTE_FAILED))?;
        let q = self
            .protocol
            .swap_quote(&state, &config, side, amount_in, self.quote_slippage_bps)
            .await
            .map_err(|e| {
                debug!(%pool, "swap quote failed: {}", e);
                LaunchpadError::not_found(QUOTE_FAILED)
            })?;

        metrics().increment_counter("swap_quote_total");
        Ok(SwapQuote {
            in_amount: amount_in.to_string(),
            out_amount: q.amount_out.to_string(),
            min_out_amount: q.minimum_amount_out.to_string(),
        })
    }

    pub async fn build_swap(
        &self,
        pool_address: &str,
        user_wallet: &str,
        amount: &str,
        side: SwapSide,
        slippage_bps: Option<u16>,
    ) -> Result<BuiltSwap> {
        let pool = parse_pubkey("poolAddress", pool_address)?;
        let owner = parse_pubkey("userWallet", user_wallet)?;
        let amount_in = parse_amount("amount", amount)?;
        let slippage = check_slippage(slippage_bps.unwrap_or(self.default_slippage_bps))?;

        let state = self
            .protocol
            .get_pool(&pool)
            .await
            .map_err(|e| LaunchpadError::upstream(e.to_string()))?
            .ok_or_else(|| LaunchpadError::not_found("Pool not found"))?;
        let config = self
            .protocol
            .get_pool_config(&state.config)
            .await
            .map_err(|e| LaunchpadError::upstream(e.to_string()))?
            .ok_or_else(|| LaunchpadError::not_found("Pool config not found"))?;

        let q = self
            .protocol
            .swap_quote(&state, &config, side, amount_in, slippage)
            .await
            .map_err(|e| LaunchpadError::build_failed(e.to_string()))?;

        let params = SwapParams {
            pool,
            owner,
            amount_in,
            minimum_amount_out: q.minimum_amount_out,
            side,
        };
        let instructions = self
            .protocol
            .swap(&params)
            .await
            .map_err(|e| LaunchpadError::build_failed(e.to_string()))?;
        let assembled = self
            .assembler
            .assemble(&owner, instructions, &[])
            .await
            .map_err(|e| LaunchpadError::build_failed(e.to_string()))?;

        metrics().increment_counter("swap_built_total");
        debug!(%pool, %owner, side = %side, amount_in, min_out = q.minimum_amount_out, "swap built");
        Ok(BuiltSwap {
            transaction: assembled.transaction,
            in_amount: amount_in.to_string(),
            out_amount: q.amount_out.to_string(),
            min_out_amount: q.minimum_amount_out.to_string(),
            last_valid_block_height: assembled.last_valid_block_height,
        })
    }

    pub async fn price(&self, pool_address: &str) -> Result<PoolPrice> {
        let pool = parse_pubkey("poolAddress", pool_address)?;
        self.protocol
            .pool_price(&pool)
            .await
            .map_err(|e| LaunchpadError::upstream(e.to_string()))?
            .ok_or_else(|| LaunchpadError::not_found("Pool not found"))
    }

    /// Prices for several pools in one call. Pools that are missing or
    /// unreadable come back with no data instead of failing the batch.
    pub async fn prices(&self, pool_addresses: &[String]) -> Result<Vec<PoolPriceEntry>> {
        if pool_addresses.len() > MAX_BATCH_PRICES {
            return Err(LaunchpadError::validation(
                "poolAddresses",
                format!("At most {} pools per request", MAX_BATCH_PRICES),
            ));
        }
        let pools = pool_addresses
            .iter()
            .map(|a| parse_pubkey("poolAddresses", a))
            .collect::<Result<Vec<_>>>()?;

        let protocol = &self.protocol;
        let entries = join_all(pools.into_iter().zip(pool_addresses).map(|(pool, raw)| async move {
            let data = match protocol.pool_price(&pool).await {
                Ok(price) => price,
                Err(e) => {
                    warn!(%pool, "batch price lookup failed: {}", e);
                    None
                }
            };
            PoolPriceEntry {
                pool_address: raw.clone(),
                data,
            }
        }))
        .await;
        Ok(entries)
    }
}
