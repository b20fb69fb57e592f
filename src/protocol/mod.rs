//! Bonding-curve pool protocol access.
//!
//! [`PoolProtocol`] is the seam between the launchpad and the Dynamic Bonding
//! Curve program: it builds create-pool and swap instructions and reads pool
//! state. [`http::GatewayPoolProtocol`] talks to the protocol gateway,
//! [`memory::InMemoryPoolProtocol`] keeps pools in memory for local runs.

pub mod curve;
pub mod http;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use solana_sdk::{instruction::Instruction, pubkey, pubkey::Pubkey};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::structured_logging::StructuredLogger;
use crate::types::{PoolPrice, SwapSide};

/// Meteora Dynamic Bonding Curve program.
pub const DBC_PROGRAM_ID: Pubkey = pubkey!("dbcij3LWUppWqq96dh6gJWwBifmcGfLSB5D4DuSMaqN");
/// Wrapped SOL, the quote mint of every launch pool.
pub const NATIVE_MINT: Pubkey = pubkey!("So11111111111111111111111111111111111111112");

pub const BASE_DECIMALS: u32 = 6;
pub const QUOTE_DECIMALS: u32 = 9;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("pool config {0} not found on-chain")]
    ConfigNotFound(Pubkey),
    #[error("pool {0} not found")]
    PoolNotFound(Pubkey),
    #[error("instruction building failed: {0}")]
    InstructionBuild(String),
    #[error("unexpected signer account: {0}")]
    UnexpectedSigner(Pubkey),
    #[error("pool address mismatch: derived {derived}, gateway returned {reported}")]
    AddressMismatch { derived: Pubkey, reported: Pubkey },
    #[error("gateway returned {status}: {body}")]
    Gateway { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
}

/// On-chain pool account, reduced to what the launchpad reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolState {
    pub address: Pubkey,
    pub config: Pubkey,
    pub base_mint: Pubkey,
    pub creator: Pubkey,
    /// Base tokens still held by the curve
    pub base_reserve: u64,
    /// Quote lamports deposited by buyers
    pub quote_reserve: u64,
    pub total_supply: u64,
    pub is_migrated: bool,
}

/// Pool config account shared by every launch created against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub address: Pubkey,
    pub quote_mint: Pubkey,
    pub fee_bps: u16,
    /// Virtual quote liquidity added on top of the real reserve when pricing
    pub virtual_quote_reserve: u64,
    pub migration_quote_threshold: u64,
}

#[derive(Debug, Clone)]
pub struct CreatePoolParams {
    pub name: String,
    pub symbol: String,
    pub uri: String,
    pub payer: Pubkey,
    pub pool_creator: Pubkey,
    pub config: Pubkey,
    pub base_mint: Pubkey,
}

#[derive(Debug, Clone)]
pub struct SwapParams {
    pub pool: Pubkey,
    pub owner: Pubkey,
    pub amount_in: u64,
    pub minimum_amount_out: u64,
    pub side: SwapSide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResult {
    pub amount_in: u64,
    pub amount_out: u64,
    pub minimum_amount_out: u64,
    pub fee: u64,
}

#[async_trait]
pub trait PoolProtocol: Send + Sync {
    /// Instructions creating a pool and its base mint. `base_mint` must sign.
    async fn create_pool(&self, params: &CreatePoolParams) -> Result<Vec<Instruction>, ProtocolError>;

    async fn swap(&self, params: &SwapParams) -> Result<Vec<Instruction>, ProtocolError>;

    async fn get_pool(&self, address: &Pubkey) -> Result<Option<PoolState>, ProtocolError>;

    async fn get_pool_config(&self, address: &Pubkey) -> Result<Option<PoolConfig>, ProtocolError>;

    async fn swap_quote(
        &self,
        pool: &PoolState,
        config: &PoolConfig,
        side: SwapSide,
        amount_in: u64,
        slippage_bps: u16,
    ) -> Result<QuoteResult, ProtocolError>;

    async fn pool_price(&self, address: &Pubkey) -> Result<Option<PoolPrice>, ProtocolError>;
}

/// Deterministic pool PDA: `["pool", config, max(a, b), min(a, b)]`.
pub fn derive_pool_address(config: &Pubkey, base_mint: &Pubkey, quote_mint: &Pubkey) -> Pubkey {
    let (first, second) = if base_mint > quote_mint {
        (base_mint, quote_mint)
    } else {
        (quote_mint, base_mint)
    };
    Pubkey::find_program_address(
        &[b"pool", config.as_ref(), first.as_ref(), second.as_ref()],
        &DBC_PROGRAM_ID,
    )
    .0
}

/// Poll for the pool account. Read errors count as "not yet"; no sleep after the last attempt.
pub async fn verify_pool_created(
    protocol: &dyn PoolProtocol,
    pool_address: &Pubkey,
    attempts: u32,
    delay: Duration,
    logger: &StructuredLogger,
) -> bool {
    let attempts = attempts.max(1);
    for attempt in 1..=attempts {
        match protocol.get_pool(pool_address).await {
            Ok(Some(_)) => {
                logger.log_pool_verification(&pool_address.to_string(), attempt, true);
                return true;
            }
            Ok(None) => debug!(%pool_address, attempt, "pool not visible yet"),
            Err(e) => debug!(%pool_address, attempt, "pool read failed: {}", e),
        }
        if attempt < attempts {
            tokio::time::sleep(delay).await;
        }
    }
    logger.log_pool_verification(&pool_address.to_string(), attempts, false);
    false
}
