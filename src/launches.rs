use chrono::Utc;
use futures::future::join_all;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::LaunchpadError;
use crate::metrics::metrics;
use crate::protocol::PoolProtocol;
use crate::store::LaunchStore;
use crate::types::{
    CreateLaunchRequest, IdResponse, Launch, LaunchPatch, LaunchStatus, SuccessResponse,
    TickerEntry, TokenMetadata, CURVE_PRESET_STANDARD,
};
use crate::validation::{validate_create, validate_patch};

type Result<T> = std::result::Result<T, LaunchpadError>;

pub const DEFAULT_LIST_LIMIT: u32 = 50;
pub const MAX_LIST_LIMIT: u32 = 100;
pub const DEFAULT_TICKER_LIMIT: u32 = 20;
pub const MAX_TICKER_LIMIT: u32 = 20;

fn check_limit(limit: Option<u32>, default: u32, max: u32) -> Result<u32> {
    match limit {
        None => Ok(default),
        Some(l) if (1..=max).contains(&l) => Ok(l),
        Some(_) => Err(LaunchpadError::validation(
            "limit",
            format!("limit must be between 1 and {}", max),
        )),
    }
}

/// Launch ids are UUIDs; anything else is treated as a token mint.
fn looks_like_id(value: &str) -> bool {
    value.len() == 36 && value.contains('-')
}

/// Launch CRUD plus the public read endpoints.
pub struct LaunchService {
    store: Arc<dyn LaunchStore>,
    protocol: Arc<dyn PoolProtocol>,
    symbol_suffix: String,
}

impl LaunchService {
    pub fn new(store: Arc<dyn LaunchStore>, protocol: Arc<dyn PoolProtocol>, symbol_suffix: &str) -> Self {
        Self {
            store,
            protocol,
            symbol_suffix: symbol_suffix.to_string(),
        }
    }

    async fn owned_pending(&self, caller: &str, id: &str, conflict: &str) -> Result<Launch> {
        let launch = self
            .store
            .get_owned(id, caller)
            .await?
            .ok_or_else(|| LaunchpadError::not_found("Launch not found"))?;
        if !launch.status.is_pending() {
            return Err(LaunchpadError::conflict(conflict));
        }
        Ok(launch)
    }

    pub async fn create(&self, caller: &str, input: &CreateLaunchRequest) -> Result<IdResponse> {
        let input = validate_create(input)?;
        let launch = Launch {
            id: uuid::Uuid::new_v4().to_string(),
            creator_id: caller.to_string(),
            name: input.name,
            symbol: input.symbol,
            description: input.description,
            image: input.image,
            curve_preset: CURVE_PRESET_STANDARD.to_string(),
            charity_wallet: input.charity_wallet,
            charity_name: input.charity_name,
            status: LaunchStatus::Pending,
            pool_address: None,
            token_mint: None,
            created_at: Utc::now(),
            migrated_at: None,
        };
        self.store.insert(&launch).await?;
        metrics().increment_counter("launch_created_total");
        debug!(launch_id = %launch.id, creator = caller, "launch created");
        Ok(IdResponse { id: launch.id })
    }

    pub async fn update(&self, caller: &str, id: &str, patch: &LaunchPatch) -> Result<SuccessResponse> {
        const CONFLICT: &str = "Cannot update active launch";
        self.owned_pending(caller, id, CONFLICT).await?;
        let patch = validate_patch(patch)?;
        if patch.is_empty() {
            return Ok(SuccessResponse { success: true });
        }
        if !self.store.update_pending(id, caller, &patch).await? {
            return Err(LaunchpadError::conflict(CONFLICT));
        }
        Ok(SuccessResponse { success: true })
    }

    pub async fn delete(&self, caller: &str, id: &str) -> Result<SuccessResponse> {
        const CONFLICT: &str = "Cannot delete active launch";
        self.owned_pending(caller, id, CONFLICT).await?;
        if !self.store.delete_pending(id, caller).await? {
            return Err(LaunchpadError::conflict(CONFLICT));
        }
        Ok(SuccessResponse { success: true })
    }

    pub async fn get(&self, id_or_mint: &str) -> Result<Launch> {
        let found = if looks_like_id(id_or_mint) {
            self.store.get(id_or_mint).await?
        } else {
            self.store.get_by_mint(id_or_mint).await?
        };
        found.ok_or_else(|| LaunchpadError::not_found("Launch not found"))
    }

    pub async fn list(&self, caller: &str) -> Result<Vec<Launch>> {
        Ok(self.store.list_by_creator(caller).await?)
    }

    pub async fn list_all(&self, limit: Option<u32>, status: Option<LaunchStatus>) -> Result<Vec<Launch>> {
        let limit = check_limit(limit, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT)?;
        Ok(self.store.list(status, limit).await?)
    }

    /// Active launches with their live price; unreadable pools price at zero.
    pub async fn ticker(&self, limit: Option<u32>) -> Result<Vec<TickerEntry>> {
        let limit = check_limit(limit, DEFAULT_TICKER_LIMIT, MAX_TICKER_LIMIT)?;
        let active: Vec<Launch> = self
            .store
            .list(Some(LaunchStatus::Active), limit)
            .await?
            .into_iter()
            .filter(|l| l.pool_address.is_some())
            .collect();

        let protocol = &self.protocol;
        let entries = join_all(active.into_iter().map(|l| async move {
            let price = match l.pool_address.as_deref().map(Pubkey::from_str) {
                Some(Ok(pool)) => match protocol.pool_price(&pool).await {
                    Ok(p) => p,
                    Err(e) => {
                        warn!(pool = %pool, "ticker price lookup failed: {}", e);
                        None
                    }
                },
                _ => None,
            };
            TickerEntry {
                id: l.id,
                symbol: l.symbol,
                name: l.name,
                pool_address: l.pool_address,
                price: price.as_ref().map_or(0.0, |p| p.spot_price),
                liquidity_sol: price.as_ref().map_or(0.0, |p| p.pool_liquidity_sol),
            }
        }))
        .await;
        Ok(entries)
    }

    /// Token metadata JSON served at the URI baked into the create-pool transaction.
    pub async fn metadata(&self, id_or_file: &str) -> Result<TokenMetadata> {
        let id = id_or_file.strip_suffix(".json").unwrap_or(id_or_file);
        let launch = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| LaunchpadError::not_found("Not found"))?;
        Ok(TokenMetadata {
            name: launch.name,
            symbol: format!("{}{}", launch.symbol, self.symbol_suffix),
            description: launch.description.unwrap_or_default(),
            image: launch.image.unwrap_or_default(),
        })
    }
}
