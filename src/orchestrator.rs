//! Server side of the deploy lifecycle: prepare an unsigned create-pool
//! transaction, then move the launch to `active` once the pool is visible,
//! either through the normal confirmation or through recovery.

use anyhow::{anyhow, Result as AnyResult};
use serde_json::json;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::errors::LaunchpadError;
use crate::metrics::{metrics, Timer};
use crate::protocol::{derive_pool_address, verify_pool_created, CreatePoolParams, PoolProtocol};
use crate::store::LaunchStore;
use crate::structured_logging::PipelineContext;
use crate::tx_builder::TransactionAssembler;
use crate::types::{
    ConfirmDeployResponse, Launch, PrepareDeployResponse, RecoverDeployResponse,
};
use crate::validation::{check_signature, parse_pubkey};

type Result<T> = std::result::Result<T, LaunchpadError>;

#[derive(Debug, Clone)]
pub struct DeploySettings {
    pub pool_config: Option<Pubkey>,
    pub metadata_base_url: String,
    pub symbol_suffix: String,
    pub recover_attempts: u32,
    pub recover_delay: Duration,
    pub confirm_attempts: u32,
    pub confirm_delay: Duration,
}

impl DeploySettings {
    pub fn from_config(cfg: &Config) -> AnyResult<Self> {
        let pool_config = cfg
            .pool_config_address
            .as_deref()
            .map(|s| Pubkey::from_str(s).map_err(|e| anyhow!("invalid pool_config_address: {}", e)))
            .transpose()?;
        Ok(Self {
            pool_config,
            metadata_base_url: cfg.metadata_base_url.trim_end_matches('/').to_string(),
            symbol_suffix: cfg.symbol_suffix.clone(),
            recover_attempts: cfg.recover_verify_attempts,
            recover_delay: Duration::from_millis(cfg.recover_verify_delay_ms),
            confirm_attempts: cfg.confirm_verify_attempts,
            confirm_delay: Duration::from_millis(cfg.confirm_verify_delay_ms),
        })
    }

    pub fn metadata_uri(&self, launch_id: &str) -> String {
        format!("{}/{}.json", self.metadata_base_url, launch_id)
    }
}

pub struct DeployOrchestrator {
    store: Arc<dyn LaunchStore>,
    protocol: Arc<dyn PoolProtocol>,
    assembler: Arc<TransactionAssembler>,
    settings: DeploySettings,
}

fn observe<T>(result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        metrics().record_error(e.category());
        if let LaunchpadError::Internal(inner) = e {
            warn!("deploy orchestrator internal error: {:#}", inner);
        }
    }
    result
}

impl DeployOrchestrator {
    pub fn new(
        store: Arc<dyn LaunchStore>,
        protocol: Arc<dyn PoolProtocol>,
        assembler: Arc<TransactionAssembler>,
        settings: DeploySettings,
    ) -> Self {
        Self {
            store,
            protocol,
            assembler,
            settings,
        }
    }

    async fn owned_launch(&self, caller: &str, launch_id: &str) -> Result<Launch> {
        self.store
            .get_owned(launch_id, caller)
            .await?
            .ok_or_else(|| LaunchpadError::not_found("Launch not found"))
    }

    pub async fn prepare(
        &self,
        caller: &str,
        launch_id: &str,
        creator_wallet: &str,
    ) -> Result<PrepareDeployResponse> {
        let timer = Timer::new("deploy_prepare_ms");
        let result = observe(self.prepare_inner(caller, launch_id, creator_wallet).await);
        timer.finish();
        result
    }

    async fn prepare_inner(
        &self,
        caller: &str,
        launch_id: &str,
        creator_wallet: &str,
    ) -> Result<PrepareDeployResponse> {
        let ctx = PipelineContext::new("deploy_prepare");
        metrics().increment_counter("deploy_prepare_total");

        let creator = parse_pubkey("creatorWallet", creator_wallet)?;
        let launch = self.owned_launch(caller, launch_id).await?;
        if !launch.status.is_pending() {
            return Err(LaunchpadError::conflict("Already deployed"));
        }

        // An earlier attempt may have landed without being confirmed.
        if let Some((pool, mint)) = launch.staked_addresses() {
            if let Ok(pool_key) = Pubkey::from_str(pool) {
                let exists = verify_pool_created(
                    self.protocol.as_ref(),
                    &pool_key,
                    self.settings.recover_attempts,
                    self.settings.recover_delay,
                    &ctx.logger,
                )
                .await;
                if exists {
                    self.store.activate(launch_id, caller, pool, mint).await?;
                    ctx.logger.log_deploy_activated(launch_id, pool, "prepare");
                    metrics().increment_counter("deploy_already_deployed_total");
                    return Ok(PrepareDeployResponse {
                        transaction: String::new(),
                        base_mint: mint.to_string(),
                        pool_address: pool.to_string(),
                        launch_id: launch_id.to_string(),
                        already_deployed: true,
                        last_valid_block_height: 0,
                    });
                }
            }
        }

        let config_key = self
            .settings
            .pool_config
            .ok_or_else(|| LaunchpadError::build_failed("Pool config address not configured"))?;
        let pool_config = self
            .protocol
            .get_pool_config(&config_key)
            .await
            .map_err(|e| LaunchpadError::build_failed(e.to_string()))?
            .ok_or_else(|| LaunchpadError::build_failed("Pool config not found on-chain"))?;

        let base_mint = Keypair::new();
        let pool_address =
            derive_pool_address(&config_key, &base_mint.pubkey(), &pool_config.quote_mint);

        let params = CreatePoolParams {
            name: launch.name.clone(),
            symbol: format!("{}{}", launch.symbol, self.settings.symbol_suffix),
            uri: self.settings.metadata_uri(launch_id),
            payer: creator,
            pool_creator: creator,
            config: config_key,
            base_mint: base_mint.pubkey(),
        };
        let instructions = self
            .protocol
            .create_pool(&params)
            .await
            .map_err(|e| LaunchpadError::build_failed(e.to_string()))?;

        let assembled = self
            .assembler
            .assemble(&creator, instructions, &[&base_mint])
            .await
            .map_err(|e| LaunchpadError::build_failed(e.to_string()))?;

        let pool_str = pool_address.to_string();
        let mint_str = base_mint.pubkey().to_string();
        if !self
            .store
            .stage_addresses(launch_id, caller, &pool_str, &mint_str)
            .await?
        {
            return Err(LaunchpadError::conflict("Already deployed"));
        }

        ctx.logger.log_deploy_prepared(launch_id, &pool_str, &mint_str);
        Ok(PrepareDeployResponse {
            transaction: assembled.transaction,
            base_mint: mint_str,
            pool_address: pool_str,
            launch_id: launch_id.to_string(),
            already_deployed: false,
            last_valid_block_height: assembled.last_valid_block_height,
        })
    }

    pub async fn confirm_deploy(
        &self,
        caller: &str,
        launch_id: &str,
        pool_address: &str,
        token_mint: &str,
        signature: &str,
    ) -> Result<ConfirmDeployResponse> {
        observe(
            self.confirm_inner(caller, launch_id, pool_address, token_mint, signature)
                .await,
        )
    }

    async fn confirm_inner(
        &self,
        caller: &str,
        launch_id: &str,
        pool_address: &str,
        token_mint: &str,
        signature: &str,
    ) -> Result<ConfirmDeployResponse> {
        let ctx = PipelineContext::new("deploy_confirm");
        metrics().increment_counter("deploy_confirm_total");

        let pool_key = parse_pubkey("poolAddress", pool_address)?;
        parse_pubkey("tokenMint", token_mint)?;
        check_signature(signature)?;

        let launch = self.owned_launch(caller, launch_id).await?;
        if !launch.status.is_pending() {
            return Err(LaunchpadError::conflict("Already deployed"));
        }

        let exists = verify_pool_created(
            self.protocol.as_ref(),
            &pool_key,
            self.settings.confirm_attempts,
            self.settings.confirm_delay,
            &ctx.logger,
        )
        .await;
        if !exists {
            return Err(LaunchpadError::validation("poolAddress", "Pool not found on-chain"));
        }

        if !self
            .store
            .activate(launch_id, caller, pool_address, token_mint)
            .await?
        {
            // A concurrent recovery may have activated the same pool first.
            let current = self.owned_launch(caller, launch_id).await?;
            if current.pool_address.as_deref() != Some(pool_address) {
                return Err(LaunchpadError::conflict("Already deployed"));
            }
        }

        ctx.logger.log_deploy_activated(launch_id, pool_address, "confirm");
        ctx.logger.info("deploy_confirmed", json!({ "signature": signature }));
        info!(launch_id, pool_address, "launch deployed");
        Ok(ConfirmDeployResponse {
            success: true,
            pool_address: pool_address.to_string(),
        })
    }

    pub async fn recover_deploy(
        &self,
        caller: &str,
        launch_id: &str,
        pool_address: &str,
        token_mint: &str,
    ) -> Result<RecoverDeployResponse> {
        observe(
            self.recover_inner(caller, launch_id, pool_address, token_mint)
                .await,
        )
    }

    async fn recover_inner(
        &self,
        caller: &str,
        launch_id: &str,
        pool_address: &str,
        token_mint: &str,
    ) -> Result<RecoverDeployResponse> {
        let ctx = PipelineContext::new("deploy_recover");
        metrics().increment_counter("deploy_recover_total");

        let pool_key = parse_pubkey("poolAddress", pool_address)?;
        parse_pubkey("tokenMint", token_mint)?;

        let launch = self.owned_launch(caller, launch_id).await?;
        if !launch.status.is_pending() {
            return Ok(RecoverDeployResponse::already_active());
        }

        let exists = verify_pool_created(
            self.protocol.as_ref(),
            &pool_key,
            self.settings.recover_attempts,
            self.settings.recover_delay,
            &ctx.logger,
        )
        .await;
        if !exists {
            return Ok(RecoverDeployResponse::not_found());
        }

        if !self
            .store
            .activate(launch_id, caller, pool_address, token_mint)
            .await?
        {
            // Lost a race with confirm; the launch is active either way.
            return Ok(RecoverDeployResponse::already_active());
        }

        metrics().increment_counter("deploy_recovered_total");
        ctx.logger.log_deploy_activated(launch_id, pool_address, "recover");
        Ok(RecoverDeployResponse::recovered())
    }
}
