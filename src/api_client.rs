//! The launchpad's RPC surface as seen by a client.
//!
//! [`HttpLaunchpadApi`] talks to a running server; [`LocalApi`] calls the
//! services in-process and is what the integration tests drive.

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::chain::ChainService;
use crate::errors::{ErrorBody, LaunchpadError};
use crate::launches::LaunchService;
use crate::orchestrator::DeployOrchestrator;
use crate::presets::{curve_presets, FEE_DISTRIBUTION};
use crate::swap::SwapService;
use crate::types::{
    BalanceRequest, BuildSwapRequest, BuiltSwap, ChainStatus, ChainSupply, ConfirmDeployRequest,
    ConfirmDeployResponse, CreateLaunchRequest, CurvePreset, FeeDistribution, IdRequest,
    IdResponse, Launch, ListAllRequest, PoolPrice, PoolPriceEntry, PrepareDeployRequest,
    PrepareDeployResponse, PriceRequest, PricesRequest, QuoteRequest, RecoverDeployRequest,
    RecoverDeployResponse, SuccessResponse, SwapQuote, TickerEntry, TickerRequest, TokenMetadata,
    UpdateLaunchRequest, WalletBalance,
};

type Result<T> = std::result::Result<T, LaunchpadError>;

#[async_trait]
pub trait LaunchpadApi: Send + Sync {
    async fn create_launch(&self, req: &CreateLaunchRequest) -> Result<IdResponse>;
    async fn update_launch(&self, req: &UpdateLaunchRequest) -> Result<SuccessResponse>;
    async fn delete_launch(&self, id: &str) -> Result<SuccessResponse>;
    async fn get_launch(&self, id_or_mint: &str) -> Result<Launch>;
    async fn list_launches(&self) -> Result<Vec<Launch>>;
    async fn list_all(&self, req: &ListAllRequest) -> Result<Vec<Launch>>;
    async fn ticker(&self, req: &TickerRequest) -> Result<Vec<TickerEntry>>;
    async fn metadata(&self, id: &str) -> Result<TokenMetadata>;

    async fn prepare_deploy(&self, req: &PrepareDeployRequest) -> Result<PrepareDeployResponse>;
    async fn confirm_deploy(&self, req: &ConfirmDeployRequest) -> Result<ConfirmDeployResponse>;
    async fn recover_deploy(&self, req: &RecoverDeployRequest) -> Result<RecoverDeployResponse>;

    async fn price(&self, req: &PriceRequest) -> Result<PoolPrice>;
    async fn quote(&self, req: &QuoteRequest) -> Result<SwapQuote>;
    async fn build_swap(&self, req: &BuildSwapRequest) -> Result<BuiltSwap>;
    async fn prices(&self, req: &PricesRequest) -> Result<Vec<PoolPriceEntry>>;

    async fn chain_status(&self) -> Result<ChainStatus>;
    async fn chain_supply(&self) -> Result<ChainSupply>;
    async fn balance(&self, address: &str) -> Result<WalletBalance>;

    async fn curve_presets(&self) -> Result<Vec<CurvePreset>>;
    async fn fee_distribution(&self) -> Result<FeeDistribution>;
}

/// HTTP client for a launchpad server.
#[derive(Debug, Clone)]
pub struct HttpLaunchpadApi {
    http: Client,
    base_url: String,
    auth_header: String,
    caller: Option<String>,
}

impl HttpLaunchpadApi {
    pub fn new(base_url: &str, auth_header: &str, caller: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_header: auth_header.to_string(),
            caller,
        })
    }

    async fn call<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let mut req = self.http.post(format!("{}{}", self.base_url, path)).json(body);
        if let Some(caller) = &self.caller {
            req = req.header(self.auth_header.as_str(), caller.as_str());
        }
        let resp = req
            .send()
            .await
            .map_err(|e| LaunchpadError::upstream(e.to_string()))?;
        Self::decode(path, resp).await
    }

    async fn decode<T: DeserializeOwned>(path: &str, resp: reqwest::Response) -> Result<T> {
        let status = resp.status();
        if status.is_success() {
            return resp
                .json::<T>()
                .await
                .map_err(|e| LaunchpadError::upstream(format!("invalid response from {}: {}", path, e)));
        }
        let text = resp.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => {
                debug!(path, code = %body.code, "launchpad call failed");
                Err(LaunchpadError::from_body(body))
            }
            Err(_) => {
                warn!(path, status = status.as_u16(), "unexpected error response: {}", text);
                Err(LaunchpadError::upstream(format!("HTTP {}", status.as_u16())))
            }
        }
    }
}

#[async_trait]
impl LaunchpadApi for HttpLaunchpadApi {
    async fn create_launch(&self, req: &CreateLaunchRequest) -> Result<IdResponse> {
        self.call("/rpc/launch/create", req).await
    }

    async fn update_launch(&self, req: &UpdateLaunchRequest) -> Result<SuccessResponse> {
        self.call("/rpc/launch/update", req).await
    }

    async fn delete_launch(&self, id: &str) -> Result<SuccessResponse> {
        self.call("/rpc/launch/delete", &IdRequest { id: id.to_string() }).await
    }

    async fn get_launch(&self, id_or_mint: &str) -> Result<Launch> {
        self.call("/rpc/launch/get", &IdRequest { id: id_or_mint.to_string() }).await
    }

    async fn list_launches(&self) -> Result<Vec<Launch>> {
        self.call("/rpc/launch/list", &serde_json::json!({})).await
    }

    async fn list_all(&self, req: &ListAllRequest) -> Result<Vec<Launch>> {
        self.call("/rpc/launch/listAll", req).await
    }

    async fn ticker(&self, req: &TickerRequest) -> Result<Vec<TickerEntry>> {
        self.call("/rpc/launch/ticker", req).await
    }

    async fn metadata(&self, id: &str) -> Result<TokenMetadata> {
        let path = format!("/api/metadata/{}", id);
        let resp = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .map_err(|e| LaunchpadError::upstream(e.to_string()))?;
        Self::decode(&path, resp).await
    }

    async fn prepare_deploy(&self, req: &PrepareDeployRequest) -> Result<PrepareDeployResponse> {
        self.call("/rpc/launch/prepareDeploy", req).await
    }

    async fn confirm_deploy(&self, req: &ConfirmDeployRequest) -> Result<ConfirmDeployResponse> {
        self.call("/rpc/launch/confirmDeploy", req).await
    }

    async fn recover_deploy(&self, req: &RecoverDeployRequest) -> Result<RecoverDeployResponse> {
        self.call("/rpc/launch/recoverDeploy", req).await
    }

    async fn price(&self, req: &PriceRequest) -> Result<PoolPrice> {
        self.call("/rpc/pool/price", req).await
    }

    async fn quote(&self, req: &QuoteRequest) -> Result<SwapQuote> {
        self.call("/rpc/pool/quote", req).await
    }

    async fn build_swap(&self, req: &BuildSwapRequest) -> Result<BuiltSwap> {
        self.call("/rpc/pool/buildSwap", req).await
    }

    async fn prices(&self, req: &PricesRequest) -> Result<Vec<PoolPriceEntry>> {
        self.call("/rpc/pool/prices", req).await
    }

    async fn chain_status(&self) -> Result<ChainStatus> {
        self.call("/rpc/chain/status", &serde_json::json!({})).await
    }

    async fn chain_supply(&self) -> Result<ChainSupply> {
        self.call("/rpc/chain/supply", &serde_json::json!({})).await
    }

    async fn balance(&self, address: &str) -> Result<WalletBalance> {
        self.call(
            "/rpc/chain/balance",
            &BalanceRequest {
                address: address.to_string(),
            },
        )
        .await
    }

    async fn curve_presets(&self) -> Result<Vec<CurvePreset>> {
        self.call("/rpc/config/curvePresets", &serde_json::json!({})).await
    }

    async fn fee_distribution(&self) -> Result<FeeDistribution> {
        self.call("/rpc/config/feeDistribution", &serde_json::json!({})).await
    }
}

/// In-process API bound to one caller identity.
#[derive(Clone)]
pub struct LocalApi {
    caller: Option<String>,
    orchestrator: Arc<DeployOrchestrator>,
    launches: Arc<LaunchService>,
    swaps: Arc<SwapService>,
    chain: Arc<ChainService>,
}

impl LocalApi {
    pub fn new(
        caller: Option<String>,
        orchestrator: Arc<DeployOrchestrator>,
        launches: Arc<LaunchService>,
        swaps: Arc<SwapService>,
        chain: Arc<ChainService>,
    ) -> Self {
        Self {
            caller,
            orchestrator,
            launches,
            swaps,
            chain,
        }
    }

    /// Same services, different caller.
    pub fn as_caller(&self, caller: Option<String>) -> Self {
        Self {
            caller,
            ..self.clone()
        }
    }

    fn caller(&self) -> Result<&str> {
        self.caller.as_deref().ok_or(LaunchpadError::Unauthorized)
    }
}

#[async_trait]
impl LaunchpadApi for LocalApi {
    async fn create_launch(&self, req: &CreateLaunchRequest) -> Result<IdResponse> {
        self.launches.create(self.caller()?, req).await
    }

    async fn update_launch(&self, req: &UpdateLaunchRequest) -> Result<SuccessResponse> {
        self.launches.update(self.caller()?, &req.id, &req.patch).await
    }

    async fn delete_launch(&self, id: &str) -> Result<SuccessResponse> {
        self.launches.delete(self.caller()?, id).await
    }

    async fn get_launch(&self, id_or_mint: &str) -> Result<Launch> {
        self.launches.get(id_or_mint).await
    }

    async fn list_launches(&self) -> Result<Vec<Launch>> {
        self.launches.list(self.caller()?).await
    }

    async fn list_all(&self, req: &ListAllRequest) -> Result<Vec<Launch>> {
        self.launches.list_all(req.limit, req.status).await
    }

    async fn ticker(&self, req: &TickerRequest) -> Result<Vec<TickerEntry>> {
        self.launches.ticker(req.limit).await
    }

    async fn metadata(&self, id: &str) -> Result<TokenMetadata> {
        self.launches.metadata(id).await
    }

    async fn prepare_deploy(&self, req: &PrepareDeployRequest) -> Result<PrepareDeployResponse> {
        self.orchestrator
            .prepare(self.caller()?, &req.id, &req.creator_wallet)
            .await
    }

    async fn confirm_deploy(&self, req: &ConfirmDeployRequest) -> Result<ConfirmDeployResponse> {
        self.orchestrator
            .confirm_deploy(self.caller()?, &req.id, &req.pool_address, &req.token_mint, &req.signature)
            .await
    }

    async fn recover_deploy(&self, req: &RecoverDeployRequest) -> Result<RecoverDeployResponse> {
        self.orchestrator
            .recover_deploy(self.caller()?, &req.id, &req.pool_address, &req.token_mint)
            .await
    }

    async fn price(&self, req: &PriceRequest) -> Result<PoolPrice> {
        self.swaps.price(&req.pool_address).await
    }

    async fn quote(&self, req: &QuoteRequest) -> Result<SwapQuote> {
        self.swaps.quote(&req.pool_address, &req.amount, req.swap_type).await
    }

    async fn build_swap(&self, req: &BuildSwapRequest) -> Result<BuiltSwap> {
        self.swaps
            .build_swap(&req.pool_address, &req.user_wallet, &req.amount, req.swap_type, req.slippage_bps)
            .await
    }

    async fn prices(&self, req: &PricesRequest) -> Result<Vec<PoolPriceEntry>> {
        self.swaps.prices(&req.pool_addresses).await
    }

    async fn chain_status(&self) -> Result<ChainStatus> {
        self.chain.status().await
    }

    async fn chain_supply(&self) -> Result<ChainSupply> {
        self.chain.supply().await
    }

    async fn balance(&self, address: &str) -> Result<WalletBalance> {
        self.chain.balance(address).await
    }

    async fn curve_presets(&self) -> Result<Vec<CurvePreset>> {
        Ok(curve_presets())
    }

    async fn fee_distribution(&self) -> Result<FeeDistribution> {
        Ok(FEE_DISTRIBUTION)
    }
}
