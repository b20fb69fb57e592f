//! HTTP surface: one POST route per procedure plus the metadata document.

use actix_web::{
    dev::Payload, get, http::header, http::StatusCode, post, web, App, FromRequest, HttpRequest,
    HttpResponse, HttpServer, ResponseError,
};
use serde_json::json;
use std::future::{ready, Ready};
use std::sync::Arc;
use tracing::{error, info};

use crate::chain::ChainService;
use crate::errors::LaunchpadError;
use crate::launches::LaunchService;
use crate::metrics::metrics;
use crate::orchestrator::DeployOrchestrator;
use crate::presets::{curve_presets, FEE_DISTRIBUTION};
use crate::swap::SwapService;
use crate::types::{
    BalanceRequest, BuildSwapRequest, ConfirmDeployRequest, CreateLaunchRequest, IdRequest,
    ListAllRequest, PrepareDeployRequest, PriceRequest, PricesRequest, QuoteRequest,
    RecoverDeployRequest, TickerRequest, UpdateLaunchRequest,
};

type HandlerResult = Result<HttpResponse, LaunchpadError>;

pub struct AppState {
    pub launches: Arc<LaunchService>,
    pub orchestrator: Arc<DeployOrchestrator>,
    pub swaps: Arc<SwapService>,
    pub chain: Arc<ChainService>,
    pub auth_header: String,
}

impl ResponseError for LaunchpadError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(LaunchpadError::status_code(self)).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        if let LaunchpadError::Internal(inner) = self {
            error!("internal error: {:#}", inner);
        }
        HttpResponse::build(ResponseError::status_code(self)).json(self.to_body())
    }
}

/// Authenticated caller id taken from the configured identity header.
#[derive(Debug, Clone)]
pub struct Caller(pub String);

impl FromRequest for Caller {
    type Error = LaunchpadError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let caller = req
            .app_data::<web::Data<AppState>>()
            .and_then(|state| req.headers().get(state.auth_header.as_str()))
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Caller(v.to_string()))
            .ok_or(LaunchpadError::Unauthorized);
        if caller.is_err() {
            metrics().record_error(LaunchpadError::Unauthorized.category());
        }
        ready(caller)
    }
}

fn ok<T: serde::Serialize>(value: T) -> HandlerResult {
    Ok(HttpResponse::Ok().json(value))
}

#[post("/rpc/launch/create")]
async fn create_launch(state: web::Data<AppState>, caller: Caller, body: web::Json<CreateLaunchRequest>) -> HandlerResult {
    ok(state.launches.create(&caller.0, &body).await?)
}

#[post("/rpc/launch/update")]
async fn update_launch(state: web::Data<AppState>, caller: Caller, body: web::Json<UpdateLaunchRequest>) -> HandlerResult {
    ok(state.launches.update(&caller.0, &body.id, &body.patch).await?)
}

#[post("/rpc/launch/delete")]
async fn delete_launch(state: web::Data<AppState>, caller: Caller, body: web::Json<IdRequest>) -> HandlerResult {
    ok(state.launches.delete(&caller.0, &body.id).await?)
}

#[post("/rpc/launch/get")]
async fn get_launch(state: web::Data<AppState>, body: web::Json<IdRequest>) -> HandlerResult {
    ok(state.launches.get(&body.id).await?)
}

#[post("/rpc/launch/list")]
async fn list_launches(state: web::Data<AppState>, caller: Caller) -> HandlerResult {
    ok(state.launches.list(&caller.0).await?)
}

#[post("/rpc/launch/listAll")]
async fn list_all(state: web::Data<AppState>, body: Option<web::Json<ListAllRequest>>) -> HandlerResult {
    let req = body.map(web::Json::into_inner).unwrap_or_default();
    ok(state.launches.list_all(req.limit, req.status).await?)
}

#[post("/rpc/launch/ticker")]
async fn ticker(state: web::Data<AppState>, body: Option<web::Json<TickerRequest>>) -> HandlerResult {
    let req = body.map(web::Json::into_inner).unwrap_or_default();
    ok(state.launches.ticker(req.limit).await?)
}

#[post("/rpc/launch/prepareDeploy")]
async fn prepare_deploy(state: web::Data<AppState>, caller: Caller, body: web::Json<PrepareDeployRequest>) -> HandlerResult {
    ok(state.orchestrator.prepare(&caller.0, &body.id, &body.creator_wallet).await?)
}

#[post("/rpc/launch/confirmDeploy")]
async fn confirm_deploy(state: web::Data<AppState>, caller: Caller, body: web::Json<ConfirmDeployRequest>) -> HandlerResult {
    ok(state
        .orchestrator
        .confirm_deploy(&caller.0, &body.id, &body.pool_address, &body.token_mint, &body.signature)
        .await?)
}

#[post("/rpc/launch/recoverDeploy")]
async fn recover_deploy(state: web::Data<AppState>, caller: Caller, body: web::Json<RecoverDeployRequest>) -> HandlerResult {
    ok(state
        .orchestrator
        .recover_deploy(&caller.0, &body.id, &body.pool_address, &body.token_mint)
        .await?)
}

#[post("/rpc/pool/price")]
async fn pool_price(state: web::Data<AppState>, body: web::Json<PriceRequest>) -> HandlerResult {
    ok(state.swaps.price(&body.pool_address).await?)
}

#[post("/rpc/pool/prices")]
async fn pool_prices(state: web::Data<AppState>, body: web::Json<PricesRequest>) -> HandlerResult {
    ok(state.swaps.prices(&body.pool_addresses).await?)
}

#[post("/rpc/pool/quote")]
async fn swap_quote(state: web::Data<AppState>, body: web::Json<QuoteRequest>) -> HandlerResult {
    ok(state.swaps.quote(&body.pool_address, &body.amount, body.swap_type).await?)
}

#[post("/rpc/pool/buildSwap")]
async fn build_swap(state: web::Data<AppState>, body: web::Json<BuildSwapRequest>) -> HandlerResult {
    ok(state
        .swaps
        .build_swap(&body.pool_address, &body.user_wallet, &body.amount, body.swap_type, body.slippage_bps)
        .await?)
}

#[post("/rpc/chain/status")]
async fn chain_status(state: web::Data<AppState>) -> HandlerResult {
    ok(state.chain.status().await?)
}

#[post("/rpc/chain/supply")]
async fn chain_supply(state: web::Data<AppState>) -> HandlerResult {
    ok(state.chain.supply().await?)
}

#[post("/rpc/chain/balance")]
async fn chain_balance(state: web::Data<AppState>, body: web::Json<BalanceRequest>) -> HandlerResult {
    ok(state.chain.balance(&body.address).await?)
}

#[post("/rpc/config/curvePresets")]
async fn config_curve_presets() -> HandlerResult {
    ok(curve_presets())
}

#[post("/rpc/config/feeDistribution")]
async fn config_fee_distribution() -> HandlerResult {
    ok(FEE_DISTRIBUTION)
}

#[get("/api/metadata/{id}")]
async fn token_metadata(state: web::Data<AppState>, id: web::Path<String>) -> HandlerResult {
    let meta = state.launches.metadata(&id).await?;
    Ok(HttpResponse::Ok()
        .insert_header((header::CACHE_CONTROL, "public, max-age=31536000, immutable"))
        .json(meta))
}

#[get("/health")]
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

#[get("/metrics")]
async fn metrics_snapshot() -> HttpResponse {
    HttpResponse::Ok().json(metrics().export_metrics())
}

/// Register every route and the JSON body error mapping.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        LaunchpadError::validation("body", err.to_string()).into()
    }))
    .service(create_launch)
    .service(update_launch)
    .service(delete_launch)
    .service(get_launch)
    .service(list_launches)
    .service(list_all)
    .service(ticker)
    .service(prepare_deploy)
    .service(confirm_deploy)
    .service(recover_deploy)
    .service(pool_price)
    .service(pool_prices)
    .service(swap_quote)
    .service(build_swap)
    .service(chain_status)
    .service(chain_supply)
    .service(chain_balance)
    .service(config_curve_presets)
    .service(config_fee_distribution)
    .service(token_metadata)
    .service(health)
    .service(metrics_snapshot);
}

pub async fn run(state: AppState, bind_address: &str) -> std::io::Result<()> {
    let state = web::Data::new(state);
    info!("listening on {}", bind_address);
    HttpServer::new(move || App::new().app_data(state.clone()).configure(configure))
        .bind(bind_address)?
        .run()
        .await
}
