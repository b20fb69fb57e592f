//! Launchpad server: wires store, pool protocol, ledger and services behind the HTTP routes.

use std::sync::Arc;

use anyhow::{anyhow, Context};
use solana_sdk::pubkey::Pubkey;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use parity_launchpad::chain::ChainService;
use parity_launchpad::config::{Config, ProtocolMode, StorageMode};
use parity_launchpad::launches::LaunchService;
use parity_launchpad::ledger::{LedgerClient, RpcLedger};
use parity_launchpad::orchestrator::{DeployOrchestrator, DeploySettings};
use parity_launchpad::protocol::http::GatewayPoolProtocol;
use parity_launchpad::protocol::memory::InMemoryPoolProtocol;
use parity_launchpad::protocol::PoolProtocol;
use parity_launchpad::server::{self, AppState};
use parity_launchpad::store::memory::InMemoryLaunchStore;
use parity_launchpad::store::postgres::PostgresLaunchStore;
use parity_launchpad::store::LaunchStore;
use parity_launchpad::swap::SwapService;
use parity_launchpad::tx_builder::TransactionAssembler;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let mut cfg = Config::load()?;

    let store: Arc<dyn LaunchStore> = match cfg.storage_mode {
        StorageMode::Memory => {
            warn!("Using in-memory launch store; data is lost on restart");
            Arc::new(InMemoryLaunchStore::new())
        }
        StorageMode::Postgres => {
            let url = cfg
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow!("database_url is required for postgres storage"))?;
            let pg = PostgresLaunchStore::connect(url).await?;
            pg.ensure_schema().await.context("failed to apply launch schema")?;
            info!("Database connected");
            Arc::new(pg)
        }
    };

    let protocol: Arc<dyn PoolProtocol> = match cfg.protocol_mode {
        ProtocolMode::Mock => {
            let mock = InMemoryPoolProtocol::new(true);
            let config_key = match cfg.pool_config_address.as_deref() {
                Some(s) => s
                    .parse::<Pubkey>()
                    .map_err(|e| anyhow!("invalid pool_config_address: {}", e))?,
                None => {
                    let key = Pubkey::new_unique();
                    cfg.pool_config_address = Some(key.to_string());
                    key
                }
            };
            mock.insert_config(InMemoryPoolProtocol::standard_config(config_key)).await;
            info!(config = %config_key, "Starting with MOCK pool protocol");
            Arc::new(mock)
        }
        ProtocolMode::Http => {
            let url = cfg
                .protocol_gateway_url
                .as_deref()
                .ok_or_else(|| anyhow!("protocol_gateway_url is required for http protocol mode"))?;
            info!(gateway = url, "Starting with protocol gateway");
            Arc::new(GatewayPoolProtocol::new(url, cfg.rpc_timeout())?)
        }
    };

    let ledger: Arc<dyn LedgerClient> = Arc::new(RpcLedger::new(&cfg));
    let assembler = Arc::new(TransactionAssembler::new(ledger.clone(), &cfg));
    let settings = DeploySettings::from_config(&cfg)?;

    let state = AppState {
        launches: Arc::new(LaunchService::new(store.clone(), protocol.clone(), &cfg.symbol_suffix)),
        orchestrator: Arc::new(DeployOrchestrator::new(store, protocol.clone(), assembler.clone(), settings)),
        swaps: Arc::new(SwapService::new(protocol, assembler, &cfg)),
        chain: Arc::new(ChainService::new(ledger)),
        auth_header: cfg.auth_header.clone(),
    };

    info!(
        storage = ?cfg.storage_mode,
        protocol = ?cfg.protocol_mode,
        tx_format = ?cfg.tx_format,
        endpoints = cfg.rpc_endpoints.len(),
        "Loaded config"
    );
    server::run(state, &cfg.bind_address).await?;
    Ok(())
}
