use solana_client::{
    client_error::{ClientError, ClientErrorKind},
    nonblocking::rpc_client::RpcClient,
    rpc_config::RpcSendTransactionConfig,
    rpc_request::{RpcError, RpcResponseErrorData},
};
use solana_sdk::{
    commitment_config::{CommitmentConfig, CommitmentLevel},
    hash::Hash,
    pubkey::Pubkey,
    signature::Signature,
    transaction::TransactionError,
};

use std::pin::Pin;
use std::time::Duration;
use std::{
    collections::HashMap,
    future::Future,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Instant,
};

use thiserror::Error;
use tokio::{sync::RwLock, task::JoinSet, time::timeout};
use tokio_retry::{
    strategy::{jitter, ExponentialBackoff},
    Retry,
};
use tracing::{debug, info, warn};

use crate::codec::WireTransaction;
use crate::config::Config;
use crate::metrics::metrics;

/// Classification of send failures for handling logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerErrorKind {
    AlreadyProcessed,
    DuplicateSignature,
    BlockhashNotFound,
    RateLimited,
    Other,
}

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("{message}")]
    Send {
        kind: LedgerErrorKind,
        message: String,
        logs: Vec<String>,
    },
    #[error("block height exceeded (last valid block height {last_valid_block_height})")]
    Expired { last_valid_block_height: u64 },
    #[error("transaction failed on-chain: {0}")]
    TransactionFailed(String),
    #[error("{0}")]
    Transport(String),
}

impl LedgerError {
    pub fn send(kind: LedgerErrorKind, message: impl Into<String>) -> Self {
        LedgerError::Send {
            kind,
            message: message.into(),
            logs: Vec::new(),
        }
    }

    pub fn kind(&self) -> LedgerErrorKind {
        match self {
            LedgerError::Send { kind, .. } => *kind,
            _ => LedgerErrorKind::Other,
        }
    }

    /// The transaction may already have landed; outcome must be checked, not assumed.
    pub fn is_ambiguous(&self) -> bool {
        matches!(
            self.kind(),
            LedgerErrorKind::AlreadyProcessed | LedgerErrorKind::DuplicateSignature
        )
    }

    /// Human-facing reason: the first program error log if any, else the message.
    pub fn reason(&self) -> String {
        match self {
            LedgerError::Send { logs, message, .. } => {
                extract_program_log(logs).unwrap_or_else(|| message.clone())
            }
            other => other.to_string(),
        }
    }
}

/// First program log line that mentions an error.
pub fn extract_program_log(logs: &[String]) -> Option<String> {
    logs.iter().find(|l| l.contains("Error")).cloned()
}

fn classify_message(message: &str) -> LedgerErrorKind {
    let msg = message.to_lowercase();
    if msg.contains("already processed")
        || msg.contains("already been processed")
        || msg.contains("alreadyprocessed")
    {
        LedgerErrorKind::AlreadyProcessed
    } else if msg.contains("duplicate signature") {
        LedgerErrorKind::DuplicateSignature
    } else if msg.contains("blockhash not found") {
        LedgerErrorKind::BlockhashNotFound
    } else if msg.contains("rate limit") || msg.contains("too many requests") {
        LedgerErrorKind::RateLimited
    } else {
        LedgerErrorKind::Other
    }
}

/// Classify a ClientError, looking at the structured transaction error before the text.
pub fn classify_client_error(error: &ClientError) -> LedgerError {
    let mut logs = Vec::new();
    let mut message = error.to_string();

    let structured = match error.get_transaction_error() {
        Some(TransactionError::AlreadyProcessed) => Some(LedgerErrorKind::AlreadyProcessed),
        Some(TransactionError::BlockhashNotFound) => Some(LedgerErrorKind::BlockhashNotFound),
        _ => None,
    };

    match error.kind() {
        ClientErrorKind::RpcError(RpcError::RpcResponseError {
            message: rpc_message,
            data,
            ..
        }) => {
            message = rpc_message.clone();
            if let RpcResponseErrorData::SendTransactionPreflightFailure(sim) = data {
                logs = sim.logs.clone().unwrap_or_default();
            }
        }
        ClientErrorKind::Reqwest(e) if e.status().map(|s| s.as_u16()) == Some(429) => {
            return LedgerError::Send {
                kind: LedgerErrorKind::RateLimited,
                message,
                logs,
            };
        }
        _ => {}
    }

    let kind = structured.unwrap_or_else(|| classify_message(&message));
    LedgerError::Send {
        kind,
        message,
        logs,
    }
}

pub type LedgerFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, LedgerError>> + Send + 'a>>;

/// Cluster position as reported by one RPC node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSnapshot {
    pub slot: u64,
    pub block_height: u64,
    pub epoch: u64,
    pub slot_index: u64,
    pub slots_in_epoch: u64,
    pub solana_version: String,
}

/// SOL supply in lamports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupplySnapshot {
    pub total: u64,
    pub circulating: u64,
    pub non_circulating: u64,
}

/// Ledger access used by the assembler and the submission controller.
/// Allows injecting mock implementations for tests.
pub trait LedgerClient: Send + Sync + std::fmt::Debug {
    /// Latest blockhash and the last block height at which it is still valid.
    fn latest_blockhash<'a>(&'a self) -> LedgerFuture<'a, (Hash, u64)>;

    fn send_transaction<'a>(
        &'a self,
        tx: &'a WireTransaction,
        skip_preflight: bool,
    ) -> LedgerFuture<'a, Signature>;

    /// Resolves once the signature is confirmed, fails once the block height
    /// passes `last_valid_block_height` or the transaction errors on-chain.
    fn confirm_transaction<'a>(
        &'a self,
        signature: Signature,
        blockhash: Hash,
        last_valid_block_height: u64,
    ) -> LedgerFuture<'a, ()>;

    fn cluster_snapshot<'a>(&'a self) -> LedgerFuture<'a, ClusterSnapshot>;

    fn supply<'a>(&'a self) -> LedgerFuture<'a, SupplySnapshot>;

    /// Lamport balance of `address`.
    fn balance<'a>(&'a self, address: &'a Pubkey) -> LedgerFuture<'a, u64>;
}

fn read_failed(what: &str, endpoint: &str, error: ClientError) -> LedgerError {
    debug!(endpoint = %endpoint, "{} read failed: {}", what, error);
    LedgerError::Transport(format!("{} read failed: {}", what, error))
}

/// Production ledger that broadcasts to multiple HTTP RPC endpoints with connection pooling.
pub struct RpcLedger {
    pub endpoints: Vec<String>,
    client_pool: Arc<RwLock<HashMap<String, Arc<RpcClient>>>>,
    rotation: AtomicUsize,
    rpc_timeout: Duration,
    retry_attempts: usize,
    poll_interval: Duration,
}

impl std::fmt::Debug for RpcLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcLedger")
            .field("endpoints", &self.endpoints)
            .field("client_pool_size", &"<pool>")
            .finish()
    }
}

impl RpcLedger {
    pub fn new(config: &Config) -> Self {
        Self {
            endpoints: config.rpc_endpoints.clone(),
            client_pool: Arc::new(RwLock::new(HashMap::new())),
            rotation: AtomicUsize::new(0),
            rpc_timeout: config.rpc_timeout(),
            retry_attempts: config.rpc_retry_attempts.max(1),
            poll_interval: Duration::from_millis(config.confirm_poll_interval_ms),
        }
    }

    async fn client_for(
        pool: &RwLock<HashMap<String, Arc<RpcClient>>>,
        endpoint: &str,
        rpc_timeout: Duration,
    ) -> Arc<RpcClient> {
        {
            let pool = pool.read().await;
            if let Some(client) = pool.get(endpoint) {
                return client.clone();
            }
        }

        let client = Arc::new(RpcClient::new_with_timeout_and_commitment(
            endpoint.to_string(),
            rpc_timeout,
            CommitmentConfig::confirmed(),
        ));
        let mut pool = pool.write().await;
        // Another task may have created it meanwhile
        if let Some(existing) = pool.get(endpoint) {
            return existing.clone();
        }
        pool.insert(endpoint.to_string(), client.clone());
        client
    }

    async fn next_client(&self) -> Result<(String, Arc<RpcClient>), LedgerError> {
        if self.endpoints.is_empty() {
            return Err(LedgerError::Transport("no RPC endpoints configured".to_string()));
        }
        let index = self.rotation.fetch_add(1, Ordering::Relaxed) % self.endpoints.len();
        let endpoint = self.endpoints[index].clone();
        let client = Self::client_for(&self.client_pool, &endpoint, self.rpc_timeout).await;
        Ok((endpoint, client))
    }
}

impl LedgerClient for RpcLedger {
    fn latest_blockhash<'a>(&'a self) -> LedgerFuture<'a, (Hash, u64)> {
        Box::pin(async move {
            let mut last_err = None;

            for attempt in 0..self.retry_attempts {
                let (endpoint, client) = self.next_client().await?;

                let retry_strategy = ExponentialBackoff::from_millis(50)
                    .max_delay(Duration::from_millis(1000))
                    .map(jitter)
                    .take(3);

                match Retry::spawn(retry_strategy, || async {
                    client
                        .get_latest_blockhash_with_commitment(CommitmentConfig::confirmed())
                        .await
                })
                .await
                {
                    Ok(pair) => return Ok(pair),
                    Err(e) => {
                        debug!(attempt, endpoint = %endpoint, "Blockhash fetch failed: {}", e);
                        last_err = Some(e.to_string());
                    }
                }
            }

            Err(LedgerError::Transport(format!(
                "all RPC endpoints failed to return a blockhash: {}",
                last_err.unwrap_or_default()
            )))
        })
    }

    fn send_transaction<'a>(
        &'a self,
        tx: &'a WireTransaction,
        skip_preflight: bool,
    ) -> LedgerFuture<'a, Signature> {
        Box::pin(async move {
            if self.endpoints.is_empty() {
                return Err(LedgerError::Transport("no RPC endpoints configured".to_string()));
            }

            let send_cfg = RpcSendTransactionConfig {
                skip_preflight,
                preflight_commitment: Some(CommitmentLevel::Confirmed),
                max_retries: Some(0),
                ..Default::default()
            };

            let mut set: JoinSet<Result<Signature, LedgerError>> = JoinSet::new();
            for (i, endpoint) in self.endpoints.iter().cloned().enumerate() {
                let tx = tx.clone();
                let pool = self.client_pool.clone();
                let rpc_timeout = self.rpc_timeout;

                set.spawn(async move {
                    let client = RpcLedger::client_for(&pool, &endpoint, rpc_timeout).await;
                    debug!("RpcLedger: sending tx on endpoint[{}]: {}", i, endpoint);

                    let start_time = Instant::now();
                    let sent = match &tx {
                        WireTransaction::Versioned(v) => {
                            timeout(rpc_timeout, client.send_transaction_with_config(v, send_cfg)).await
                        }
                        WireTransaction::Legacy(l) => {
                            timeout(rpc_timeout, client.send_transaction_with_config(l, send_cfg)).await
                        }
                    };
                    match sent {
                        Ok(Ok(sig)) => {
                            let latency_ms = start_time.elapsed().as_millis() as u64;
                            info!("RpcLedger: success on {}: {} ({}ms)", endpoint, sig, latency_ms);
                            Ok(sig)
                        }
                        Ok(Err(e)) => {
                            warn!("RpcLedger: endpoint {} failed: {}", endpoint, e);
                            Err(classify_client_error(&e))
                        }
                        Err(_elapsed) => {
                            warn!("RpcLedger: endpoint {} timed out after {:?}", endpoint, rpc_timeout);
                            Err(LedgerError::Transport("RPC send timeout".to_string()))
                        }
                    }
                });
            }

            // An ambiguous answer from any endpoint outranks plain failures from the rest.
            let mut first_err: Option<LedgerError> = None;
            while let Some(join_res) = set.join_next().await {
                match join_res {
                    Ok(Ok(sig)) => {
                        set.abort_all();
                        metrics().increment_counter("ledger_send_success_total");
                        return Ok(sig);
                    }
                    Ok(Err(e)) => {
                        let replace = match &first_err {
                            None => true,
                            Some(prev) => e.is_ambiguous() && !prev.is_ambiguous(),
                        };
                        if replace {
                            first_err = Some(e);
                        }
                    }
                    Err(join_err) => {
                        warn!("RpcLedger: task join error: {}", join_err);
                    }
                }
            }

            metrics().increment_counter("ledger_send_errors_total");
            Err(first_err
                .unwrap_or_else(|| LedgerError::Transport("all sends failed".to_string())))
        })
    }

    fn confirm_transaction<'a>(
        &'a self,
        signature: Signature,
        blockhash: Hash,
        last_valid_block_height: u64,
    ) -> LedgerFuture<'a, ()> {
        Box::pin(async move {
            const MAX_CONSECUTIVE_FAILURES: u32 = 20;
            let mut failures = 0u32;
            debug!(%signature, %blockhash, last_valid_block_height, "RpcLedger: awaiting confirmation");

            loop {
                let (endpoint, client) = self.next_client().await?;

                match client.get_signature_statuses(&[signature]).await {
                    Ok(resp) => {
                        failures = 0;
                        if let Some(Some(status)) = resp.value.first() {
                            if let Some(err) = &status.err {
                                return Err(LedgerError::TransactionFailed(err.to_string()));
                            }
                            if status.satisfies_commitment(CommitmentConfig::confirmed()) {
                                return Ok(());
                            }
                        }
                    }
                    Err(e) => {
                        failures += 1;
                        debug!(endpoint = %endpoint, "signature status poll failed: {}", e);
                    }
                }

                match client.get_block_height().await {
                    Ok(height) if height > last_valid_block_height => {
                        return Err(LedgerError::Expired {
                            last_valid_block_height,
                        });
                    }
                    Ok(_) => {}
                    Err(e) => {
                        failures += 1;
                        debug!(endpoint = %endpoint, "block height poll failed: {}", e);
                    }
                }

                if failures >= MAX_CONSECUTIVE_FAILURES {
                    return Err(LedgerError::Transport(format!(
                        "confirmation polling failed {} times in a row",
                        failures
                    )));
                }

                tokio::time::sleep(self.poll_interval).await;
            }
        })
    }

    fn cluster_snapshot<'a>(&'a self) -> LedgerFuture<'a, ClusterSnapshot> {
        Box::pin(async move {
            let (endpoint, client) = self.next_client().await?;
            let (slot, block_height, epoch_info, version) = tokio::try_join!(
                client.get_slot(),
                client.get_block_height(),
                client.get_epoch_info(),
                client.get_version(),
            )
            .map_err(|e| read_failed("cluster status", &endpoint, e))?;

            Ok(ClusterSnapshot {
                slot,
                block_height,
                epoch: epoch_info.epoch,
                slot_index: epoch_info.slot_index,
                slots_in_epoch: epoch_info.slots_in_epoch,
                solana_version: version.solana_core,
            })
        })
    }

    fn supply<'a>(&'a self) -> LedgerFuture<'a, SupplySnapshot> {
        Box::pin(async move {
            let (endpoint, client) = self.next_client().await?;
            let supply = client
                .supply()
                .await
                .map_err(|e| read_failed("supply", &endpoint, e))?
                .value;
            Ok(SupplySnapshot {
                total: supply.total,
                circulating: supply.circulating,
                non_circulating: supply.non_circulating,
            })
        })
    }

    fn balance<'a>(&'a self, address: &'a Pubkey) -> LedgerFuture<'a, u64> {
        Box::pin(async move {
            let (endpoint, client) = self.next_client().await?;
            client
                .get_balance(address)
                .await
                .map_err(|e| read_failed("balance", &endpoint, e))
        })
    }
}
