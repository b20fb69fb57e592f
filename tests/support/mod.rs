#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use parity_launchpad::api_client::{LaunchpadApi, LocalApi};
use parity_launchpad::chain::ChainService;
use parity_launchpad::client::LaunchpadClient;
use parity_launchpad::codec::{encode_base64, WireTransaction};
use parity_launchpad::config::Config;
use parity_launchpad::launches::LaunchService;
use parity_launchpad::ledger::{
    ClusterSnapshot, LedgerClient, LedgerError, LedgerErrorKind, LedgerFuture, SupplySnapshot,
};
use parity_launchpad::orchestrator::{DeployOrchestrator, DeploySettings};
use parity_launchpad::protocol::memory::InMemoryPoolProtocol;
use parity_launchpad::protocol::PoolProtocol;
use parity_launchpad::server::AppState;
use parity_launchpad::store::memory::InMemoryLaunchStore;
use parity_launchpad::store::LaunchStore;
use parity_launchpad::submission::{SubmissionController, SubmissionSettings, WalletError, WalletSigner};
use parity_launchpad::swap::SwapService;
use parity_launchpad::tx_builder::{spl_memo, TransactionAssembler};
use parity_launchpad::types::CreateLaunchRequest;
use solana_sdk::{
    hash::Hash,
    message::{v0::Message as MessageV0, Message, VersionedMessage},
    pubkey::Pubkey,
    signature::Signature,
    transaction::{Transaction, VersionedTransaction},
};

pub const CREATOR: &str = "creator-1";
pub const LAST_VALID_BLOCK_HEIGHT: u64 = 1_000;

/// What the first send returns. Later sends (rebroadcasts) always succeed.
#[derive(Debug, Clone)]
pub enum SendScript {
    Ok,
    Ambiguous(LedgerErrorKind),
    Fail { message: String, logs: Vec<String> },
}

#[derive(Debug, Clone)]
pub enum ConfirmScript {
    OkAfter(Duration),
    ExpireAfter(Duration),
    Fail(String),
}

/// Blockhash every transaction built against `MockLedger` carries.
pub fn test_blockhash() -> Hash {
    Hash::new_from_array([9u8; 32])
}

#[derive(Debug, Clone)]
pub struct SentTx {
    pub at: Instant,
    pub signature: Signature,
    pub skip_preflight: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmCall {
    pub signature: Signature,
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
}

/// Ledger double that records every send and confirmation and can "land"
/// staged pools when a transaction is sent.
pub struct MockLedger {
    blockhash: Hash,
    send: SendScript,
    confirm: ConfirmScript,
    lands: Option<Arc<InMemoryPoolProtocol>>,
    sends: Mutex<Vec<SentTx>>,
    confirms: Mutex<Vec<ConfirmCall>>,
    balances: Mutex<HashMap<Pubkey, u64>>,
}

impl fmt::Debug for MockLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockLedger")
            .field("send", &self.send)
            .field("confirm", &self.confirm)
            .finish_non_exhaustive()
    }
}

impl MockLedger {
    pub fn new(send: SendScript, confirm: ConfirmScript) -> Self {
        Self {
            blockhash: test_blockhash(),
            send,
            confirm,
            lands: None,
            sends: Mutex::new(Vec::new()),
            confirms: Mutex::new(Vec::new()),
            balances: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_balance(&self, address: Pubkey, lamports: u64) {
        self.balances.lock().unwrap().insert(address, lamports);
    }

    pub fn landing_on(mut self, protocol: Arc<InMemoryPoolProtocol>) -> Self {
        self.lands = Some(protocol);
        self
    }

    pub fn send_count(&self) -> usize {
        self.sends.lock().unwrap().len()
    }

    pub fn send_times(&self) -> Vec<Instant> {
        self.sends.lock().unwrap().iter().map(|s| s.at).collect()
    }

    pub fn sends(&self) -> Vec<SentTx> {
        self.sends.lock().unwrap().clone()
    }

    pub fn confirms(&self) -> Vec<ConfirmCall> {
        self.confirms.lock().unwrap().clone()
    }
}

impl LedgerClient for MockLedger {
    fn latest_blockhash<'a>(&'a self) -> LedgerFuture<'a, (Hash, u64)> {
        Box::pin(async move { Ok((self.blockhash, LAST_VALID_BLOCK_HEIGHT)) })
    }

    fn send_transaction<'a>(&'a self, tx: &'a WireTransaction, skip_preflight: bool) -> LedgerFuture<'a, Signature> {
        Box::pin(async move {
            let first = {
                let mut sends = self.sends.lock().unwrap();
                sends.push(SentTx {
                    at: Instant::now(),
                    signature: tx.signature(),
                    skip_preflight,
                });
                sends.len() == 1
            };
            if let Some(protocol) = &self.lands {
                for pool in protocol.staged_pools().await {
                    protocol.mark_landed(&pool).await;
                }
            }
            if !first {
                return Ok(tx.signature());
            }
            match &self.send {
                SendScript::Ok => Ok(tx.signature()),
                SendScript::Ambiguous(kind) => Err(LedgerError::send(
                    *kind,
                    "Transaction simulation failed: This transaction has already been processed",
                )),
                SendScript::Fail { message, logs } => Err(LedgerError::Send {
                    kind: LedgerErrorKind::Other,
                    message: message.clone(),
                    logs: logs.clone(),
                }),
            }
        })
    }

    fn confirm_transaction<'a>(
        &'a self,
        signature: Signature,
        blockhash: Hash,
        last_valid_block_height: u64,
    ) -> LedgerFuture<'a, ()> {
        self.confirms.lock().unwrap().push(ConfirmCall {
            signature,
            blockhash,
            last_valid_block_height,
        });
        Box::pin(async move {
            match &self.confirm {
                ConfirmScript::OkAfter(d) => {
                    tokio::time::sleep(*d).await;
                    Ok(())
                }
                ConfirmScript::ExpireAfter(d) => {
                    tokio::time::sleep(*d).await;
                    Err(LedgerError::Expired { last_valid_block_height })
                }
                ConfirmScript::Fail(reason) => Err(LedgerError::TransactionFailed(reason.clone())),
            }
        })
    }

    fn cluster_snapshot<'a>(&'a self) -> LedgerFuture<'a, ClusterSnapshot> {
        Box::pin(async {
            Ok(ClusterSnapshot {
                slot: 310_000_000,
                block_height: 290_000_000,
                epoch: 717,
                slot_index: 324_000,
                slots_in_epoch: 432_000,
                solana_version: "2.3.4".to_string(),
            })
        })
    }

    fn supply<'a>(&'a self) -> LedgerFuture<'a, SupplySnapshot> {
        Box::pin(async {
            Ok(SupplySnapshot {
                total: 600_000_000_000_000_000,
                circulating: 500_000_000_000_000_000,
                non_circulating: 100_000_000_000_000_000,
            })
        })
    }

    /// Unknown accounts hold zero lamports, as on a real cluster.
    fn balance<'a>(&'a self, address: &'a Pubkey) -> LedgerFuture<'a, u64> {
        let lamports = self.balances.lock().unwrap().get(address).copied().unwrap_or(0);
        Box::pin(async move { Ok(lamports) })
    }
}

pub struct RejectingWallet(pub Pubkey);

#[async_trait]
impl WalletSigner for RejectingWallet {
    fn pubkey(&self) -> Option<Pubkey> {
        Some(self.0)
    }

    async fn sign_transaction(&self, _tx: WireTransaction) -> Result<WireTransaction, WalletError> {
        Err(WalletError::Rejected)
    }
}

pub struct DisconnectedWallet;

#[async_trait]
impl WalletSigner for DisconnectedWallet {
    fn pubkey(&self) -> Option<Pubkey> {
        None
    }

    async fn sign_transaction(&self, _tx: WireTransaction) -> Result<WireTransaction, WalletError> {
        Err(WalletError::NotConnected)
    }
}

pub fn test_config() -> Config {
    Config {
        recover_verify_delay_ms: 10,
        confirm_verify_delay_ms: 10,
        confirm_settle_ms: 10,
        ..Config::default()
    }
}

pub fn submission(ledger: Arc<MockLedger>, wallet: Arc<dyn WalletSigner>) -> SubmissionController {
    SubmissionController::new(ledger, wallet, SubmissionSettings::from_config(&Config::default()))
}

/// Unsigned memo transaction that needs `payer`'s signature.
pub fn unsigned_tx(payer: &Pubkey, versioned: bool) -> String {
    let blockhash = test_blockhash();
    let ix = spl_memo::build_memo(b"parity", &[payer]);
    let tx = if versioned {
        let message = MessageV0::try_compile(payer, &[ix], &[], blockhash).unwrap();
        let required = message.header.num_required_signatures as usize;
        WireTransaction::Versioned(VersionedTransaction {
            signatures: vec![Signature::default(); required],
            message: VersionedMessage::V0(message),
        })
    } else {
        let message = Message::new_with_blockhash(&[ix], Some(payer), &blockhash);
        WireTransaction::Legacy(Transaction::new_unsigned(message))
    };
    encode_base64(&tx).unwrap()
}

/// Services over in-memory store and protocol, reachable through `LocalApi`.
pub struct Harness {
    pub config: Config,
    pub store: Arc<InMemoryLaunchStore>,
    pub protocol: Arc<InMemoryPoolProtocol>,
    pub ledger: Arc<MockLedger>,
    pub pool_config: Pubkey,
    pub api: LocalApi,
    pub orchestrator: Arc<DeployOrchestrator>,
    pub launches: Arc<LaunchService>,
    pub swaps: Arc<SwapService>,
    pub chain: Arc<ChainService>,
}

impl Harness {
    /// Pools land only when a transaction is sent through the ledger.
    pub async fn new(send: SendScript, confirm: ConfirmScript) -> Self {
        let protocol = Arc::new(InMemoryPoolProtocol::new(false));
        let ledger = Arc::new(MockLedger::new(send, confirm).landing_on(protocol.clone()));
        Self::with(protocol, ledger).await
    }

    /// Pools never land on their own; tests call `mark_landed` when needed.
    pub async fn detached() -> Self {
        let protocol = Arc::new(InMemoryPoolProtocol::new(false));
        let ledger = Arc::new(MockLedger::new(
            SendScript::Ok,
            ConfirmScript::OkAfter(Duration::from_millis(1)),
        ));
        Self::with(protocol, ledger).await
    }

    async fn with(protocol: Arc<InMemoryPoolProtocol>, ledger: Arc<MockLedger>) -> Self {
        let pool_config = Pubkey::new_unique();
        protocol
            .insert_config(InMemoryPoolProtocol::standard_config(pool_config))
            .await;

        let config = Config {
            pool_config_address: Some(pool_config.to_string()),
            ..test_config()
        };
        let store = Arc::new(InMemoryLaunchStore::new());
        let store_dyn: Arc<dyn LaunchStore> = store.clone();
        let protocol_dyn: Arc<dyn PoolProtocol> = protocol.clone();
        let assembler = Arc::new(TransactionAssembler::new(ledger.clone(), &config));

        let orchestrator = Arc::new(DeployOrchestrator::new(
            store_dyn.clone(),
            protocol_dyn.clone(),
            assembler.clone(),
            DeploySettings::from_config(&config).unwrap(),
        ));
        let launches = Arc::new(LaunchService::new(store_dyn, protocol_dyn.clone(), &config.symbol_suffix));
        let swaps = Arc::new(SwapService::new(protocol_dyn, assembler, &config));
        let chain = Arc::new(ChainService::new(ledger.clone()));
        let api = LocalApi::new(
            Some(CREATOR.to_string()),
            orchestrator.clone(),
            launches.clone(),
            swaps.clone(),
            chain.clone(),
        );

        Self {
            config,
            store,
            protocol,
            ledger,
            pool_config,
            api,
            orchestrator,
            launches,
            swaps,
            chain,
        }
    }

    /// Server state over the same services the local API uses.
    pub fn app_state(&self) -> AppState {
        AppState {
            launches: self.launches.clone(),
            orchestrator: self.orchestrator.clone(),
            swaps: self.swaps.clone(),
            chain: self.chain.clone(),
            auth_header: self.config.auth_header.clone(),
        }
    }

    pub async fn create_launch(&self) -> String {
        self.api
            .create_launch(&CreateLaunchRequest {
                name: "Parity Coin".to_string(),
                symbol: "pty".to_string(),
                description: Some("for good".to_string()),
                image: Some("https://example.org/pty.png".to_string()),
                charity_wallet: Pubkey::new_unique().to_string(),
                charity_name: Some("Open Water".to_string()),
            })
            .await
            .unwrap()
            .id
    }

    pub fn client(&self, wallet: Arc<dyn WalletSigner>) -> LaunchpadClient {
        LaunchpadClient::new(
            Arc::new(self.api.clone()),
            SubmissionController::new(
                self.ledger.clone(),
                wallet,
                SubmissionSettings::from_config(&self.config),
            ),
            self.config.confirm_settle(),
        )
    }
}
