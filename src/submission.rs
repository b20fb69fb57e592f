//! Client-side submit/confirm flow shared by deploys and swaps.
//!
//! One call produces exactly one terminal outcome. While confirmation is
//! pending the signed bytes are re-sent on a fixed interval; that loop is
//! stopped through a watch channel and joined before the call returns.

use async_trait::async_trait;
use serde_json::json;
use solana_sdk::{hash::Hash, pubkey::Pubkey, signature::Signature};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::codec::{decode_base64, WireTransaction};
use crate::config::Config;
use crate::errors::SubmissionError;
use crate::ledger::{LedgerClient, LedgerError};
use crate::metrics::{metrics, Timer};
use crate::structured_logging::{PipelineContext, StructuredLogger};

pub const PROCESSED_BUT_NOT_FOUND: &str = "Transaction processed but pool not found";

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("wallet not connected")]
    NotConnected,
    #[error("user rejected the request")]
    Rejected,
    #[error("{0}")]
    Failed(String),
}

/// The user's wallet. Adds the user's signature without touching other slots.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    fn pubkey(&self) -> Option<Pubkey>;

    async fn sign_transaction(&self, tx: WireTransaction) -> Result<WireTransaction, WalletError>;
}

/// Answers "did the transaction's effect land?" when the send result is ambiguous.
#[async_trait]
pub trait OutcomeProbe: Send + Sync {
    async fn has_landed(&self) -> bool;
}

#[derive(Debug, Clone, Copy)]
pub struct SubmissionSettings {
    pub rebroadcast_interval: Duration,
    pub rebroadcast_max: Duration,
}

impl SubmissionSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            rebroadcast_interval: cfg.rebroadcast_interval(),
            rebroadcast_max: cfg.rebroadcast_max(),
        }
    }
}

pub struct SubmissionController {
    ledger: Arc<dyn LedgerClient>,
    wallet: Arc<dyn WalletSigner>,
    settings: SubmissionSettings,
}

/// Re-send `tx` every `interval` until stopped or `max` has elapsed. Errors are ignored.
async fn rebroadcast_loop(
    ledger: Arc<dyn LedgerClient>,
    tx: WireTransaction,
    mut stop: watch::Receiver<bool>,
    interval: Duration,
    max: Duration,
    logger: StructuredLogger,
) -> u64 {
    let started = Instant::now();
    let mut sends = 0u64;
    metrics().add_to_gauge("rebroadcast_loops_active", 1);

    'outer: while started.elapsed() < max {
        tokio::select! {
            biased;
            _ = stop.changed() => break 'outer,
            _ = tokio::time::sleep(interval) => {}
        }
        if *stop.borrow() {
            break;
        }
        tokio::select! {
            biased;
            _ = stop.changed() => break 'outer,
            res = ledger.send_transaction(&tx, true) => {
                sends += 1;
                metrics().increment_counter("rebroadcast_sends_total");
                if let Err(e) = res {
                    debug!("rebroadcast send ignored: {}", e);
                }
            }
        }
    }

    metrics().add_to_gauge("rebroadcast_loops_active", -1);
    logger.log_rebroadcast_stopped(sends, started.elapsed().as_millis() as u64);
    sends
}

impl SubmissionController {
    pub fn new(ledger: Arc<dyn LedgerClient>, wallet: Arc<dyn WalletSigner>, settings: SubmissionSettings) -> Self {
        Self {
            ledger,
            wallet,
            settings,
        }
    }

    pub fn wallet(&self) -> &Arc<dyn WalletSigner> {
        &self.wallet
    }

    /// Sign, send, rebroadcast and confirm `unsigned_b64`. With a probe, ambiguous
    /// sends and expired confirmations are resolved by asking whether the effect landed.
    pub async fn submit_and_confirm(
        &self,
        unsigned_b64: &str,
        last_valid_block_height: u64,
        probe: Option<&dyn OutcomeProbe>,
    ) -> Result<Signature, SubmissionError> {
        let ctx = PipelineContext::new("submission");
        let timer = Timer::new("submission_latency_ms");
        metrics().increment_counter("submission_total");

        let result = self
            .run(unsigned_b64, last_valid_block_height, probe, &ctx)
            .await;

        let latency_ms = timer.elapsed_ms();
        timer.finish();
        match &result {
            Ok(sig) => {
                metrics().increment_counter("submission_confirmed_total");
                ctx.logger.log_submission_outcome(&sig.to_string(), "confirmed", latency_ms);
            }
            Err(e) => {
                metrics().record_error(e.category());
                if !e.is_cancellation() {
                    metrics().increment_counter("submission_failed_total");
                }
                ctx.logger.warn("submission_failed", json!({ "error": e.to_string(), "latency_ms": latency_ms }));
            }
        }
        result
    }

    async fn run(
        &self,
        unsigned_b64: &str,
        last_valid_block_height: u64,
        probe: Option<&dyn OutcomeProbe>,
        ctx: &PipelineContext,
    ) -> Result<Signature, SubmissionError> {
        let unsigned = decode_base64(unsigned_b64).map_err(|e| SubmissionError::Decode(e.to_string()))?;

        if self.wallet.pubkey().is_none() {
            return Err(SubmissionError::WalletNotConnected);
        }
        let signed = self
            .wallet
            .sign_transaction(unsigned)
            .await
            .map_err(|e| match e {
                WalletError::NotConnected => SubmissionError::WalletNotConnected,
                WalletError::Rejected => SubmissionError::UserRejected,
                WalletError::Failed(reason) => SubmissionError::submission_failed(reason),
            })?;

        let signature = signed.signature();
        let blockhash = signed.recent_blockhash();

        match self.ledger.send_transaction(&signed, true).await {
            Ok(_) => {
                ctx.logger.log_submission_sent(&signature.to_string(), last_valid_block_height);
            }
            Err(e) if e.is_ambiguous() => {
                warn!(%signature, "send reported an ambiguous outcome: {}", e);
                return match probe {
                    Some(probe) => self.resolve_with_probe(probe, signature, ctx).await,
                    // Confirmation settles whether it actually landed.
                    None => self
                        .confirm(signature, blockhash, last_valid_block_height, None)
                        .await,
                };
            }
            Err(e) => return Err(SubmissionError::submission_failed(e.reason())),
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(rebroadcast_loop(
            self.ledger.clone(),
            signed,
            stop_rx,
            self.settings.rebroadcast_interval,
            self.settings.rebroadcast_max,
            ctx.child("rebroadcast").logger,
        ));
        let stop_guard = scopeguard::guard(stop_tx, |tx| {
            let _ = tx.send(true);
        });

        let outcome = self
            .confirm(signature, blockhash, last_valid_block_height, probe)
            .await;

        drop(stop_guard);
        if let Err(e) = handle.await {
            warn!("rebroadcast task ended abnormally: {}", e);
        }
        outcome
    }

    async fn resolve_with_probe(
        &self,
        probe: &dyn OutcomeProbe,
        signature: Signature,
        ctx: &PipelineContext,
    ) -> Result<Signature, SubmissionError> {
        if probe.has_landed().await {
            metrics().increment_counter("submission_recovered_total");
            ctx.logger.log_submission_outcome(&signature.to_string(), "recovered", 0);
            Ok(signature)
        } else {
            Err(SubmissionError::submission_failed(PROCESSED_BUT_NOT_FOUND))
        }
    }

    async fn confirm(
        &self,
        signature: Signature,
        blockhash: Hash,
        last_valid_block_height: u64,
        probe: Option<&dyn OutcomeProbe>,
    ) -> Result<Signature, SubmissionError> {
        match self
            .ledger
            .confirm_transaction(signature, blockhash, last_valid_block_height)
            .await
        {
            Ok(()) => Ok(signature),
            Err(LedgerError::TransactionFailed(reason)) => {
                Err(SubmissionError::submission_failed(reason))
            }
            Err(e @ LedgerError::Expired { .. }) | Err(e @ LedgerError::Transport(_)) => {
                if let Some(probe) = probe {
                    if probe.has_landed().await {
                        metrics().increment_counter("submission_recovered_total");
                        return Ok(signature);
                    }
                }
                match e {
                    LedgerError::Expired { .. } => Err(SubmissionError::ConfirmationTimeout {
                        last_valid_block_height,
                    }),
                    other => Err(SubmissionError::submission_failed(other.reason())),
                }
            }
            Err(e) => Err(SubmissionError::submission_failed(e.reason())),
        }
    }
}
