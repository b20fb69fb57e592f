//! tx_builder.rs
//! Assembles protocol instructions into unsigned transactions for clients:
//! - prepends the compute-unit-price priority fee
//! - stamps a recent blockhash (short-lived cache in front of the ledger)
//! - compiles legacy or v0 messages per configuration
//! - partially signs with server-held ephemeral keys, then base64-encodes

use solana_sdk::{
    compute_budget::ComputeBudgetInstruction,
    hash::Hash,
    instruction::Instruction,
    message::{v0::Message as MessageV0, Message, VersionedMessage},
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    transaction::{Transaction, VersionedTransaction},
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use crate::codec::{encode_base64, WireTransaction};
use crate::config::{Config, TxFormat};
use crate::ledger::LedgerClient;

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("Blockhash fetch failed: {0}")]
    BlockhashFetch(String),
    #[error("Failed to compile message: {0}")]
    Compile(String),
    #[error("Signing failed: {0}")]
    SigningFailed(String),
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

/// Base64 transaction plus the block height bounding its validity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledTransaction {
    pub transaction: String,
    pub last_valid_block_height: u64,
    pub recent_blockhash: Hash,
}

pub struct TransactionAssembler {
    ledger: Arc<dyn LedgerClient>,
    priority_fee_micro_lamports: u64,
    format: TxFormat,
    blockhash_cache: RwLock<Option<(Instant, Hash, u64)>>,
    blockhash_cache_ttl: Duration,
}

impl std::fmt::Debug for TransactionAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionAssembler")
            .field("priority_fee_micro_lamports", &self.priority_fee_micro_lamports)
            .field("format", &self.format)
            .finish()
    }
}

impl TransactionAssembler {
    pub fn new(ledger: Arc<dyn LedgerClient>, config: &Config) -> Self {
        Self {
            ledger,
            priority_fee_micro_lamports: config.priority_fee_micro_lamports,
            format: config.tx_format,
            blockhash_cache: RwLock::new(None),
            blockhash_cache_ttl: Duration::from_secs(5),
        }
    }

    pub async fn recent_blockhash(&self) -> Result<(Hash, u64), AssemblyError> {
        {
            let cache = self.blockhash_cache.read().await;
            if let Some((instant, hash, height)) = cache.as_ref() {
                if instant.elapsed() < self.blockhash_cache_ttl {
                    return Ok((*hash, *height));
                }
            }
        }

        let (hash, height) = self
            .ledger
            .latest_blockhash()
            .await
            .map_err(|e| AssemblyError::BlockhashFetch(e.to_string()))?;

        let mut cache = self.blockhash_cache.write().await;
        *cache = Some((Instant::now(), hash, height));
        Ok((hash, height))
    }

    /// Compile `instructions` with `payer` as fee payer, sign with `co_signers`
    /// only, and leave every other signature slot empty.
    pub async fn assemble(
        &self,
        payer: &Pubkey,
        instructions: Vec<Instruction>,
        co_signers: &[&Keypair],
    ) -> Result<AssembledTransaction, AssemblyError> {
        let (recent_blockhash, last_valid_block_height) = self.recent_blockhash().await?;

        let mut all = Vec::with_capacity(instructions.len() + 1);
        if self.priority_fee_micro_lamports > 0 {
            all.push(ComputeBudgetInstruction::set_compute_unit_price(
                self.priority_fee_micro_lamports,
            ));
        }
        all.extend(instructions);

        let mut tx = match self.format {
            TxFormat::Legacy => {
                let message = Message::new_with_blockhash(&all, Some(payer), &recent_blockhash);
                WireTransaction::Legacy(Transaction::new_unsigned(message))
            }
            TxFormat::V0 => {
                let message = MessageV0::try_compile(payer, &all, &[], recent_blockhash)
                    .map_err(|e| AssemblyError::Compile(e.to_string()))?;
                let required = message.header.num_required_signatures as usize;
                WireTransaction::Versioned(VersionedTransaction {
                    signatures: vec![Signature::default(); required],
                    message: VersionedMessage::V0(message),
                })
            }
        };

        for signer in co_signers {
            tx.partial_sign(signer)
                .map_err(|e| AssemblyError::SigningFailed(e.to_string()))?;
        }

        let transaction =
            encode_base64(&tx).map_err(|e| AssemblyError::Serialization(e.to_string()))?;
        debug!(
            %payer,
            format = ?self.format,
            last_valid_block_height,
            "assembled unsigned transaction"
        );

        Ok(AssembledTransaction {
            transaction,
            last_valid_block_height,
            recent_blockhash,
        })
    }

    /// Test helper: inject a fresh blockhash to avoid ledger calls in unit/integration tests.
    #[cfg(any(test, feature = "test_utils"))]
    pub async fn inject_blockhash_for_tests(&self, hash: Hash, last_valid_block_height: u64) {
        let mut cache = self.blockhash_cache.write().await;
        *cache = Some((Instant::now(), hash, last_valid_block_height));
    }
}

// SPL Memo helper
pub mod spl_memo {
    use solana_sdk::{
        instruction::{AccountMeta, Instruction},
        pubkey::Pubkey,
    };

    pub const MEMO_PROGRAM_ID: Pubkey =
        solana_sdk::pubkey!("MemoSq4gqABAXKb96qnH8TysNcWxMyWCqXgDLGmfcHr");

    pub fn build_memo(data: &[u8], signers: &[&Pubkey]) -> Instruction {
        let metas: Vec<AccountMeta> = signers
            .iter()
            .map(|&pk| AccountMeta::new_readonly(*pk, true))
            .collect();

        Instruction::new_with_bytes(MEMO_PROGRAM_ID, data, metas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_base64;
    use crate::ledger::{ClusterSnapshot, LedgerError, LedgerFuture, SupplySnapshot};
    use solana_sdk::signature::Signer;

    #[derive(Debug)]
    struct FixedLedger;

    impl LedgerClient for FixedLedger {
        fn latest_blockhash<'a>(&'a self) -> LedgerFuture<'a, (Hash, u64)> {
            Box::pin(async { Ok((Hash::new_from_array([7u8; 32]), 1_000)) })
        }

        fn send_transaction<'a>(
            &'a self,
            _tx: &'a WireTransaction,
            _skip_preflight: bool,
        ) -> LedgerFuture<'a, Signature> {
            Box::pin(async { Err(LedgerError::Transport("unused".to_string())) })
        }

        fn confirm_transaction<'a>(
            &'a self,
            _signature: Signature,
            _blockhash: Hash,
            _last_valid_block_height: u64,
        ) -> LedgerFuture<'a, ()> {
            Box::pin(async { Ok(()) })
        }

        fn cluster_snapshot<'a>(&'a self) -> LedgerFuture<'a, ClusterSnapshot> {
            Box::pin(async { Err(LedgerError::Transport("unused".to_string())) })
        }

        fn supply<'a>(&'a self) -> LedgerFuture<'a, SupplySnapshot> {
            Box::pin(async { Err(LedgerError::Transport("unused".to_string())) })
        }

        fn balance<'a>(&'a self, _address: &'a Pubkey) -> LedgerFuture<'a, u64> {
            Box::pin(async { Err(LedgerError::Transport("unused".to_string())) })
        }
    }

    fn assembler(format: TxFormat) -> TransactionAssembler {
        let config = Config {
            tx_format: format,
            ..Config::default()
        };
        TransactionAssembler::new(Arc::new(FixedLedger), &config)
    }

    #[tokio::test]
    async fn prepends_priority_fee_and_partially_signs() {
        for format in [TxFormat::Legacy, TxFormat::V0] {
            let payer = Keypair::new();
            let mint = Keypair::new();
            let ix = spl_memo::build_memo(b"create", &[&payer.pubkey(), &mint.pubkey()]);

            let out = assembler(format)
                .assemble(&payer.pubkey(), vec![ix], &[&mint])
                .await
                .unwrap();
            assert_eq!(out.last_valid_block_height, 1_000);

            let tx = decode_base64(&out.transaction).unwrap();
            assert_eq!(tx.is_versioned_v0(), format == TxFormat::V0);
            assert_eq!(tx.fee_payer(), Some(payer.pubkey()));
            assert_eq!(tx.recent_blockhash(), Hash::new_from_array([7u8; 32]));
            assert!(tx.is_signed_by(&mint.pubkey()));
            assert!(!tx.is_signed_by(&payer.pubkey()));
        }
    }

    #[tokio::test]
    async fn injected_blockhash_is_used() {
        let asm = assembler(TxFormat::Legacy);
        let hash = Hash::new_unique();
        asm.inject_blockhash_for_tests(hash, 42).await;
        assert_eq!(asm.recent_blockhash().await.unwrap(), (hash, 42));
    }
}
