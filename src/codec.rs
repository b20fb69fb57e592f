//! Wire codec for unsigned/partially signed transactions exchanged as base64.
//!
//! Decoding is strict and goes through the same bincode options the validator
//! uses (fixed-int, bounded by the packet size, no trailing bytes). The message
//! prefix byte tells the two layouts apart: a v0 message sets the high bit, a
//! legacy message starts with its signer count.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bincode::Options;
use solana_sdk::{
    hash::Hash,
    message::VersionedMessage,
    pubkey::Pubkey,
    sanitize::Sanitize,
    signature::{Keypair, Signature, Signer},
    transaction::{Transaction, VersionedTransaction},
};
use thiserror::Error;

/// Max serialized transaction size accepted by the cluster.
pub const PACKET_DATA_SIZE: u64 = 1232;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid base64: {0}")]
    Base64(String),
    #[error("not a transaction: {0}")]
    Malformed(String),
    #[error("transaction failed sanitization: {0}")]
    Sanitize(String),
    #[error("serialization failed: {0}")]
    Serialize(String),
    #[error("signing failed: {0}")]
    Signing(String),
}

fn bincode_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_limit(PACKET_DATA_SIZE)
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

/// A transaction in whichever layout it arrived in.
#[derive(Debug, Clone, PartialEq)]
pub enum WireTransaction {
    Versioned(VersionedTransaction),
    Legacy(Transaction),
}

impl WireTransaction {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let tx: VersionedTransaction = bincode_options()
            .deserialize(bytes)
            .map_err(|e| CodecError::Malformed(e.to_string()))?;
        tx.sanitize()
            .map_err(|e| CodecError::Sanitize(e.to_string()))?;

        match tx.message {
            VersionedMessage::Legacy(message) => Ok(WireTransaction::Legacy(Transaction {
                signatures: tx.signatures,
                message,
            })),
            VersionedMessage::V0(_) => Ok(WireTransaction::Versioned(tx)),
        }
    }

    pub fn serialize(&self) -> Result<Vec<u8>, CodecError> {
        let bytes = match self {
            WireTransaction::Versioned(tx) => bincode::serialize(tx),
            WireTransaction::Legacy(tx) => bincode::serialize(tx),
        };
        bytes.map_err(|e| CodecError::Serialize(e.to_string()))
    }

    pub fn recent_blockhash(&self) -> Hash {
        match self {
            WireTransaction::Versioned(tx) => *tx.message.recent_blockhash(),
            WireTransaction::Legacy(tx) => tx.message.recent_blockhash,
        }
    }

    /// The fee payer's signature, which identifies the transaction on chain.
    pub fn signature(&self) -> Signature {
        let sigs = match self {
            WireTransaction::Versioned(tx) => &tx.signatures,
            WireTransaction::Legacy(tx) => &tx.signatures,
        };
        sigs.first().copied().unwrap_or_default()
    }

    pub fn fee_payer(&self) -> Option<Pubkey> {
        self.required_signers().first().copied()
    }

    pub fn required_signers(&self) -> Vec<Pubkey> {
        let (keys, required) = match self {
            WireTransaction::Versioned(tx) => (
                tx.message.static_account_keys(),
                tx.message.header().num_required_signatures as usize,
            ),
            WireTransaction::Legacy(tx) => (
                tx.message.account_keys.as_slice(),
                tx.message.header.num_required_signatures as usize,
            ),
        };
        keys.iter().take(required).copied().collect()
    }

    pub fn is_signed_by(&self, pubkey: &Pubkey) -> bool {
        let sigs = match self {
            WireTransaction::Versioned(tx) => &tx.signatures,
            WireTransaction::Legacy(tx) => &tx.signatures,
        };
        self.required_signers()
            .iter()
            .position(|k| k == pubkey)
            .and_then(|i| sigs.get(i))
            .map(|s| *s != Signature::default())
            .unwrap_or(false)
    }

    pub fn is_versioned_v0(&self) -> bool {
        matches!(self, WireTransaction::Versioned(tx) if matches!(tx.message, VersionedMessage::V0(_)))
    }

    /// Add `keypair`'s signature in its slot, leaving other slots untouched.
    pub fn partial_sign(&mut self, keypair: &Keypair) -> Result<(), CodecError> {
        let pubkey = keypair.pubkey();
        let index = self
            .required_signers()
            .iter()
            .position(|k| *k == pubkey)
            .ok_or_else(|| CodecError::Signing(format!("{} is not a required signer", pubkey)))?;

        match self {
            WireTransaction::Versioned(tx) => {
                let required = tx.message.header().num_required_signatures as usize;
                if tx.signatures.len() < required {
                    tx.signatures.resize(required, Signature::default());
                }
                tx.signatures[index] = keypair.sign_message(&tx.message.serialize());
            }
            WireTransaction::Legacy(tx) => {
                let blockhash = tx.message.recent_blockhash;
                tx.try_partial_sign(&[keypair], blockhash)
                    .map_err(|e| CodecError::Signing(e.to_string()))?;
            }
        }
        Ok(())
    }
}

impl From<VersionedTransaction> for WireTransaction {
    fn from(tx: VersionedTransaction) -> Self {
        WireTransaction::Versioned(tx)
    }
}

impl From<Transaction> for WireTransaction {
    fn from(tx: Transaction) -> Self {
        WireTransaction::Legacy(tx)
    }
}

pub fn decode_base64(encoded: &str) -> Result<WireTransaction, CodecError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| CodecError::Base64(e.to_string()))?;
    WireTransaction::from_bytes(&bytes)
}

pub fn encode_base64(tx: &WireTransaction) -> Result<String, CodecError> {
    Ok(STANDARD.encode(tx.serialize()?))
}
