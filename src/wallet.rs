//! Keypair-backed wallet for the CLI and tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use std::{fs, path::Path};
use tracing::{debug, info};

use crate::codec::WireTransaction;
use crate::submission::{WalletError, WalletSigner};

/// Wallet holding a local keypair
#[derive(Debug)]
pub struct KeypairWallet {
    keypair: Keypair,
}

impl KeypairWallet {
    /// Load a keypair file (Solana CLI JSON array or base58)
    pub fn from_file<P: AsRef<Path>>(keypair_path: P) -> Result<Self> {
        let path = keypair_path.as_ref();
        let keypair_data = fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read keypair file {}: {}", path.display(), e))?;

        let keypair = Self::parse_keypair(&keypair_data)?;

        info!("Loaded keypair from {}, pubkey: {}", path.display(), keypair.pubkey());

        Ok(Self { keypair })
    }

    /// Generate a new random keypair for testing
    pub fn new_random() -> Self {
        let keypair = Keypair::new();
        debug!("Generated random keypair, pubkey: {}", keypair.pubkey());
        Self { keypair }
    }

    pub fn address(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    /// Parse keypair from string (supports both JSON array and base58 formats)
    fn parse_keypair(data: &str) -> Result<Keypair> {
        let data = data.trim();

        if data.starts_with('[') && data.ends_with(']') {
            let bytes: Vec<u8> = serde_json::from_str(data)
                .map_err(|e| anyhow!("Failed to parse keypair JSON array: {}", e))?;

            if bytes.len() != 64 {
                return Err(anyhow!("Invalid keypair: expected 64 bytes, got {}", bytes.len()));
            }

            return Keypair::from_bytes(&bytes)
                .map_err(|e| anyhow!("Failed to create keypair from bytes: {}", e));
        }

        if let Ok(bytes) = bs58::decode(data).into_vec() {
            if bytes.len() == 64 {
                if let Ok(keypair) = Keypair::from_bytes(&bytes) {
                    return Ok(keypair);
                }
            }
        }

        Err(anyhow!("Invalid keypair format: expected JSON array [byte, byte, ...] or base58 string"))
    }

    /// Save keypair to file in JSON format
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.keypair.to_bytes().to_vec())?;
        fs::write(&path, json)
            .map_err(|e| anyhow!("Failed to write keypair to {}: {}", path.as_ref().display(), e))?;

        info!("Saved keypair to {}", path.as_ref().display());
        Ok(())
    }
}

#[async_trait]
impl WalletSigner for KeypairWallet {
    fn pubkey(&self) -> Option<Pubkey> {
        Some(self.keypair.pubkey())
    }

    async fn sign_transaction(&self, mut tx: WireTransaction) -> Result<WireTransaction, WalletError> {
        tx.partial_sign(&self.keypair)
            .map_err(|e| WalletError::Failed(e.to_string()))?;
        debug!("Transaction signed with pubkey: {}", self.keypair.pubkey());
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx_builder::spl_memo;
    use solana_sdk::{hash::Hash, message::Message, transaction::Transaction};
    use tempfile::NamedTempFile;

    #[test]
    fn test_keypair_from_json_array() {
        let keypair = Keypair::new();
        let json = serde_json::to_string(&keypair.to_bytes().to_vec()).unwrap();

        let parsed = KeypairWallet::parse_keypair(&json).unwrap();
        assert_eq!(keypair.pubkey(), parsed.pubkey());
    }

    #[test]
    fn test_keypair_from_base58() {
        let keypair = Keypair::new();
        let encoded = bs58::encode(keypair.to_bytes()).into_string();
        let parsed = KeypairWallet::parse_keypair(&encoded).unwrap();
        assert_eq!(keypair.pubkey(), parsed.pubkey());
        assert!(KeypairWallet::parse_keypair("[1,2,3]").is_err());
    }

    #[test]
    fn test_save_and_load_keypair() {
        let temp_file = NamedTempFile::new().unwrap();
        let original = KeypairWallet::new_random();

        original.save_to_file(temp_file.path()).unwrap();
        let loaded = KeypairWallet::from_file(temp_file.path()).unwrap();

        assert_eq!(original.address(), loaded.address());
    }

    #[tokio::test]
    async fn signs_only_transactions_that_need_it() {
        let wallet = KeypairWallet::new_random();
        let ix = spl_memo::build_memo(b"hi", &[&wallet.address()]);
        let msg = Message::new_with_blockhash(&[ix], Some(&wallet.address()), &Hash::new_unique());
        let tx = WireTransaction::Legacy(Transaction::new_unsigned(msg));

        let signed = wallet.sign_transaction(tx).await.unwrap();
        assert!(signed.is_signed_by(&wallet.address()));

        let stranger = Pubkey::new_unique();
        let ix = spl_memo::build_memo(b"hi", &[&stranger]);
        let msg = Message::new_with_blockhash(&[ix], Some(&stranger), &Hash::new_unique());
        let foreign = WireTransaction::Legacy(Transaction::new_unsigned(msg));
        assert!(matches!(
            wallet.sign_transaction(foreign).await,
            Err(WalletError::Failed(_))
        ));
    }
}
