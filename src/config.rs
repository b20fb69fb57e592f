use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolMode {
    /// In-memory pool protocol with a reference curve (local runs and tests)
    Mock,
    /// Delegate to the pool protocol gateway over HTTP
    Http,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    Memory,
    Postgres,
}

/// Wire format of unsigned transactions handed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxFormat {
    Legacy,
    V0,
}

impl Default for ProtocolMode {
    fn default() -> Self {
        ProtocolMode::Mock
    }
}

impl Default for StorageMode {
    fn default() -> Self {
        StorageMode::Memory
    }
}

impl Default for TxFormat {
    fn default() -> Self {
        TxFormat::Legacy
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Ledger
    #[serde(default = "default_rpc_endpoints")]
    pub rpc_endpoints: Vec<String>,
    #[serde(default = "default_rpc_timeout_sec")]
    pub rpc_timeout_sec: u64,
    #[serde(default = "default_rpc_retry_attempts")]
    pub rpc_retry_attempts: usize,
    #[serde(default = "default_confirm_poll_interval_ms")]
    pub confirm_poll_interval_ms: u64,

    // Server
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_auth_header")]
    pub auth_header: String,

    // Storage
    #[serde(default)]
    pub storage_mode: StorageMode,
    #[serde(default)]
    pub database_url: Option<String>,

    // Pool protocol
    #[serde(default)]
    pub protocol_mode: ProtocolMode,
    #[serde(default)]
    pub protocol_gateway_url: Option<String>,
    /// On-chain pool config account every launch is created against.
    #[serde(default)]
    pub pool_config_address: Option<String>,

    // Transaction assembly
    #[serde(default = "default_priority_fee_micro_lamports")]
    pub priority_fee_micro_lamports: u64,
    #[serde(default)]
    pub tx_format: TxFormat,

    // Launch metadata
    #[serde(default = "default_metadata_base_url")]
    pub metadata_base_url: String,
    #[serde(default = "default_symbol_suffix")]
    pub symbol_suffix: String,

    // Pool verification
    #[serde(default = "default_recover_verify_attempts")]
    pub recover_verify_attempts: u32,
    #[serde(default = "default_recover_verify_delay_ms")]
    pub recover_verify_delay_ms: u64,
    #[serde(default = "default_confirm_verify_attempts")]
    pub confirm_verify_attempts: u32,
    #[serde(default = "default_confirm_verify_delay_ms")]
    pub confirm_verify_delay_ms: u64,

    // Submission
    #[serde(default = "default_rebroadcast_interval_ms")]
    pub rebroadcast_interval_ms: u64,
    #[serde(default = "default_rebroadcast_max_ms")]
    pub rebroadcast_max_ms: u64,
    #[serde(default = "default_confirm_settle_ms")]
    pub confirm_settle_ms: u64,

    // Swaps
    #[serde(default = "default_slippage_bps")]
    pub default_slippage_bps: u16,
    #[serde(default = "default_quote_slippage_bps")]
    pub quote_slippage_bps: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_endpoints: default_rpc_endpoints(),
            rpc_timeout_sec: default_rpc_timeout_sec(),
            rpc_retry_attempts: default_rpc_retry_attempts(),
            confirm_poll_interval_ms: default_confirm_poll_interval_ms(),
            bind_address: default_bind_address(),
            auth_header: default_auth_header(),
            storage_mode: StorageMode::Memory,
            database_url: None,
            protocol_mode: ProtocolMode::Mock,
            protocol_gateway_url: None,
            pool_config_address: None,
            priority_fee_micro_lamports: default_priority_fee_micro_lamports(),
            tx_format: TxFormat::Legacy,
            metadata_base_url: default_metadata_base_url(),
            symbol_suffix: default_symbol_suffix(),
            recover_verify_attempts: default_recover_verify_attempts(),
            recover_verify_delay_ms: default_recover_verify_delay_ms(),
            confirm_verify_attempts: default_confirm_verify_attempts(),
            confirm_verify_delay_ms: default_confirm_verify_delay_ms(),
            rebroadcast_interval_ms: default_rebroadcast_interval_ms(),
            rebroadcast_max_ms: default_rebroadcast_max_ms(),
            confirm_settle_ms: default_confirm_settle_ms(),
            default_slippage_bps: default_slippage_bps(),
            quote_slippage_bps: default_quote_slippage_bps(),
        }
    }
}

fn default_rpc_endpoints() -> Vec<String> {
    vec!["https://api.mainnet-beta.solana.com".to_string()]
}
fn default_rpc_timeout_sec() -> u64 {
    8
}
fn default_rpc_retry_attempts() -> usize {
    3
}
fn default_confirm_poll_interval_ms() -> u64 {
    500
}
fn default_bind_address() -> String {
    "127.0.0.1:8080".to_string()
}
fn default_auth_header() -> String {
    "x-parity-user".to_string()
}
fn default_priority_fee_micro_lamports() -> u64 {
    50_000
}
fn default_metadata_base_url() -> String {
    "https://parity.sh/api/metadata".to_string()
}
fn default_symbol_suffix() -> String {
    "ᴾ".to_string()
}

// Verification defaults
fn default_recover_verify_attempts() -> u32 {
    3
}
fn default_recover_verify_delay_ms() -> u64 {
    1_000
}
fn default_confirm_verify_attempts() -> u32 {
    5
}
fn default_confirm_verify_delay_ms() -> u64 {
    2_000
}

// Submission defaults
fn default_rebroadcast_interval_ms() -> u64 {
    2_000
}
fn default_rebroadcast_max_ms() -> u64 {
    60_000
}
fn default_confirm_settle_ms() -> u64 {
    1_500
}

// Swap defaults
fn default_slippage_bps() -> u16 {
    100
}
fn default_quote_slippage_bps() -> u16 {
    100
}

pub const MAX_SLIPPAGE_BPS: u16 = 5_000;

impl Config {
    /// Load configuration from the file named by `PARITY_CONFIG` (default "config.toml")
    /// if present, otherwise defaults. Environment overrides have the highest priority:
    /// - PARITY_PROTOCOL_MODE=mock | http
    /// - PARITY_PROTOCOL_GATEWAY, PARITY_POOL_CONFIG, PARITY_BIND, DATABASE_URL
    pub fn load() -> Result<Self> {
        let path = std::env::var("PARITY_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
        let mut cfg = match fs::read_to_string(&path) {
            Ok(s) => toml::from_str::<Config>(&s)
                .with_context(|| format!("failed to parse {}", path))?,
            Err(_) => Config::default(),
        };

        cfg.apply_env_overrides();
        cfg.validate().map_err(|e| anyhow!("Invalid configuration: {}", e))?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("PARITY_PROTOCOL_MODE") {
            match v.to_lowercase().as_str() {
                "mock" => self.protocol_mode = ProtocolMode::Mock,
                "http" => self.protocol_mode = ProtocolMode::Http,
                _ => { /* ignore invalid value */ }
            }
        }
        if let Ok(v) = std::env::var("PARITY_PROTOCOL_GATEWAY") {
            self.protocol_gateway_url = Some(v);
        }
        if let Ok(v) = std::env::var("PARITY_POOL_CONFIG") {
            self.pool_config_address = Some(v);
        }
        if let Ok(v) = std::env::var("PARITY_BIND") {
            self.bind_address = v;
        }
        if let Ok(v) = std::env::var("DATABASE_URL") {
            self.database_url = Some(v);
            self.storage_mode = StorageMode::Postgres;
        }
    }

    /// Validate configuration consistency and constraints
    pub fn validate(&self) -> Result<(), String> {
        if self.rpc_endpoints.is_empty() {
            return Err("At least one RPC endpoint must be configured".to_string());
        }

        if self.rpc_timeout_sec == 0 {
            return Err("rpc_timeout_sec must be greater than 0".to_string());
        }

        if self.confirm_poll_interval_ms == 0 {
            return Err("confirm_poll_interval_ms must be greater than 0".to_string());
        }

        if self.rebroadcast_interval_ms == 0 {
            return Err("rebroadcast_interval_ms must be greater than 0".to_string());
        }

        if self.rebroadcast_interval_ms > self.rebroadcast_max_ms {
            return Err("rebroadcast_interval_ms cannot be greater than rebroadcast_max_ms".to_string());
        }

        if self.recover_verify_attempts == 0 || self.confirm_verify_attempts == 0 {
            return Err("verify attempts must be greater than 0".to_string());
        }

        if self.default_slippage_bps == 0 || self.default_slippage_bps > MAX_SLIPPAGE_BPS {
            return Err(format!("default_slippage_bps must be within 1..={}", MAX_SLIPPAGE_BPS));
        }

        if self.storage_mode == StorageMode::Postgres && self.database_url.is_none() {
            return Err("database_url is required for postgres storage".to_string());
        }

        if self.protocol_mode == ProtocolMode::Http && self.protocol_gateway_url.is_none() {
            return Err("protocol_gateway_url is required for http protocol mode".to_string());
        }

        Ok(())
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_sec)
    }

    pub fn rebroadcast_interval(&self) -> Duration {
        Duration::from_millis(self.rebroadcast_interval_ms)
    }

    pub fn rebroadcast_max(&self) -> Duration {
        Duration::from_millis(self.rebroadcast_max_ms)
    }

    pub fn confirm_settle(&self) -> Duration {
        Duration::from_millis(self.confirm_settle_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.rebroadcast_interval(), Duration::from_secs(2));
        assert_eq!(cfg.rebroadcast_max(), Duration::from_secs(60));
        assert_eq!(cfg.recover_verify_attempts, 3);
        assert_eq!(cfg.confirm_verify_attempts, 5);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            protocol_mode = "http"
            protocol_gateway_url = "http://localhost:9000"
            tx_format = "v0"
            priority_fee_micro_lamports = 1000
            "#,
        )
        .unwrap();
        assert_eq!(cfg.protocol_mode, ProtocolMode::Http);
        assert_eq!(cfg.tx_format, TxFormat::V0);
        assert_eq!(cfg.priority_fee_micro_lamports, 1000);
        assert_eq!(cfg.symbol_suffix, "ᴾ");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_inconsistent_settings() {
        let cfg = Config {
            storage_mode: StorageMode::Postgres,
            database_url: None,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = Config {
            rebroadcast_interval_ms: 90_000,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = Config {
            default_slippage_bps: 6_000,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }
}
