use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

use super::{
    derive_pool_address, CreatePoolParams, PoolConfig, PoolProtocol, PoolState, ProtocolError,
    QuoteResult, SwapParams,
};
use crate::types::{PoolPrice, SwapSide};

const MAX_INSTRUCTION_DATA: usize = 4096;

/// Pool protocol backed by the protocol gateway, a sidecar wrapping the
/// program SDK. Instructions come back as JSON and are validated here.
#[derive(Debug, Clone)]
pub struct GatewayPoolProtocol {
    http: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePoolBody<'a> {
    name: &'a str,
    symbol: &'a str,
    uri: &'a str,
    payer: String,
    pool_creator: String,
    config: String,
    base_mint: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SwapBody {
    pool: String,
    owner: String,
    amount_in: String,
    minimum_amount_out: String,
    swap_base_for_quote: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QuoteBody {
    pool: String,
    amount_in: String,
    swap_base_for_quote: bool,
    slippage_bps: u16,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstructionsResponse {
    instructions: Vec<serde_json::Value>,
    #[serde(default)]
    pool_address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PoolWire {
    address: String,
    config: String,
    base_mint: String,
    creator: String,
    base_reserve: String,
    quote_reserve: String,
    total_supply: String,
    #[serde(default)]
    is_migrated: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigWire {
    address: String,
    quote_mint: String,
    fee_bps: u16,
    virtual_quote_reserve: String,
    migration_quote_threshold: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteWire {
    amount_in: String,
    amount_out: String,
    minimum_amount_out: String,
    #[serde(default)]
    fee: Option<String>,
}

fn parse_pubkey(value: &str, what: &str) -> Result<Pubkey, ProtocolError> {
    Pubkey::from_str(value)
        .map_err(|e| ProtocolError::InstructionBuild(format!("invalid {}: {}", what, e)))
}

fn parse_amount(value: &str, what: &str) -> Result<u64, ProtocolError> {
    value
        .parse::<u64>()
        .map_err(|e| ProtocolError::Transport(format!("invalid {} from gateway: {}", what, e)))
}

impl TryFrom<PoolWire> for PoolState {
    type Error = ProtocolError;

    fn try_from(w: PoolWire) -> Result<Self, Self::Error> {
        Ok(PoolState {
            address: parse_pubkey(&w.address, "pool address")?,
            config: parse_pubkey(&w.config, "config address")?,
            base_mint: parse_pubkey(&w.base_mint, "base mint")?,
            creator: parse_pubkey(&w.creator, "creator")?,
            base_reserve: parse_amount(&w.base_reserve, "baseReserve")?,
            quote_reserve: parse_amount(&w.quote_reserve, "quoteReserve")?,
            total_supply: parse_amount(&w.total_supply, "totalSupply")?,
            is_migrated: w.is_migrated,
        })
    }
}

impl TryFrom<ConfigWire> for PoolConfig {
    type Error = ProtocolError;

    fn try_from(w: ConfigWire) -> Result<Self, Self::Error> {
        Ok(PoolConfig {
            address: parse_pubkey(&w.address, "config address")?,
            quote_mint: parse_pubkey(&w.quote_mint, "quote mint")?,
            fee_bps: w.fee_bps,
            virtual_quote_reserve: parse_amount(&w.virtual_quote_reserve, "virtualQuoteReserve")?,
            migration_quote_threshold: parse_amount(
                &w.migration_quote_threshold,
                "migrationQuoteThreshold",
            )?,
        })
    }
}

/// Parse one instruction description: `{program_id, data (base64), accounts}`.
pub fn parse_instruction(
    j: &serde_json::Value,
    allowed_signers: &[Pubkey],
) -> Result<Instruction, ProtocolError> {
    let obj = j
        .as_object()
        .ok_or_else(|| ProtocolError::InstructionBuild("instruction not an object".to_string()))?;

    let pid_str = obj
        .get("program_id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ProtocolError::InstructionBuild("program_id missing or not string".to_string()))?;
    let program_id = parse_pubkey(pid_str, "program_id")?;

    let data_b64 = obj
        .get("data")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ProtocolError::InstructionBuild("data missing or not string".to_string()))?;
    let data = STANDARD
        .decode(data_b64)
        .map_err(|e| ProtocolError::InstructionBuild(format!("base64 decode error: {}", e)))?;
    if data.len() > MAX_INSTRUCTION_DATA {
        return Err(ProtocolError::InstructionBuild(
            "instruction data too large (max 4KB)".to_string(),
        ));
    }

    let accounts = match obj.get("accounts") {
        Some(v) => parse_accounts(v, allowed_signers)?,
        None => Vec::new(),
    };

    Ok(Instruction::new_with_bytes(program_id, &data, accounts))
}

/// Parse account metas from JSON; rejects signers outside `allowed_signers`.
pub fn parse_accounts(
    accounts_val: &serde_json::Value,
    allowed_signers: &[Pubkey],
) -> Result<Vec<AccountMeta>, ProtocolError> {
    let accounts_array = accounts_val
        .as_array()
        .ok_or_else(|| ProtocolError::InstructionBuild("accounts not an array".to_string()))?;

    let mut accounts = Vec::with_capacity(accounts_array.len());
    for account_val in accounts_array {
        let account_obj = account_val.as_object().ok_or_else(|| {
            ProtocolError::InstructionBuild("account entry not an object".to_string())
        })?;

        let pubkey_str = account_obj
            .get("pubkey")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                ProtocolError::InstructionBuild("account pubkey missing or not string".to_string())
            })?;
        let pubkey = parse_pubkey(pubkey_str, "account pubkey")?;

        let is_signer = account_obj
            .get("is_signer")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let is_writable = account_obj
            .get("is_writable")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        if is_signer && !allowed_signers.contains(&pubkey) {
            return Err(ProtocolError::UnexpectedSigner(pubkey));
        }

        accounts.push(AccountMeta {
            pubkey,
            is_signer,
            is_writable,
        });
    }

    Ok(accounts)
}

impl GatewayPoolProtocol {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ProtocolError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProtocolError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET that maps 404 to `None`.
    async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, ProtocolError> {
        let resp = self
            .http
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| ProtocolError::Transport(e.to_string()))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::decode(resp).await.map(Some)
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ProtocolError> {
        let resp = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| ProtocolError::Transport(e.to_string()))?;
        Self::decode(resp).await
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ProtocolError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "protocol gateway error: {}", body);
            return Err(ProtocolError::Gateway {
                status: status.as_u16(),
                body,
            });
        }
        resp.json::<T>()
            .await
            .map_err(|e| ProtocolError::Transport(format!("invalid gateway response: {}", e)))
    }
}

#[async_trait]
impl PoolProtocol for GatewayPoolProtocol {
    async fn create_pool(&self, params: &CreatePoolParams) -> Result<Vec<Instruction>, ProtocolError> {
        let config = self
            .get_pool_config(&params.config)
            .await?
            .ok_or(ProtocolError::ConfigNotFound(params.config))?;

        let body = CreatePoolBody {
            name: &params.name,
            symbol: &params.symbol,
            uri: &params.uri,
            payer: params.payer.to_string(),
            pool_creator: params.pool_creator.to_string(),
            config: params.config.to_string(),
            base_mint: params.base_mint.to_string(),
        };
        let resp: InstructionsResponse = self.post("/pool/create", &body).await?;

        let derived = derive_pool_address(&params.config, &params.base_mint, &config.quote_mint);
        if let Some(reported) = resp.pool_address.as_deref() {
            let reported = parse_pubkey(reported, "poolAddress")?;
            if reported != derived {
                return Err(ProtocolError::AddressMismatch { derived, reported });
            }
        }

        let signers = [params.payer, params.pool_creator, params.base_mint];
        let ixs = resp
            .instructions
            .iter()
            .map(|j| parse_instruction(j, &signers))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(pool = %derived, count = ixs.len(), "gateway create_pool instructions parsed");
        Ok(ixs)
    }

    async fn swap(&self, params: &SwapParams) -> Result<Vec<Instruction>, ProtocolError> {
        let body = SwapBody {
            pool: params.pool.to_string(),
            owner: params.owner.to_string(),
            amount_in: params.amount_in.to_string(),
            minimum_amount_out: params.minimum_amount_out.to_string(),
            swap_base_for_quote: params.side.is_base_for_quote(),
        };
        let resp: InstructionsResponse = self.post("/pool/swap", &body).await?;
        resp.instructions
            .iter()
            .map(|j| parse_instruction(j, &[params.owner]))
            .collect()
    }

    async fn get_pool(&self, address: &Pubkey) -> Result<Option<PoolState>, ProtocolError> {
        match self.get_optional::<PoolWire>(&format!("/pool/{}", address)).await? {
            Some(w) => Ok(Some(w.try_into()?)),
            None => Ok(None),
        }
    }

    async fn get_pool_config(&self, address: &Pubkey) -> Result<Option<PoolConfig>, ProtocolError> {
        match self.get_optional::<ConfigWire>(&format!("/config/{}", address)).await? {
            Some(w) => Ok(Some(w.try_into()?)),
            None => Ok(None),
        }
    }

    async fn swap_quote(
        &self,
        pool: &PoolState,
        _config: &PoolConfig,
        side: SwapSide,
        amount_in: u64,
        slippage_bps: u16,
    ) -> Result<QuoteResult, ProtocolError> {
        let body = QuoteBody {
            pool: pool.address.to_string(),
            amount_in: amount_in.to_string(),
            swap_base_for_quote: side.is_base_for_quote(),
            slippage_bps,
        };
        let w: QuoteWire = self.post("/pool/quote", &body).await?;
        Ok(QuoteResult {
            amount_in: parse_amount(&w.amount_in, "amountIn")?,
            amount_out: parse_amount(&w.amount_out, "amountOut")?,
            minimum_amount_out: parse_amount(&w.minimum_amount_out, "minimumAmountOut")?,
            fee: match w.fee.as_deref() {
                Some(f) => parse_amount(f, "fee")?,
                None => 0,
            },
        })
    }

    async fn pool_price(&self, address: &Pubkey) -> Result<Option<PoolPrice>, ProtocolError> {
        self.get_optional(&format!("/pool/{}/price", address)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_instruction_with_allowed_signer() {
        let payer = Pubkey::new_unique();
        let program = super::super::DBC_PROGRAM_ID;
        let j = json!({
            "program_id": program.to_string(),
            "data": STANDARD.encode([1u8, 2, 3]),
            "accounts": [
                { "pubkey": payer.to_string(), "is_signer": true, "is_writable": true },
                { "pubkey": Pubkey::new_unique().to_string(), "is_signer": false, "is_writable": false }
            ]
        });
        let ix = parse_instruction(&j, &[payer]).unwrap();
        assert_eq!(ix.program_id, program);
        assert_eq!(ix.data, vec![1, 2, 3]);
        assert!(ix.accounts[0].is_signer && ix.accounts[0].is_writable);
        assert!(!ix.accounts[1].is_signer);
    }

    #[test]
    fn rejects_unexpected_signer() {
        let payer = Pubkey::new_unique();
        let intruder = Pubkey::new_unique();
        let j = json!({
            "program_id": super::super::DBC_PROGRAM_ID.to_string(),
            "data": "",
            "accounts": [{ "pubkey": intruder.to_string(), "is_signer": true }]
        });
        assert!(matches!(
            parse_instruction(&j, &[payer]),
            Err(ProtocolError::UnexpectedSigner(k)) if k == intruder
        ));
    }

    #[test]
    fn rejects_oversized_data() {
        let j = json!({
            "program_id": super::super::DBC_PROGRAM_ID.to_string(),
            "data": STANDARD.encode(vec![0u8; 5000]),
        });
        assert!(parse_instruction(&j, &[]).is_err());
    }

    #[test]
    fn pool_wire_converts() {
        let w = PoolWire {
            address: Pubkey::new_unique().to_string(),
            config: Pubkey::new_unique().to_string(),
            base_mint: Pubkey::new_unique().to_string(),
            creator: Pubkey::new_unique().to_string(),
            base_reserve: "100".to_string(),
            quote_reserve: "5".to_string(),
            total_supply: "100".to_string(),
            is_migrated: false,
        };
        let state: PoolState = w.try_into().unwrap();
        assert_eq!(state.base_reserve, 100);
        assert_eq!(state.quote_reserve, 5);
    }
}
