use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const CURVE_PRESET_STANDARD: &str = "standard";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LaunchStatus {
    Pending,
    Active,
    Migrated,
    Failed,
}

impl LaunchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LaunchStatus::Pending => "pending",
            LaunchStatus::Active => "active",
            LaunchStatus::Migrated => "migrated",
            LaunchStatus::Failed => "failed",
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, LaunchStatus::Pending)
    }
}

impl fmt::Display for LaunchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LaunchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(LaunchStatus::Pending),
            "active" => Ok(LaunchStatus::Active),
            "migrated" => Ok(LaunchStatus::Migrated),
            "failed" => Ok(LaunchStatus::Failed),
            other => Err(format!("unknown launch status: {}", other)),
        }
    }
}

/// A user-created token project, deployed or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Launch {
    pub id: String,
    pub creator_id: String,
    pub name: String,
    pub symbol: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub curve_preset: String,
    pub charity_wallet: String,
    pub charity_name: Option<String>,
    pub status: LaunchStatus,
    pub pool_address: Option<String>,
    pub token_mint: Option<String>,
    pub created_at: DateTime<Utc>,
    pub migrated_at: Option<DateTime<Utc>>,
}

impl Launch {
    /// Addresses staked by an earlier prepare, if both are present.
    pub fn staked_addresses(&self) -> Option<(&str, &str)> {
        match (&self.pool_address, &self.token_mint) {
            (Some(pool), Some(mint)) => Some((pool.as_str(), mint.as_str())),
            _ => None,
        }
    }
}

/// Field changes accepted while a launch is still pending.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchPatch {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub charity_wallet: Option<String>,
    pub charity_name: Option<String>,
}

impl LaunchPatch {
    pub fn is_empty(&self) -> bool {
        self == &LaunchPatch::default()
    }

    pub fn apply(&self, launch: &mut Launch) {
        if let Some(v) = &self.name {
            launch.name = v.clone();
        }
        if let Some(v) = &self.symbol {
            launch.symbol = v.clone();
        }
        if let Some(v) = &self.description {
            launch.description = Some(v.clone());
        }
        if let Some(v) = &self.image {
            launch.image = Some(v.clone());
        }
        if let Some(v) = &self.charity_wallet {
            launch.charity_wallet = v.clone();
        }
        if let Some(v) = &self.charity_name {
            launch.charity_name = Some(v.clone());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwapSide {
    /// Quote token in, base token out
    Buy,
    /// Base token in, quote token out
    Sell,
}

impl SwapSide {
    pub fn is_base_for_quote(&self) -> bool {
        matches!(self, SwapSide::Sell)
    }
}

impl fmt::Display for SwapSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwapSide::Buy => f.write_str("buy"),
            SwapSide::Sell => f.write_str("sell"),
        }
    }
}

// --- RPC payloads ---

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLaunchRequest {
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    pub charity_wallet: String,
    #[serde(default)]
    pub charity_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLaunchRequest {
    pub id: String,
    #[serde(flatten)]
    pub patch: LaunchPatch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdRequest {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdResponse {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListAllRequest {
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub status: Option<LaunchStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickerRequest {
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TickerEntry {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub pool_address: Option<String>,
    pub price: f64,
    pub liquidity_sol: f64,
}

/// Off-chain token metadata served at the URI embedded in the create-pool transaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub description: String,
    pub image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareDeployRequest {
    pub id: String,
    pub creator_wallet: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PrepareDeployResponse {
    /// Base64 unsigned transaction; empty when `already_deployed`.
    pub transaction: String,
    pub base_mint: String,
    pub pool_address: String,
    pub launch_id: String,
    #[serde(default)]
    pub already_deployed: bool,
    #[serde(default)]
    pub last_valid_block_height: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmDeployRequest {
    pub id: String,
    pub pool_address: String,
    pub token_mint: String,
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmDeployResponse {
    pub success: bool,
    pub pool_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoverDeployRequest {
    pub id: String,
    pub pool_address: String,
    pub token_mint: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RecoverDeployResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub already_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovered: Option<bool>,
}

impl RecoverDeployResponse {
    pub fn already_active() -> Self {
        Self {
            success: true,
            already_active: Some(true),
            recovered: None,
        }
    }

    pub fn recovered() -> Self {
        Self {
            success: true,
            already_active: None,
            recovered: Some(true),
        }
    }

    pub fn not_found() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRequest {
    pub pool_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PoolPrice {
    pub pool_address: String,
    pub base_mint: String,
    pub spot_price: f64,
    pub pool_liquidity_sol: f64,
    pub total_supply: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub pool_address: String,
    /// Base units as a decimal string
    pub amount: String,
    pub swap_type: SwapSide,
}

/// Amounts are decimal strings of u64 base units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SwapQuote {
    pub in_amount: String,
    pub out_amount: String,
    pub min_out_amount: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSwapRequest {
    pub pool_address: String,
    pub user_wallet: String,
    pub amount: String,
    pub swap_type: SwapSide,
    #[serde(default)]
    pub slippage_bps: Option<u16>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BuiltSwap {
    pub transaction: String,
    pub in_amount: String,
    pub out_amount: String,
    pub min_out_amount: String,
    pub last_valid_block_height: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricesRequest {
    pub pool_addresses: Vec<String>,
}

/// One row of a batch price lookup; `data` is null when the pool can't be read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PoolPriceEntry {
    pub pool_address: String,
    pub data: Option<PoolPrice>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChainStatus {
    pub slot: u64,
    pub block_height: u64,
    pub epoch: u64,
    pub slot_index: u64,
    pub slots_in_epoch: u64,
    /// Percent of the current epoch elapsed
    pub epoch_progress: f64,
    pub solana_version: String,
}

/// SOL supply in whole SOL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChainSupply {
    pub total: f64,
    pub circulating: f64,
    pub non_circulating: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceRequest {
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WalletBalance {
    pub address: String,
    pub lamports: u64,
    pub sol: f64,
}

/// Percent of every trading fee routed to each party. Sums to 100.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeeDistribution {
    pub platform: u8,
    pub meteora: u8,
    pub creator: u8,
    pub charity: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CurvePreset {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Creator fee at launch
    pub starting_fee_bps: u16,
    /// Creator fee the schedule decays to
    pub ending_fee_bps: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            LaunchStatus::Pending,
            LaunchStatus::Active,
            LaunchStatus::Migrated,
            LaunchStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<LaunchStatus>().unwrap(), status);
        }
        assert!("deployed".parse::<LaunchStatus>().is_err());
    }

    #[test]
    fn recover_response_omits_unset_flags() {
        let json = serde_json::to_value(RecoverDeployResponse::not_found()).unwrap();
        assert_eq!(json, serde_json::json!({ "success": false }));

        let json = serde_json::to_value(RecoverDeployResponse::already_active()).unwrap();
        assert_eq!(json, serde_json::json!({ "success": true, "alreadyActive": true }));
    }

    #[test]
    fn update_request_flattens_patch() {
        let req: UpdateLaunchRequest =
            serde_json::from_str(r#"{"id":"abc","name":"New","charityName":"Fund"}"#).unwrap();
        assert_eq!(req.id, "abc");
        assert_eq!(req.patch.name.as_deref(), Some("New"));
        assert_eq!(req.patch.charity_name.as_deref(), Some("Fund"));
        assert!(req.patch.symbol.is_none());
    }

    #[test]
    fn missing_pool_price_serializes_as_null() {
        let entry = PoolPriceEntry {
            pool_address: "pool".to_string(),
            data: None,
        };
        assert_eq!(
            serde_json::to_value(entry).unwrap(),
            serde_json::json!({ "poolAddress": "pool", "data": null })
        );
    }
}
