//! Static launch economics published to clients.

use crate::types::{CurvePreset, FeeDistribution, CURVE_PRESET_STANDARD};

/// Trading fee split. The platform share is capped on-chain.
pub const FEE_DISTRIBUTION: FeeDistribution = FeeDistribution {
    platform: 15,
    meteora: 30,
    creator: 25,
    charity: 30,
};

/// Every launch is created with the standard preset.
pub fn curve_presets() -> Vec<CurvePreset> {
    vec![CurvePreset {
        id: CURVE_PRESET_STANDARD.to_string(),
        name: "Standard".to_string(),
        description: "Dynamic creator fee that starts high for early trading and decays as the token grows"
            .to_string(),
        starting_fee_bps: 95,
        ending_fee_bps: 5,
    }]
}
