//! Input checks shared by the launch, deploy and swap procedures.

use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use url::Url;

use crate::config::MAX_SLIPPAGE_BPS;
use crate::errors::LaunchpadError;
use crate::types::{CreateLaunchRequest, LaunchPatch};

pub const MAX_NAME_LEN: usize = 50;
pub const MAX_SYMBOL_LEN: usize = 10;
pub const MAX_DESCRIPTION_LEN: usize = 500;
pub const MAX_CHARITY_NAME_LEN: usize = 100;
pub const MAX_SIGNATURE_LEN: usize = 128;

pub fn parse_pubkey(field: &str, value: &str) -> Result<Pubkey, LaunchpadError> {
    Pubkey::from_str(value.trim())
        .map_err(|_| LaunchpadError::validation(field, format!("Invalid {}", field)))
}

pub fn parse_amount(field: &str, value: &str) -> Result<u64, LaunchpadError> {
    match value.trim().parse::<u64>() {
        Ok(0) => Err(LaunchpadError::validation(field, "Amount must be greater than 0")),
        Ok(v) => Ok(v),
        Err(_) => Err(LaunchpadError::validation(
            field,
            "Amount must be a positive integer in base units",
        )),
    }
}

pub fn check_slippage(bps: u16) -> Result<u16, LaunchpadError> {
    if bps == 0 || bps > MAX_SLIPPAGE_BPS {
        return Err(LaunchpadError::validation(
            "slippageBps",
            format!("Slippage must be between 1 and {} bps", MAX_SLIPPAGE_BPS),
        ));
    }
    Ok(bps)
}

pub fn check_signature(signature: &str) -> Result<(), LaunchpadError> {
    if signature.is_empty() || signature.len() > MAX_SIGNATURE_LEN {
        return Err(LaunchpadError::validation("signature", "Invalid signature"));
    }
    Ok(())
}

fn check_len(field: &str, value: &str, min: usize, max: usize) -> Result<(), LaunchpadError> {
    let len = value.chars().count();
    if len < min {
        return Err(LaunchpadError::validation(field, format!("{} is required", field)));
    }
    if len > max {
        return Err(LaunchpadError::validation(
            field,
            format!("{} must be at most {} characters", field, max),
        ));
    }
    Ok(())
}

fn check_image(value: &str) -> Result<(), LaunchpadError> {
    match Url::parse(value) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(()),
        _ => Err(LaunchpadError::validation("image", "Image must be a valid URL")),
    }
}

fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// Validate a new launch and return it normalized (trimmed, symbol upper-cased).
pub fn validate_create(input: &CreateLaunchRequest) -> Result<CreateLaunchRequest, LaunchpadError> {
    let name = input.name.trim().to_string();
    check_len("name", &name, 1, MAX_NAME_LEN)?;
    let symbol = normalize_symbol(&input.symbol);
    check_len("symbol", &symbol, 1, MAX_SYMBOL_LEN)?;
    if let Some(d) = &input.description {
        check_len("description", d, 0, MAX_DESCRIPTION_LEN)?;
    }
    if let Some(img) = &input.image {
        check_image(img)?;
    }
    parse_pubkey("charityWallet", &input.charity_wallet)?;
    if let Some(c) = &input.charity_name {
        check_len("charityName", c, 0, MAX_CHARITY_NAME_LEN)?;
    }

    Ok(CreateLaunchRequest {
        name,
        symbol,
        description: input.description.clone(),
        image: input.image.clone(),
        charity_wallet: input.charity_wallet.trim().to_string(),
        charity_name: input.charity_name.clone(),
    })
}

/// Same rules as creation, applied to the fields present.
pub fn validate_patch(patch: &LaunchPatch) -> Result<LaunchPatch, LaunchpadError> {
    let mut out = patch.clone();
    if let Some(n) = &patch.name {
        let n = n.trim().to_string();
        check_len("name", &n, 1, MAX_NAME_LEN)?;
        out.name = Some(n);
    }
    if let Some(s) = &patch.symbol {
        let s = normalize_symbol(s);
        check_len("symbol", &s, 1, MAX_SYMBOL_LEN)?;
        out.symbol = Some(s);
    }
    if let Some(d) = &patch.description {
        check_len("description", d, 0, MAX_DESCRIPTION_LEN)?;
    }
    if let Some(img) = &patch.image {
        check_image(img)?;
    }
    if let Some(w) = &patch.charity_wallet {
        parse_pubkey("charityWallet", w)?;
        out.charity_wallet = Some(w.trim().to_string());
    }
    if let Some(c) = &patch.charity_name {
        check_len("charityName", c, 0, MAX_CHARITY_NAME_LEN)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> CreateLaunchRequest {
        CreateLaunchRequest {
            name: "  Alpha Fund ".to_string(),
            symbol: "alpha".to_string(),
            description: Some("for the reef".to_string()),
            image: Some("https://img.example/alpha.png".to_string()),
            charity_wallet: Pubkey::new_unique().to_string(),
            charity_name: Some("Reef Trust".to_string()),
        }
    }

    #[test]
    fn normalizes_valid_input() {
        let v = validate_create(&input()).unwrap();
        assert_eq!(v.name, "Alpha Fund");
        assert_eq!(v.symbol, "ALPHA");
    }

    #[test]
    fn rejects_out_of_range_fields() {
        let mut bad = input();
        bad.symbol = "WAYTOOLONGSYM".to_string();
        assert!(matches!(validate_create(&bad), Err(LaunchpadError::Validation { ref field, .. }) if field == "symbol"));

        let mut bad = input();
        bad.image = Some("ftp://img.example/a.png".to_string());
        assert!(validate_create(&bad).is_err());

        let mut bad = input();
        bad.charity_wallet = "not-a-key".to_string();
        assert!(validate_create(&bad).is_err());

        let mut bad = input();
        bad.name = "   ".to_string();
        assert!(validate_create(&bad).is_err());
    }

    #[test]
    fn amounts_and_slippage() {
        assert_eq!(parse_amount("amount", "1000").unwrap(), 1000);
        assert!(parse_amount("amount", "0").is_err());
        assert!(parse_amount("amount", "-5").is_err());
        assert!(parse_amount("amount", "1.5").is_err());
        assert!(check_slippage(0).is_err());
        assert!(check_slippage(5_001).is_err());
        assert_eq!(check_slippage(5_000).unwrap(), 5_000);
    }

    #[test]
    fn patch_applies_same_rules() {
        let patch = LaunchPatch {
            symbol: Some("beta".to_string()),
            ..Default::default()
        };
        assert_eq!(validate_patch(&patch).unwrap().symbol.as_deref(), Some("BETA"));

        let patch = LaunchPatch {
            description: Some("x".repeat(501)),
            ..Default::default()
        };
        assert!(validate_patch(&patch).is_err());
    }
}
