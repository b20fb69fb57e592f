//! Reference bonding curve: constant product over the base reserve and the
//! quote reserve plus the config's virtual quote liquidity. The trade fee is
//! charged on the quote side in both directions.

use super::{PoolConfig, PoolState, QuoteResult, BASE_DECIMALS, QUOTE_DECIMALS};
use crate::types::SwapSide;

const BPS_DENOMINATOR: u128 = 10_000;

fn effective_quote(pool: &PoolState, config: &PoolConfig) -> u128 {
    config.virtual_quote_reserve as u128 + pool.quote_reserve as u128
}

fn apply_bps(amount: u128, bps: u16) -> u128 {
    amount * (BPS_DENOMINATOR - (bps as u128).min(BPS_DENOMINATOR)) / BPS_DENOMINATOR
}

/// Output for `amount_in` on `side`, with the slippage floor applied to the output.
pub fn quote(
    pool: &PoolState,
    config: &PoolConfig,
    side: SwapSide,
    amount_in: u64,
    slippage_bps: u16,
) -> QuoteResult {
    let base = pool.base_reserve as u128;
    let quote = effective_quote(pool, config);
    let amount = amount_in as u128;

    let (amount_out, fee) = match side {
        SwapSide::Buy => {
            let net = apply_bps(amount, config.fee_bps);
            let fee = amount - net;
            let denom = quote + net;
            let out = if denom == 0 { 0 } else { base * net / denom };
            (out.min(base), fee)
        }
        SwapSide::Sell => {
            let denom = base + amount;
            let gross = if denom == 0 { 0 } else { quote * amount / denom };
            // Only real lamports can leave the pool
            let gross = gross.min(pool.quote_reserve as u128);
            let net = apply_bps(gross, config.fee_bps);
            (net, gross - net)
        }
    };

    QuoteResult {
        amount_in,
        amount_out: amount_out as u64,
        minimum_amount_out: apply_bps(amount_out, slippage_bps) as u64,
        fee: fee as u64,
    }
}

/// Price of one whole base token in SOL.
pub fn spot_price(pool: &PoolState, config: &PoolConfig) -> f64 {
    if pool.base_reserve == 0 {
        return 0.0;
    }
    let quote_sol = effective_quote(pool, config) as f64 / 10f64.powi(QUOTE_DECIMALS as i32);
    let base_tokens = pool.base_reserve as f64 / 10f64.powi(BASE_DECIMALS as i32);
    quote_sol / base_tokens
}

pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / 10f64.powi(QUOTE_DECIMALS as i32)
}

/// Move reserves as if the quoted swap executed.
pub fn apply_swap(pool: &mut PoolState, side: SwapSide, result: &QuoteResult) {
    match side {
        SwapSide::Buy => {
            let net_in = result.amount_in.saturating_sub(result.fee);
            pool.quote_reserve = pool.quote_reserve.saturating_add(net_in);
            pool.base_reserve = pool.base_reserve.saturating_sub(result.amount_out);
        }
        SwapSide::Sell => {
            pool.base_reserve = pool.base_reserve.saturating_add(result.amount_in);
            pool.quote_reserve = pool
                .quote_reserve
                .saturating_sub(result.amount_out.saturating_add(result.fee));
        }
    }
}
