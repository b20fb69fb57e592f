mod support;

use std::sync::Arc;
use std::time::Duration;

use parity_launchpad::api_client::LaunchpadApi;
use parity_launchpad::errors::{LaunchpadError, SubmissionError};
use parity_launchpad::protocol::curve;
use parity_launchpad::protocol::memory::InMemoryPoolProtocol;
use parity_launchpad::protocol::{PoolState, NATIVE_MINT};
use parity_launchpad::swap::MAX_BATCH_PRICES;
use parity_launchpad::types::{
    BuildSwapRequest, PriceRequest, PricesRequest, QuoteRequest, SwapSide, TickerRequest,
};
use parity_launchpad::wallet::KeypairWallet;
use solana_sdk::pubkey::Pubkey;
use support::{ConfirmScript, Harness, SendScript};

async fn seeded_pool(h: &Harness) -> PoolState {
    let pool = PoolState {
        address: Pubkey::new_unique(),
        config: h.pool_config,
        base_mint: Pubkey::new_unique(),
        creator: Pubkey::new_unique(),
        base_reserve: 800_000_000_000_000,
        quote_reserve: 12_000_000_000,
        total_supply: 1_000_000_000_000_000,
        is_migrated: false,
    };
    h.protocol.insert_pool(pool.clone()).await;
    pool
}

#[tokio::test]
async fn quote_matches_reference_curve() {
    let h = Harness::detached().await;
    let pool = seeded_pool(&h).await;
    let config = InMemoryPoolProtocol::standard_config(h.pool_config);
    assert_eq!(config.quote_mint, NATIVE_MINT);

    for (side, amount) in [(SwapSide::Buy, 1_000_000_000u64), (SwapSide::Sell, 5_000_000_000_000)] {
        let quote = h
            .api
            .quote(&QuoteRequest {
                pool_address: pool.address.to_string(),
                amount: amount.to_string(),
                swap_type: side,
            })
            .await
            .unwrap();
        let expected = curve::quote(&pool, &config, side, amount, 100);
        assert_eq!(quote.in_amount, amount.to_string());
        assert_eq!(quote.out_amount, expected.amount_out.to_string());
        assert_eq!(quote.min_out_amount, expected.minimum_amount_out.to_string());
    }
}

#[tokio::test]
async fn quote_on_unknown_pool_is_not_found() {
    let h = Harness::detached().await;
    let res = h
        .api
        .quote(&QuoteRequest {
            pool_address: Pubkey::new_unique().to_string(),
            amount: "1000".to_string(),
            swap_type: SwapSide::Buy,
        })
        .await;
    assert!(matches!(res, Err(LaunchpadError::NotFound(ref m)) if m == "Failed to get swap quote"));
}

#[tokio::test]
async fn build_swap_validates_inputs() {
    let h = Harness::detached().await;
    let pool = seeded_pool(&h).await;
    let user = Pubkey::new_unique().to_string();

    let req = |amount: &str, slippage: Option<u16>| BuildSwapRequest {
        pool_address: pool.address.to_string(),
        user_wallet: user.clone(),
        amount: amount.to_string(),
        swap_type: SwapSide::Buy,
        slippage_bps: slippage,
    };

    assert!(matches!(
        h.api.build_swap(&req("0", None)).await,
        Err(LaunchpadError::Validation { .. })
    ));
    assert!(matches!(
        h.api.build_swap(&req("1000", Some(0))).await,
        Err(LaunchpadError::Validation { .. })
    ));
    assert!(matches!(
        h.api.build_swap(&req("1000", Some(5_001))).await,
        Err(LaunchpadError::Validation { .. })
    ));

    let missing = BuildSwapRequest {
        pool_address: Pubkey::new_unique().to_string(),
        ..req("1000", None)
    };
    assert!(matches!(
        h.api.build_swap(&missing).await,
        Err(LaunchpadError::NotFound(ref m)) if m == "Pool not found"
    ));

    let built = h.api.build_swap(&req("1000000000", Some(250))).await.unwrap();
    let expected = curve::quote(
        &pool,
        &InMemoryPoolProtocol::standard_config(h.pool_config),
        SwapSide::Buy,
        1_000_000_000,
        250,
    );
    assert_eq!(built.min_out_amount, expected.minimum_amount_out.to_string());
    assert!(!built.transaction.is_empty());
    assert!(built.last_valid_block_height > 0);
}

#[tokio::test]
async fn client_swap_submits_and_returns_quoted_output() {
    let h = Harness::new(SendScript::Ok, ConfirmScript::OkAfter(Duration::from_millis(5))).await;
    let pool = seeded_pool(&h).await;

    let outcome = h
        .client(Arc::new(KeypairWallet::new_random()))
        .swap(&pool.address.to_string(), "2000000000", SwapSide::Buy, None)
        .await
        .unwrap();
    let expected = curve::quote(
        &pool,
        &InMemoryPoolProtocol::standard_config(h.pool_config),
        SwapSide::Buy,
        2_000_000_000,
        100,
    );
    assert_eq!(outcome.out_amount, expected.amount_out.to_string());
    assert_eq!(h.ledger.send_count(), 1);
}

#[tokio::test]
async fn client_swap_build_failures_are_build_failed() {
    let h = Harness::detached().await;
    let err = h
        .client(Arc::new(KeypairWallet::new_random()))
        .swap(&Pubkey::new_unique().to_string(), "1000", SwapSide::Sell, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SubmissionError::BuildFailed(ref m) if m == "Pool not found"));
}

#[tokio::test]
async fn price_and_ticker_reflect_pool_state() {
    let h = Harness::new(SendScript::Ok, ConfirmScript::OkAfter(Duration::from_millis(5))).await;
    let id = h.create_launch().await;
    let deployed = h
        .client(Arc::new(KeypairWallet::new_random()))
        .deploy(&id)
        .await
        .unwrap();

    let price = h
        .api
        .price(&PriceRequest {
            pool_address: deployed.pool_address.clone(),
        })
        .await
        .unwrap();
    assert_eq!(price.base_mint, deployed.token_mint);
    assert_eq!(price.pool_liquidity_sol, 0.0);
    assert!(price.spot_price > 0.0);

    let ticker = h.api.ticker(&TickerRequest::default()).await.unwrap();
    assert_eq!(ticker.len(), 1);
    assert_eq!(ticker[0].id, id);
    assert_eq!(ticker[0].price, price.spot_price);

    let missing = h
        .api
        .price(&PriceRequest {
            pool_address: Pubkey::new_unique().to_string(),
        })
        .await;
    assert!(matches!(missing, Err(LaunchpadError::NotFound(_))));

    assert!(matches!(
        h.api.ticker(&TickerRequest { limit: Some(21) }).await,
        Err(LaunchpadError::Validation { .. })
    ));
}

#[tokio::test]
async fn batch_prices_report_missing_pools_as_empty() {
    let h = Harness::detached().await;
    let pool = seeded_pool(&h).await;
    let missing = Pubkey::new_unique().to_string();

    let entries = h
        .api
        .prices(&PricesRequest {
            pool_addresses: vec![pool.address.to_string(), missing.clone()],
        })
        .await
        .unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].pool_address, pool.address.to_string());
    let single = h
        .api
        .price(&PriceRequest {
            pool_address: pool.address.to_string(),
        })
        .await
        .unwrap();
    assert_eq!(entries[0].data.as_ref(), Some(&single));
    assert_eq!(entries[1].pool_address, missing);
    assert!(entries[1].data.is_none());

    let too_many = (0..=MAX_BATCH_PRICES).map(|_| Pubkey::new_unique().to_string()).collect();
    assert!(matches!(
        h.api.prices(&PricesRequest { pool_addresses: too_many }).await,
        Err(LaunchpadError::Validation { ref field, .. }) if field == "poolAddresses"
    ));
    assert!(matches!(
        h.api
            .prices(&PricesRequest {
                pool_addresses: vec!["not-a-pool".to_string()],
            })
            .await,
        Err(LaunchpadError::Validation { .. })
    ));
}
