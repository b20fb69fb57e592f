/*!
Command-line client for a launchpad server.

Signs with a local keypair file and drives the same deploy and swap flows a
browser wallet would: fetch an unsigned transaction, sign, submit with
rebroadcast, confirm.

Usage:
    parity_cli --server http://127.0.0.1:8080 --user <ID> --keypair wallet.json deploy <LAUNCH_ID>
    parity_cli --keypair wallet.json swap <POOL> <AMOUNT> --side buy --slippage-bps 100
    parity_cli quote <POOL> <AMOUNT> --side sell
*/

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::EnvFilter;

use parity_launchpad::api_client::{HttpLaunchpadApi, LaunchpadApi};
use parity_launchpad::client::LaunchpadClient;
use parity_launchpad::config::Config;
use parity_launchpad::ledger::RpcLedger;
use parity_launchpad::submission::{SubmissionController, SubmissionSettings};
use parity_launchpad::types::SwapSide;
use parity_launchpad::wallet::KeypairWallet;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Launchpad server base URL.
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    server: String,

    /// Caller identity sent in the auth header.
    #[arg(long)]
    user: Option<String>,

    /// Keypair file (JSON byte array or base58). A random key is used when omitted.
    #[arg(long)]
    keypair: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Deploy a pending launch on-chain.
    Deploy { launch_id: String },
    /// Buy or sell against a launch pool.
    Swap {
        pool: String,
        amount: String,
        #[arg(long, value_enum, default_value_t = Side::Buy)]
        side: Side,
        #[arg(long)]
        slippage_bps: Option<u16>,
    },
    /// Quote a swap without submitting.
    Quote {
        pool: String,
        amount: String,
        #[arg(long, value_enum, default_value_t = Side::Buy)]
        side: Side,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Side {
    Buy,
    Sell,
}

impl From<Side> for SwapSide {
    fn from(side: Side) -> Self {
        match side {
            Side::Buy => SwapSide::Buy,
            Side::Sell => SwapSide::Sell,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let cfg = Config::load()?;

    let wallet = match &cli.keypair {
        Some(path) => KeypairWallet::from_file(path)?,
        None => KeypairWallet::new_random(),
    };
    let api: Arc<dyn LaunchpadApi> = Arc::new(HttpLaunchpadApi::new(
        &cli.server,
        &cfg.auth_header,
        cli.user.clone(),
        cfg.rpc_timeout(),
    )?);
    let submission = SubmissionController::new(
        Arc::new(RpcLedger::new(&cfg)),
        Arc::new(wallet),
        SubmissionSettings::from_config(&cfg),
    );
    let client = LaunchpadClient::new(api, submission, cfg.confirm_settle());

    let outcome = match cli.command {
        Command::Deploy { launch_id } => client.deploy(&launch_id).await.map(|d| {
            serde_json::json!({
                "launchId": d.launch_id,
                "poolAddress": d.pool_address,
                "tokenMint": d.token_mint,
                "signature": d.signature.map(|s| s.to_string()),
            })
        }),
        Command::Swap {
            pool,
            amount,
            side,
            slippage_bps,
        } => client
            .swap(&pool, &amount, side.into(), slippage_bps)
            .await
            .map(|s| serde_json::json!({ "signature": s.signature.to_string(), "outAmount": s.out_amount })),
        Command::Quote { pool, amount, side } => client
            .quote(&pool, &amount, side.into())
            .await
            .map(|q| {
                serde_json::json!({
                    "inAmount": q.in_amount,
                    "outAmount": q.out_amount,
                    "minOutAmount": q.min_out_amount,
                })
            }),
    };

    match outcome {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(e) => {
            error!(category = e.category().metric_label(), "{}", e);
            Err(e.into())
        }
    }
}
