//! Client-side deploy and swap flows.

use async_trait::async_trait;
use solana_sdk::signature::Signature;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::api_client::LaunchpadApi;
use crate::errors::{LaunchpadError, SubmissionError};
use crate::submission::{OutcomeProbe, SubmissionController};
use crate::types::{
    BuildSwapRequest, ConfirmDeployRequest, PrepareDeployRequest, QuoteRequest,
    RecoverDeployRequest, SwapQuote, SwapSide,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployOutcome {
    pub launch_id: String,
    pub pool_address: String,
    pub token_mint: String,
    /// `None` when the pool was already on-chain and nothing was submitted.
    pub signature: Option<Signature>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapOutcome {
    pub signature: Signature,
    pub out_amount: String,
}

/// Asks the server to activate the launch; success means the pool exists.
struct DeployProbe<'a> {
    api: &'a dyn LaunchpadApi,
    request: RecoverDeployRequest,
}

#[async_trait]
impl OutcomeProbe for DeployProbe<'_> {
    async fn has_landed(&self) -> bool {
        match self.api.recover_deploy(&self.request).await {
            Ok(resp) => resp.success,
            Err(e) => {
                warn!(launch_id = %self.request.id, "recovery probe failed: {}", e);
                false
            }
        }
    }
}

pub struct LaunchpadClient {
    api: Arc<dyn LaunchpadApi>,
    submission: SubmissionController,
    confirm_settle: Duration,
}

impl LaunchpadClient {
    pub fn new(api: Arc<dyn LaunchpadApi>, submission: SubmissionController, confirm_settle: Duration) -> Self {
        Self {
            api,
            submission,
            confirm_settle,
        }
    }

    pub async fn deploy(&self, launch_id: &str) -> Result<DeployOutcome, SubmissionError> {
        let creator = self
            .submission
            .wallet()
            .pubkey()
            .ok_or(SubmissionError::WalletNotConnected)?;

        let prepared = self
            .api
            .prepare_deploy(&PrepareDeployRequest {
                id: launch_id.to_string(),
                creator_wallet: creator.to_string(),
            })
            .await
            .map_err(|e| SubmissionError::BuildFailed(e.public_message()))?;

        let done = |signature| DeployOutcome {
            launch_id: launch_id.to_string(),
            pool_address: prepared.pool_address.clone(),
            token_mint: prepared.base_mint.clone(),
            signature,
        };

        if prepared.already_deployed {
            info!(launch_id, pool = %prepared.pool_address, "launch already deployed");
            return Ok(done(None));
        }

        let recover = RecoverDeployRequest {
            id: launch_id.to_string(),
            pool_address: prepared.pool_address.clone(),
            token_mint: prepared.base_mint.clone(),
        };
        // A previous attempt may have landed after its client gave up.
        match self.api.recover_deploy(&recover).await {
            Ok(resp) if resp.success => {
                info!(launch_id, pool = %prepared.pool_address, "deploy recovered before submit");
                return Ok(done(None));
            }
            Ok(_) => {}
            Err(e) => debug!(launch_id, "recovery pre-check failed: {}", e),
        }

        let probe = DeployProbe {
            api: self.api.as_ref(),
            request: recover,
        };
        let signature = self
            .submission
            .submit_and_confirm(
                &prepared.transaction,
                prepared.last_valid_block_height,
                Some(&probe),
            )
            .await?;

        tokio::time::sleep(self.confirm_settle).await;

        let confirmed = self
            .api
            .confirm_deploy(&ConfirmDeployRequest {
                id: launch_id.to_string(),
                pool_address: prepared.pool_address.clone(),
                token_mint: prepared.base_mint.clone(),
                signature: signature.to_string(),
            })
            .await;
        if let Err(e) = confirmed {
            // The recovery probe or another client may have activated this pool already.
            let activated = matches!(e, LaunchpadError::Conflict(_))
                && self.is_active_with(launch_id, &prepared.pool_address).await;
            if !activated {
                return Err(e.into());
            }
            debug!(launch_id, "launch already active after submit");
        }

        info!(launch_id, pool = %prepared.pool_address, %signature, "deploy confirmed");
        Ok(done(Some(signature)))
    }

    async fn is_active_with(&self, launch_id: &str, pool_address: &str) -> bool {
        match self.api.get_launch(launch_id).await {
            Ok(launch) => {
                !launch.status.is_pending() && launch.pool_address.as_deref() == Some(pool_address)
            }
            Err(_) => false,
        }
    }

    pub async fn swap(
        &self,
        pool_address: &str,
        amount: &str,
        side: SwapSide,
        slippage_bps: Option<u16>,
    ) -> Result<SwapOutcome, SubmissionError> {
        let owner = self
            .submission
            .wallet()
            .pubkey()
            .ok_or(SubmissionError::WalletNotConnected)?;

        let built = self
            .api
            .build_swap(&BuildSwapRequest {
                pool_address: pool_address.to_string(),
                user_wallet: owner.to_string(),
                amount: amount.to_string(),
                swap_type: side,
                slippage_bps,
            })
            .await
            .map_err(|e| SubmissionError::BuildFailed(e.public_message()))?;

        let signature = self
            .submission
            .submit_and_confirm(&built.transaction, built.last_valid_block_height, None)
            .await?;

        info!(pool = pool_address, side = %side, %signature, out = %built.out_amount, "swap confirmed");
        Ok(SwapOutcome {
            signature,
            out_amount: built.out_amount,
        })
    }

    pub async fn quote(&self, pool_address: &str, amount: &str, side: SwapSide) -> Result<SwapQuote, SubmissionError> {
        Ok(self
            .api
            .quote(&QuoteRequest {
                pool_address: pool_address.to_string(),
                amount: amount.to_string(),
                swap_type: side,
            })
            .await?)
    }
}
