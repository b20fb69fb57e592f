//! Central error taxonomy for the launchpad.
//!
//! Server-side procedures fail with [`LaunchpadError`]; every variant carries a
//! stable wire code so the client can rebuild the same value from an HTTP
//! error body. The client-side submission flow fails with [`SubmissionError`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// High-level error categories for metrics and monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Entity missing or not owned by the caller
    NotFound,
    /// Invalid state transition
    Conflict,
    /// Malformed input or unverifiable on-chain claim
    Validation,
    /// Missing or rejected caller identity
    Auth,
    /// Transaction building failures
    Transaction,
    /// Ledger / protocol gateway transport errors
    Network,
    /// Wallet interaction failures on the client
    Wallet,
    /// Internal system errors
    System,
}

impl ErrorCategory {
    /// Get metric label for this category
    pub fn metric_label(&self) -> &'static str {
        match self {
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::Conflict => "conflict",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Auth => "auth",
            ErrorCategory::Transaction => "transaction",
            ErrorCategory::Network => "network",
            ErrorCategory::Wallet => "wallet",
            ErrorCategory::System => "system",
        }
    }
}

pub const GENERIC_INTERNAL_MESSAGE: &str = "Something went wrong. Please try again.";

/// Domain errors raised by the orchestrator, launch and swap services.
#[derive(Error, Debug)]
pub enum LaunchpadError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{message}")]
    Validation { field: String, message: String },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Transaction build failed: {0}")]
    BuildFailed(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON body used for every error response on the RPC surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl LaunchpadError {
    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict<S: Into<String>>(message: S) -> Self {
        Self::Conflict(message.into())
    }

    pub fn validation<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn build_failed<S: Into<String>>(message: S) -> Self {
        Self::BuildFailed(message.into())
    }

    pub fn upstream<S: Into<String>>(message: S) -> Self {
        Self::Upstream(message.into())
    }

    /// Get the error category for metrics/classification
    pub fn category(&self) -> ErrorCategory {
        match self {
            LaunchpadError::NotFound(_) => ErrorCategory::NotFound,
            LaunchpadError::Conflict(_) => ErrorCategory::Conflict,
            LaunchpadError::Validation { .. } => ErrorCategory::Validation,
            LaunchpadError::Unauthorized => ErrorCategory::Auth,
            LaunchpadError::BuildFailed(_) => ErrorCategory::Transaction,
            LaunchpadError::Upstream(_) => ErrorCategory::Network,
            LaunchpadError::Internal(_) => ErrorCategory::System,
        }
    }

    /// Stable code sent to clients.
    pub fn code(&self) -> &'static str {
        match self {
            LaunchpadError::NotFound(_) => "NOT_FOUND",
            LaunchpadError::Conflict(_) => "CONFLICT",
            LaunchpadError::Validation { .. } => "VALIDATION_ERROR",
            LaunchpadError::Unauthorized => "UNAUTHORIZED",
            LaunchpadError::BuildFailed(_) => "BUILD_FAILED",
            LaunchpadError::Upstream(_) => "UPSTREAM_ERROR",
            LaunchpadError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            LaunchpadError::NotFound(_) => 404,
            LaunchpadError::Conflict(_) => 409,
            LaunchpadError::Validation { .. } => 400,
            LaunchpadError::Unauthorized => 401,
            LaunchpadError::BuildFailed(_) => 502,
            LaunchpadError::Upstream(_) => 502,
            LaunchpadError::Internal(_) => 500,
        }
    }

    /// Message safe to show to the end user. Internal details never leave the server.
    pub fn public_message(&self) -> String {
        match self {
            LaunchpadError::Internal(_) => GENERIC_INTERNAL_MESSAGE.to_string(),
            LaunchpadError::Validation { message, .. } => message.clone(),
            LaunchpadError::Unauthorized => {
                "You need to be logged in to perform this action".to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code().to_string(),
            message: self.public_message(),
        }
    }

    /// Rebuild an error from its wire representation.
    pub fn from_body(body: ErrorBody) -> Self {
        match body.code.as_str() {
            "NOT_FOUND" => Self::NotFound(body.message),
            "CONFLICT" => Self::Conflict(body.message),
            "VALIDATION_ERROR" => Self::Validation {
                field: String::new(),
                message: body.message,
            },
            "UNAUTHORIZED" => Self::Unauthorized,
            "BUILD_FAILED" => Self::BuildFailed(strip_prefix(&body.message, "Transaction build failed: ")),
            "UPSTREAM_ERROR" => Self::Upstream(strip_prefix(&body.message, "Upstream error: ")),
            _ => Self::Internal(anyhow::anyhow!(body.message)),
        }
    }
}

fn strip_prefix(message: &str, prefix: &str) -> String {
    message.strip_prefix(prefix).unwrap_or(message).to_string()
}

/// Terminal failures of the client-side submit/confirm flow.
#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error("Wallet not connected")]
    WalletNotConnected,

    #[error("Transaction rejected by user")]
    UserRejected,

    #[error("Failed to build transaction: {0}")]
    BuildFailed(String),

    #[error("Failed to decode transaction: {0}")]
    Decode(String),

    #[error("Transaction failed: {reason}")]
    SubmissionFailed { reason: String },

    #[error("Transaction expired before confirmation (last valid block height {last_valid_block_height})")]
    ConfirmationTimeout { last_valid_block_height: u64 },

    #[error("Request failed: {0}")]
    Api(#[from] LaunchpadError),
}

impl SubmissionError {
    pub fn submission_failed<S: Into<String>>(reason: S) -> Self {
        Self::SubmissionFailed {
            reason: reason.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            SubmissionError::WalletNotConnected | SubmissionError::UserRejected => {
                ErrorCategory::Wallet
            }
            SubmissionError::BuildFailed(_) | SubmissionError::Decode(_) => {
                ErrorCategory::Transaction
            }
            SubmissionError::SubmissionFailed { .. }
            | SubmissionError::ConfirmationTimeout { .. } => ErrorCategory::Network,
            SubmissionError::Api(e) => e.category(),
        }
    }

    /// The user cancelled; not a failure worth alerting on.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, SubmissionError::UserRejected)
    }
}
