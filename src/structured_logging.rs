use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info, warn};

/// Global correlation ID generator
static CORRELATION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate a new correlation ID
pub fn new_correlation_id() -> u64 {
    CORRELATION_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Structured logging with correlation ID support
#[derive(Clone, Debug)]
pub struct StructuredLogger {
    correlation_id: u64,
    component: String,
}

impl StructuredLogger {
    pub fn new(component: &str) -> Self {
        Self {
            correlation_id: new_correlation_id(),
            component: component.to_string(),
        }
    }

    pub fn with_correlation_id(component: &str, correlation_id: u64) -> Self {
        Self {
            correlation_id,
            component: component.to_string(),
        }
    }

    pub fn correlation_id(&self) -> u64 {
        self.correlation_id
    }

    fn log_structured(&self, level: &str, message: &str, extra_fields: serde_json::Value) {
        let log_entry = json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "level": level,
            "component": self.component,
            "correlation_id": self.correlation_id,
            "message": message,
            "fields": extra_fields
        });

        let log_string = log_entry.to_string();

        match level {
            "DEBUG" => debug!(target: "structured", "{}", log_string),
            "INFO" => info!(target: "structured", "{}", log_string),
            "WARN" => warn!(target: "structured", "{}", log_string),
            "ERROR" => error!(target: "structured", "{}", log_string),
            _ => info!(target: "structured", "{}", log_string),
        }
    }

    pub fn info(&self, message: &str, fields: serde_json::Value) {
        self.log_structured("INFO", message, fields);
    }

    pub fn warn(&self, message: &str, fields: serde_json::Value) {
        self.log_structured("WARN", message, fields);
    }

    pub fn error(&self, message: &str, fields: serde_json::Value) {
        self.log_structured("ERROR", message, fields);
    }

    pub fn debug(&self, message: &str, fields: serde_json::Value) {
        self.log_structured("DEBUG", message, fields);
    }

    pub fn log_deploy_prepared(&self, launch_id: &str, pool_address: &str, token_mint: &str) {
        self.info("deploy_prepared", json!({
            "launch_id": launch_id,
            "pool_address": pool_address,
            "token_mint": token_mint,
            "action": "prepare"
        }));
    }

    pub fn log_deploy_activated(&self, launch_id: &str, pool_address: &str, via: &str) {
        self.info("deploy_activated", json!({
            "launch_id": launch_id,
            "pool_address": pool_address,
            "via": via,
            "action": "activate"
        }));
    }

    pub fn log_pool_verification(&self, pool_address: &str, attempts: u32, found: bool) {
        let level = if found { "INFO" } else { "WARN" };
        self.log_structured(level, "pool_verification", json!({
            "pool_address": pool_address,
            "attempts": attempts,
            "found": found,
            "action": "verify"
        }));
    }

    pub fn log_submission_sent(&self, signature: &str, last_valid_block_height: u64) {
        self.info("submission_sent", json!({
            "signature": signature,
            "last_valid_block_height": last_valid_block_height,
            "action": "send"
        }));
    }

    pub fn log_submission_outcome(&self, signature: &str, outcome: &str, latency_ms: u64) {
        let level = if outcome == "confirmed" || outcome == "recovered" { "INFO" } else { "WARN" };
        self.log_structured(level, "submission_outcome", json!({
            "signature": signature,
            "outcome": outcome,
            "latency_ms": latency_ms,
            "action": "outcome"
        }));
    }

    pub fn log_rebroadcast_stopped(&self, sends: u64, elapsed_ms: u64) {
        self.debug("rebroadcast_stopped", json!({
            "sends": sends,
            "elapsed_ms": elapsed_ms,
            "action": "rebroadcast"
        }));
    }
}

/// Pipeline context that carries correlation ID through operations
#[derive(Clone, Debug)]
pub struct PipelineContext {
    pub correlation_id: u64,
    pub logger: StructuredLogger,
}

impl PipelineContext {
    pub fn new(component: &str) -> Self {
        let logger = StructuredLogger::new(component);
        let correlation_id = logger.correlation_id();
        Self {
            correlation_id,
            logger,
        }
    }

    pub fn with_correlation_id(component: &str, correlation_id: u64) -> Self {
        let logger = StructuredLogger::with_correlation_id(component, correlation_id);
        Self {
            correlation_id,
            logger,
        }
    }

    pub fn child(&self, component: &str) -> Self {
        Self::with_correlation_id(component, self.correlation_id)
    }
}
