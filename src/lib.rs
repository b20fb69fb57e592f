pub mod config;
pub mod errors;
pub mod types;
pub mod validation;
pub mod metrics;
pub mod structured_logging;
pub mod codec;
pub mod ledger;
pub mod protocol;
pub mod tx_builder;
pub mod store;
pub mod orchestrator;
pub mod launches;
pub mod swap;
pub mod chain;
pub mod presets;
pub mod submission;
pub mod wallet;
pub mod api_client;
pub mod client;
pub mod server;
