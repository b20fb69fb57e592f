//! Launch persistence. Every mutating call is conditional on ownership and,
//! where it matters, on `status = pending`; the returned bool says whether a
//! row matched.

pub mod memory;
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{Launch, LaunchPatch, LaunchStatus};

#[async_trait]
pub trait LaunchStore: Send + Sync {
    async fn insert(&self, launch: &Launch) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Option<Launch>>;

    async fn get_by_mint(&self, token_mint: &str) -> Result<Option<Launch>>;

    async fn get_owned(&self, id: &str, creator_id: &str) -> Result<Option<Launch>>;

    /// Newest first.
    async fn list_by_creator(&self, creator_id: &str) -> Result<Vec<Launch>>;

    /// Newest first.
    async fn list(&self, status: Option<LaunchStatus>, limit: u32) -> Result<Vec<Launch>>;

    async fn update_pending(&self, id: &str, creator_id: &str, patch: &LaunchPatch) -> Result<bool>;

    /// Record derived addresses ahead of the deploy landing. Status is unchanged.
    async fn stage_addresses(
        &self,
        id: &str,
        creator_id: &str,
        pool_address: &str,
        token_mint: &str,
    ) -> Result<bool>;

    /// `pending -> active` with the verified addresses.
    async fn activate(
        &self,
        id: &str,
        creator_id: &str,
        pool_address: &str,
        token_mint: &str,
    ) -> Result<bool>;

    async fn delete_pending(&self, id: &str, creator_id: &str) -> Result<bool>;
}
