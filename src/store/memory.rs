use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::LaunchStore;
use crate::types::{Launch, LaunchPatch, LaunchStatus};

#[derive(Debug, Default)]
pub struct InMemoryLaunchStore {
    launches: RwLock<HashMap<String, Launch>>,
}

impl InMemoryLaunchStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn newest_first(mut launches: Vec<Launch>) -> Vec<Launch> {
        launches.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        launches
    }

    /// Apply `f` to the row when it is owned by `creator_id` and pending.
    async fn with_pending<F: FnOnce(&mut Launch)>(&self, id: &str, creator_id: &str, f: F) -> bool {
        let mut launches = self.launches.write().await;
        match launches.get_mut(id) {
            Some(l) if l.creator_id == creator_id && l.status.is_pending() => {
                f(l);
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl LaunchStore for InMemoryLaunchStore {
    async fn insert(&self, launch: &Launch) -> Result<()> {
        let mut launches = self.launches.write().await;
        if launches.contains_key(&launch.id) {
            anyhow::bail!("launch {} already exists", launch.id);
        }
        launches.insert(launch.id.clone(), launch.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Launch>> {
        Ok(self.launches.read().await.get(id).cloned())
    }

    async fn get_by_mint(&self, token_mint: &str) -> Result<Option<Launch>> {
        Ok(self
            .launches
            .read()
            .await
            .values()
            .find(|l| l.token_mint.as_deref() == Some(token_mint))
            .cloned())
    }

    async fn get_owned(&self, id: &str, creator_id: &str) -> Result<Option<Launch>> {
        Ok(self
            .launches
            .read()
            .await
            .get(id)
            .filter(|l| l.creator_id == creator_id)
            .cloned())
    }

    async fn list_by_creator(&self, creator_id: &str) -> Result<Vec<Launch>> {
        let owned = self
            .launches
            .read()
            .await
            .values()
            .filter(|l| l.creator_id == creator_id)
            .cloned()
            .collect();
        Ok(Self::newest_first(owned))
    }

    async fn list(&self, status: Option<LaunchStatus>, limit: u32) -> Result<Vec<Launch>> {
        let matching = self
            .launches
            .read()
            .await
            .values()
            .filter(|l| status.map_or(true, |s| l.status == s))
            .cloned()
            .collect();
        let mut sorted = Self::newest_first(matching);
        sorted.truncate(limit as usize);
        Ok(sorted)
    }

    async fn update_pending(&self, id: &str, creator_id: &str, patch: &LaunchPatch) -> Result<bool> {
        Ok(self.with_pending(id, creator_id, |l| patch.apply(l)).await)
    }

    async fn stage_addresses(
        &self,
        id: &str,
        creator_id: &str,
        pool_address: &str,
        token_mint: &str,
    ) -> Result<bool> {
        Ok(self
            .with_pending(id, creator_id, |l| {
                l.pool_address = Some(pool_address.to_string());
                l.token_mint = Some(token_mint.to_string());
            })
            .await)
    }

    async fn activate(
        &self,
        id: &str,
        creator_id: &str,
        pool_address: &str,
        token_mint: &str,
    ) -> Result<bool> {
        Ok(self
            .with_pending(id, creator_id, |l| {
                l.pool_address = Some(pool_address.to_string());
                l.token_mint = Some(token_mint.to_string());
                l.status = LaunchStatus::Active;
            })
            .await)
    }

    async fn delete_pending(&self, id: &str, creator_id: &str) -> Result<bool> {
        let mut launches = self.launches.write().await;
        match launches.get(id) {
            Some(l) if l.creator_id == creator_id && l.status.is_pending() => {
                launches.remove(id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn launch(id: &str, creator: &str, age_secs: i64) -> Launch {
        Launch {
            id: id.to_string(),
            creator_id: creator.to_string(),
            name: "Alpha".to_string(),
            symbol: "ALPHA".to_string(),
            description: None,
            image: None,
            curve_preset: "standard".to_string(),
            charity_wallet: "11111111111111111111111111111111".to_string(),
            charity_name: None,
            status: LaunchStatus::Pending,
            pool_address: None,
            token_mint: None,
            created_at: Utc::now() - Duration::seconds(age_secs),
            migrated_at: None,
        }
    }

    #[tokio::test]
    async fn conditional_writes_respect_owner_and_status() {
        let store = InMemoryLaunchStore::new();
        store.insert(&launch("a", "alice", 0)).await.unwrap();

        assert!(!store.activate("a", "mallory", "pool", "mint").await.unwrap());
        assert!(store.activate("a", "alice", "pool", "mint").await.unwrap());
        // No longer pending
        assert!(!store.stage_addresses("a", "alice", "p2", "m2").await.unwrap());
        assert!(!store.delete_pending("a", "alice").await.unwrap());

        let l = store.get("a").await.unwrap().unwrap();
        assert_eq!(l.status, LaunchStatus::Active);
        assert_eq!(l.staked_addresses(), Some(("pool", "mint")));
        assert_eq!(store.get_by_mint("mint").await.unwrap().unwrap().id, "a");
    }

    #[tokio::test]
    async fn lists_newest_first_with_limit() {
        let store = InMemoryLaunchStore::new();
        store.insert(&launch("old", "alice", 30)).await.unwrap();
        store.insert(&launch("new", "alice", 1)).await.unwrap();
        store.insert(&launch("other", "bob", 10)).await.unwrap();

        let mine: Vec<_> = store.list_by_creator("alice").await.unwrap().into_iter().map(|l| l.id).collect();
        assert_eq!(mine, vec!["new", "old"]);

        let top: Vec<_> = store.list(None, 2).await.unwrap().into_iter().map(|l| l.id).collect();
        assert_eq!(top, vec!["new", "other"]);

        assert!(store.list(Some(LaunchStatus::Active), 10).await.unwrap().is_empty());
    }
}
