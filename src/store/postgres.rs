use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, Executor, PgPool};
use std::sync::Arc;
use tracing::info;

use super::LaunchStore;
use crate::types::{Launch, LaunchPatch, LaunchStatus};

const SCHEMA: &str = include_str!("../../migrations/0001_launch.sql");

const SELECT_COLUMNS: &str = r#"
    id, creator_id, name, symbol, description, image, curve_preset,
    charity_wallet, charity_name, status, pool_address, token_mint,
    created_at, migrated_at
"#;

#[derive(sqlx::FromRow, Debug, Clone)]
struct LaunchRow {
    id: String,
    creator_id: String,
    name: String,
    symbol: String,
    description: Option<String>,
    image: Option<String>,
    curve_preset: String,
    charity_wallet: String,
    charity_name: Option<String>,
    status: String,
    pool_address: Option<String>,
    token_mint: Option<String>,
    created_at: DateTime<Utc>,
    migrated_at: Option<DateTime<Utc>>,
}

impl TryFrom<LaunchRow> for Launch {
    type Error = anyhow::Error;

    fn try_from(row: LaunchRow) -> Result<Self> {
        let status = row
            .status
            .parse::<LaunchStatus>()
            .map_err(|e| anyhow!("launch {}: {}", row.id, e))?;
        Ok(Launch {
            id: row.id,
            creator_id: row.creator_id,
            name: row.name,
            symbol: row.symbol,
            description: row.description,
            image: row.image,
            curve_preset: row.curve_preset,
            charity_wallet: row.charity_wallet,
            charity_name: row.charity_name,
            status,
            pool_address: row.pool_address,
            token_mint: row.token_mint,
            created_at: row.created_at,
            migrated_at: row.migrated_at,
        })
    }
}

fn into_launches(rows: Vec<LaunchRow>) -> Result<Vec<Launch>> {
    rows.into_iter().map(Launch::try_from).collect()
}

#[derive(Debug, Clone)]
pub struct PostgresLaunchStore {
    db: Arc<PgPool>,
}

impl PostgresLaunchStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("failed to connect to postgres")?;
        info!("Connected to database");
        Ok(Self { db: Arc::new(db) })
    }

    /// Apply the bundled schema; every statement is idempotent.
    pub async fn ensure_schema(&self) -> Result<()> {
        (&*self.db)
            .execute(SCHEMA)
            .await
            .context("failed to apply launch schema")?;
        Ok(())
    }

    async fn fetch_one_where(&self, clause: &str, value: &str) -> Result<Option<Launch>> {
        let query = format!("SELECT {} FROM launch WHERE {} = $1", SELECT_COLUMNS, clause);
        let row = sqlx::query_as::<_, LaunchRow>(&query)
            .bind(value)
            .fetch_optional(&*self.db)
            .await
            .with_context(|| format!("failed to fetch launch by {}", clause))?;
        row.map(Launch::try_from).transpose()
    }
}

#[async_trait]
impl LaunchStore for PostgresLaunchStore {
    async fn insert(&self, launch: &Launch) -> Result<()> {
        let insert_sql = r#"
        INSERT INTO launch(
        id,
        creator_id,
        name,
        symbol,
        description,
        image,
        curve_preset,
        charity_wallet,
        charity_name,
        status,
        pool_address,
        token_mint,
        created_at,
        migrated_at
        ) VALUES($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"#;

        sqlx::query(insert_sql)
            .bind(&launch.id)
            .bind(&launch.creator_id)
            .bind(&launch.name)
            .bind(&launch.symbol)
            .bind(&launch.description)
            .bind(&launch.image)
            .bind(&launch.curve_preset)
            .bind(&launch.charity_wallet)
            .bind(&launch.charity_name)
            .bind(launch.status.as_str())
            .bind(&launch.pool_address)
            .bind(&launch.token_mint)
            .bind(launch.created_at)
            .bind(launch.migrated_at)
            .execute(&*self.db)
            .await
            .context("failed to insert launch")?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Launch>> {
        self.fetch_one_where("id", id).await
    }

    async fn get_by_mint(&self, token_mint: &str) -> Result<Option<Launch>> {
        self.fetch_one_where("token_mint", token_mint).await
    }

    async fn get_owned(&self, id: &str, creator_id: &str) -> Result<Option<Launch>> {
        let query = format!(
            "SELECT {} FROM launch WHERE id = $1 AND creator_id = $2",
            SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, LaunchRow>(&query)
            .bind(id)
            .bind(creator_id)
            .fetch_optional(&*self.db)
            .await
            .context("failed to fetch owned launch")?;
        row.map(Launch::try_from).transpose()
    }

    async fn list_by_creator(&self, creator_id: &str) -> Result<Vec<Launch>> {
        let query = format!(
            "SELECT {} FROM launch WHERE creator_id = $1 ORDER BY created_at DESC",
            SELECT_COLUMNS
        );
        let rows = sqlx::query_as::<_, LaunchRow>(&query)
            .bind(creator_id)
            .fetch_all(&*self.db)
            .await
            .context("failed to list launches by creator")?;
        into_launches(rows)
    }

    async fn list(&self, status: Option<LaunchStatus>, limit: u32) -> Result<Vec<Launch>> {
        let query = format!(
            "SELECT {} FROM launch WHERE ($1::TEXT IS NULL OR status = $1) ORDER BY created_at DESC LIMIT $2",
            SELECT_COLUMNS
        );
        let rows = sqlx::query_as::<_, LaunchRow>(&query)
            .bind(status.map(|s| s.as_str()))
            .bind(limit as i64)
            .fetch_all(&*self.db)
            .await
            .context("failed to list launches")?;
        into_launches(rows)
    }

    async fn update_pending(&self, id: &str, creator_id: &str, patch: &LaunchPatch) -> Result<bool> {
        let update_sql = r#"
        UPDATE launch SET
            name = COALESCE($3, name),
            symbol = COALESCE($4, symbol),
            description = COALESCE($5, description),
            image = COALESCE($6, image),
            charity_wallet = COALESCE($7, charity_wallet),
            charity_name = COALESCE($8, charity_name)
        WHERE id = $1 AND creator_id = $2 AND status = 'pending'
        "#;

        let result = sqlx::query(update_sql)
            .bind(id)
            .bind(creator_id)
            .bind(&patch.name)
            .bind(&patch.symbol)
            .bind(&patch.description)
            .bind(&patch.image)
            .bind(&patch.charity_wallet)
            .bind(&patch.charity_name)
            .execute(&*self.db)
            .await
            .context("failed to update launch")?;
        Ok(result.rows_affected() > 0)
    }

    async fn stage_addresses(
        &self,
        id: &str,
        creator_id: &str,
        pool_address: &str,
        token_mint: &str,
    ) -> Result<bool> {
        let update_sql = r#"
        UPDATE launch SET pool_address = $3, token_mint = $4
        WHERE id = $1 AND creator_id = $2 AND status = 'pending'
        "#;

        let result = sqlx::query(update_sql)
            .bind(id)
            .bind(creator_id)
            .bind(pool_address)
            .bind(token_mint)
            .execute(&*self.db)
            .await
            .context("failed to stage deploy addresses")?;
        Ok(result.rows_affected() > 0)
    }

    async fn activate(
        &self,
        id: &str,
        creator_id: &str,
        pool_address: &str,
        token_mint: &str,
    ) -> Result<bool> {
        let update_sql = r#"
        UPDATE launch SET status = 'active', pool_address = $3, token_mint = $4
        WHERE id = $1 AND creator_id = $2 AND status = 'pending'
        "#;

        let result = sqlx::query(update_sql)
            .bind(id)
            .bind(creator_id)
            .bind(pool_address)
            .bind(token_mint)
            .execute(&*self.db)
            .await
            .context("failed to activate launch")?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_pending(&self, id: &str, creator_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"DELETE FROM launch WHERE id = $1 AND creator_id = $2 AND status = 'pending'"#,
        )
        .bind(id)
        .bind(creator_id)
        .execute(&*self.db)
        .await
        .context("failed to delete launch")?;
        Ok(result.rows_affected() > 0)
    }
}
