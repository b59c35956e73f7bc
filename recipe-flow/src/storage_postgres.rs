use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgPoolOptions, types::Json};
use tracing::info;

use crate::{error::Result, models::WizardFormData, storage::SnapshotStorage};

/// PostgreSQL implementation of SnapshotStorage.
///
/// Snapshots live in a single JSONB column keyed by the snapshot key.
pub struct PostgresSnapshotStorage {
    pool: PgPool,
}

impl PostgresSnapshotStorage {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        let storage = Self { pool };
        storage.migrate().await?;
        info!("Connected to PostgreSQL snapshot storage");
        Ok(storage)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS wizard_snapshots (
                snapshot_key TEXT PRIMARY KEY,
                form_data JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SnapshotStorage for PostgresSnapshotStorage {
    async fn save(&self, key: &str, snapshot: &WizardFormData) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO wizard_snapshots (snapshot_key, form_data, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (snapshot_key)
            DO UPDATE SET form_data = EXCLUDED.form_data, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(key)
        .bind(Json(snapshot))
        .bind(chrono::Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<WizardFormData>> {
        let row = sqlx::query("SELECT form_data FROM wizard_snapshots WHERE snapshot_key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let Json(form): Json<WizardFormData> = row.try_get("form_data")?;
                Ok(Some(form))
            }
            None => Ok(None),
        }
    }

    async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM wizard_snapshots WHERE snapshot_key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
