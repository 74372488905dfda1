use anyhow::Context;
use sqlx::{migrate::Migrator, postgres::PgPoolOptions, PgPool};

use crate::{datastore::DataStore, SavedSummary};

static MIGRATOR: Migrator = sqlx::migrate!();

#[derive(Debug, Clone)]
pub struct PgDataStore {
    pub pool: PgPool,
}

impl PgDataStore {
    /// Establish connection to database and create the video_summaries table
    /// if not exists
    pub async fn init(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .inspect_err(
                |e| tracing::error!(error = ?e, "Failed to establish connection to database"),
            )
            .context("Failed to connect to postgres database")?;

        MIGRATOR
            .run(&pool)
            .await
            .inspect_err(|e| tracing::error!(error = ?e, "Failed to run database migrations"))
            .context("Failed to run database migrations")?;

        Ok(PgDataStore { pool })
    }
}

impl DataStore for PgDataStore {
    async fn find_summary(&self, video_id: &str) -> anyhow::Result<Option<SavedSummary>> {
        sqlx::query_as::<_, SavedSummary>(
            "SELECT video_id, channel_id, summary_md, created_at FROM video_summaries WHERE video_id = $1",
        )
        .bind(video_id)
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|e| {
            tracing::error!(error = ?e, %video_id, "Failed to fetch saved summary");
        })
        .context("Failed to fetch saved summary")
    }

    async fn save_summary(
        &self,
        video_id: &str,
        channel_id: Option<&str>,
        summary_md: &str,
    ) -> anyhow::Result<()> {
        // upsert keeps repeated writes for the same video idempotent
        sqlx::query(
            r#"
            INSERT INTO video_summaries (video_id, channel_id, summary_md)
            VALUES ($1, $2, $3)
            ON CONFLICT (video_id) DO UPDATE
            SET channel_id = COALESCE(EXCLUDED.channel_id, video_summaries.channel_id),
                summary_md = EXCLUDED.summary_md,
                updated_at = NOW()
            "#,
        )
        .bind(video_id)
        .bind(channel_id)
        .bind(summary_md)
        .execute(&self.pool)
        .await
        .inspect_err(|err| {
            tracing::error!(
                error = ?err,
                %video_id,
                "Failed to save summary"
            )
        })
        .context("Failed to save summary")?;

        Ok(())
    }
}
