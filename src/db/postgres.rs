use sqlx::{postgres::PgPoolOptions, types::Json, PgPool};

use super::store::ProfileStore;
use crate::{error::AppResult, models::UserProfile};

/// Creates a PostgreSQL connection pool and applies pending migrations
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Profiles stored as one JSONB document per user
#[derive(Debug, Clone)]
pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ProfileStore for PgProfileStore {
    #[tracing::instrument(skip(self))]
    async fn fetch_profile(&self, user_id: &str) -> AppResult<Option<UserProfile>> {
        let row: Option<(Json<UserProfile>,)> =
            sqlx::query_as("SELECT profile FROM user_profiles WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(Json(profile),)| profile))
    }

    #[tracing::instrument(skip(self, profile), fields(user_id = %profile.user_id))]
    async fn create_profile(&self, profile: &UserProfile) -> AppResult<bool> {
        let result = sqlx::query(
            "INSERT INTO user_profiles (user_id, profile, updated_at) \
             VALUES ($1, $2, NOW()) \
             ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(&profile.user_id)
        .bind(Json(profile))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(skip(self, profile), fields(user_id = %profile.user_id))]
    async fn persist_profile(&self, profile: &UserProfile) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO user_profiles (user_id, profile, updated_at) \
             VALUES ($1, $2, NOW()) \
             ON CONFLICT (user_id) DO UPDATE SET profile = EXCLUDED.profile, updated_at = NOW()",
        )
        .bind(&profile.user_id)
        .bind(Json(profile))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
