use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Stored prediction record, owned by exactly one user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub features: serde_json::Value,
    pub predicted_price: f64,
    pub model_version: String,
    pub explanations: Option<serde_json::Value>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub version: i32,
}

/// Record as handed to the store; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewPrediction {
    pub owner_id: Uuid,
    pub features: serde_json::Value,
    pub predicted_price: f64,
    pub model_version: String,
    pub explanations: Option<serde_json::Value>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub version: i32,
}

#[async_trait]
pub trait PredictionStore: Send + Sync {
    async fn save(&self, rec: NewPrediction) -> anyhow::Result<Prediction>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Prediction>>;
    /// One owner's records, created_at descending.
    async fn find_by_owner(
        &self,
        owner_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Prediction>>;
    async fn delete(&self, id: Uuid) -> anyhow::Result<()>;
}

pub struct PgPredictionStore {
    db: PgPool,
}

impl PgPredictionStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PredictionStore for PgPredictionStore {
    async fn save(&self, rec: NewPrediction) -> anyhow::Result<Prediction> {
        let row = sqlx::query_as::<_, Prediction>(
            r#"
            INSERT INTO predictions
                (owner_id, features, predicted_price, model_version, explanations,
                 created_at, updated_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, owner_id, features, predicted_price, model_version,
                      explanations, created_at, updated_at, version
            "#,
        )
        .bind(rec.owner_id)
        .bind(rec.features)
        .bind(rec.predicted_price)
        .bind(rec.model_version)
        .bind(rec.explanations)
        .bind(rec.created_at)
        .bind(rec.updated_at)
        .bind(rec.version)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Prediction>> {
        let row = sqlx::query_as::<_, Prediction>(
            r#"
            SELECT id, owner_id, features, predicted_price, model_version,
                   explanations, created_at, updated_at, version
            FROM predictions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn find_by_owner(
        &self,
        owner_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Prediction>> {
        let rows = sqlx::query_as::<_, Prediction>(
            r#"
            SELECT id, owner_id, features, predicted_price, model_version,
                   explanations, created_at, updated_at, version
            FROM predictions
            WHERE owner_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(owner_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM predictions WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
