use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Lifecycle actions written to the activity log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityAction {
    PredictionCreated,
    PredictionListed,
    PredictionViewed,
    PredictionDeleted,
}

impl ActivityAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityAction::PredictionCreated => "PREDICTION_CREATED",
            ActivityAction::PredictionListed => "PREDICTION_LISTED",
            ActivityAction::PredictionViewed => "PREDICTION_VIEWED",
            ActivityAction::PredictionDeleted => "PREDICTION_DELETED",
        }
    }
}

/// Append-only entry; never mutated or deleted once written.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLog {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub action: String,
    pub details: serde_json::Value,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewActivityLog {
    pub owner_id: Uuid,
    pub action: String,
    pub details: serde_json::Value,
    pub created_at: OffsetDateTime,
}

#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn append(&self, entry: NewActivityLog) -> anyhow::Result<ActivityLog>;
    /// One owner's entries, created_at descending.
    async fn list_by_owner(
        &self,
        owner_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<ActivityLog>>;
}

pub struct PgActivityStore {
    db: PgPool,
}

impl PgActivityStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ActivityStore for PgActivityStore {
    async fn append(&self, entry: NewActivityLog) -> anyhow::Result<ActivityLog> {
        let row = sqlx::query_as::<_, ActivityLog>(
            r#"
            INSERT INTO activity_logs (owner_id, action, details, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, owner_id, action, details, created_at
            "#,
        )
        .bind(entry.owner_id)
        .bind(entry.action)
        .bind(entry.details)
        .bind(entry.created_at)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn list_by_owner(
        &self,
        owner_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<ActivityLog>> {
        let rows = sqlx::query_as::<_, ActivityLog>(
            r#"
            SELECT id, owner_id, action, details, created_at
            FROM activity_logs
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
}
