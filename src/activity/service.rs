use std::sync::Arc;

use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use super::repo::{ActivityAction, ActivityLog, ActivityStore, NewActivityLog};

/// Owner-scoped audit trail. Recording is best-effort relative to the
/// operation that triggered it; the caller decides what to do with a failure.
pub struct ActivityLogService {
    store: Arc<dyn ActivityStore>,
}

impl ActivityLogService {
    pub fn new(store: Arc<dyn ActivityStore>) -> Self {
        Self { store }
    }

    /// Append one entry stamped with the current time.
    pub async fn record(
        &self,
        owner_id: Uuid,
        action: ActivityAction,
        details: serde_json::Value,
    ) -> anyhow::Result<ActivityLog> {
        let entry = self
            .store
            .append(NewActivityLog {
                owner_id,
                action: action.as_str().to_string(),
                details,
                created_at: OffsetDateTime::now_utc(),
            })
            .await?;
        debug!(owner_id = %owner_id, action = action.as_str(), "activity recorded");
        Ok(entry)
    }

    /// Newest-first page of one owner's entries.
    pub async fn list(
        &self,
        owner_id: Uuid,
        page: i64,
        size: i64,
    ) -> anyhow::Result<Vec<ActivityLog>> {
        let size = size.clamp(1, 100);
        let page = page.max(0);
        self.store.list_by_owner(owner_id, size, page * size).await
    }
}
