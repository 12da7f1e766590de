use std::sync::Arc;

use serde_json::json;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::dto::{PredictRequest, PredictionCreated};
use super::oracle::{OracleError, PredictionOracle};
use super::repo::{NewPrediction, Prediction, PredictionStore};
use crate::activity::repo::ActivityAction;
use crate::activity::service::ActivityLogService;

#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("{0}")]
    Oracle(#[from] OracleError),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Orchestrates the prediction lifecycle: the only component that talks to
/// the oracle, the record store and the activity log.
pub struct PredictionService {
    store: Arc<dyn PredictionStore>,
    oracle: Arc<dyn PredictionOracle>,
    activity: Arc<ActivityLogService>,
}

impl PredictionService {
    pub fn new(
        store: Arc<dyn PredictionStore>,
        oracle: Arc<dyn PredictionOracle>,
        activity: Arc<ActivityLogService>,
    ) -> Self {
        Self {
            store,
            oracle,
            activity,
        }
    }

    pub async fn create(
        &self,
        owner_id: Uuid,
        req: &PredictRequest,
    ) -> Result<PredictionCreated, PredictionError> {
        let features = req.to_features();

        // An oracle failure must leave no trace: no record, no activity entry.
        let ml = self.oracle.predict(&features).await?;

        let now = OffsetDateTime::now_utc();
        let saved = self
            .store
            .save(NewPrediction {
                owner_id,
                features,
                predicted_price: ml.predicted_price,
                model_version: ml.model_version,
                explanations: ml
                    .explanations
                    .and_then(|m| serde_json::to_value(m).ok()),
                created_at: now,
                updated_at: now,
                version: 1,
            })
            .await?;

        self.record(
            owner_id,
            ActivityAction::PredictionCreated,
            json!({ "predictionId": saved.id }),
        )
        .await;

        info!(owner_id = %owner_id, prediction_id = %saved.id, "prediction created");
        Ok(PredictionCreated::from(saved))
    }

    pub async fn list(
        &self,
        owner_id: Uuid,
        page: i64,
        size: i64,
    ) -> Result<Vec<Prediction>, PredictionError> {
        let (limit, offset) = page_window(page, size);
        let rows = self.store.find_by_owner(owner_id, limit, offset).await?;
        self.record(
            owner_id,
            ActivityAction::PredictionListed,
            json!({ "page": page, "size": size }),
        )
        .await;
        Ok(rows)
    }

    /// Ownership is a filter: a foreign record is indistinguishable from an
    /// absent one, and a miss records nothing.
    pub async fn get(
        &self,
        owner_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Prediction>, PredictionError> {
        let found = self
            .store
            .find_by_id(id)
            .await?
            .filter(|p| p.owner_id == owner_id);
        if let Some(ref p) = found {
            self.record(
                owner_id,
                ActivityAction::PredictionViewed,
                json!({ "predictionId": p.id }),
            )
            .await;
        }
        Ok(found)
    }

    /// Deleting an absent or foreign record is a silent no-op.
    pub async fn delete(&self, owner_id: Uuid, id: Uuid) -> Result<(), PredictionError> {
        let found = self
            .store
            .find_by_id(id)
            .await?
            .filter(|p| p.owner_id == owner_id);
        if let Some(p) = found {
            self.store.delete(p.id).await?;
            self.record(
                owner_id,
                ActivityAction::PredictionDeleted,
                json!({ "predictionId": p.id }),
            )
            .await;
            info!(owner_id = %owner_id, prediction_id = %p.id, "prediction deleted");
        }
        Ok(())
    }

    // Side channel only: a recording failure never fails the operation.
    async fn record(&self, owner_id: Uuid, action: ActivityAction, details: serde_json::Value) {
        if let Err(e) = self.activity.record(owner_id, action, details).await {
            warn!(
                error = %e,
                owner_id = %owner_id,
                action = action.as_str(),
                "activity record failed"
            );
        }
    }
}

fn page_window(page: i64, size: i64) -> (i64, i64) {
    let size = size.clamp(1, 100);
    let page = page.max(0);
    (size, page * size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::repo::{ActivityLog, ActivityStore, NewActivityLog};
    use crate::predictions::oracle::PredictResponse;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct MemPredictionStore {
        rows: Mutex<Vec<Prediction>>,
    }

    impl MemPredictionStore {
        fn count(&self) -> usize {
            self.rows.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl PredictionStore for MemPredictionStore {
        async fn save(&self, rec: NewPrediction) -> anyhow::Result<Prediction> {
            let row = Prediction {
                id: Uuid::new_v4(),
                owner_id: rec.owner_id,
                features: rec.features,
                predicted_price: rec.predicted_price,
                model_version: rec.model_version,
                explanations: rec.explanations,
                created_at: rec.created_at,
                updated_at: rec.updated_at,
                version: rec.version,
            };
            self.rows.lock().unwrap().push(row.clone());
            Ok(row)
        }

        async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Prediction>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|p| p.id == id)
                .cloned())
        }

        async fn find_by_owner(
            &self,
            owner_id: Uuid,
            limit: i64,
            offset: i64,
        ) -> anyhow::Result<Vec<Prediction>> {
            let mut rows: Vec<_> = self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|p| p.owner_id == owner_id)
                .cloned()
                .collect();
            rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(rows
                .into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .collect())
        }

        async fn delete(&self, id: Uuid) -> anyhow::Result<()> {
            self.rows.lock().unwrap().retain(|p| p.id != id);
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemActivityStore {
        entries: Mutex<Vec<ActivityLog>>,
    }

    impl MemActivityStore {
        fn actions_for(&self, owner_id: Uuid) -> Vec<String> {
            self.entries
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.owner_id == owner_id)
                .map(|e| e.action.clone())
                .collect()
        }

        fn entries_for(&self, owner_id: Uuid, action: &str) -> Vec<ActivityLog> {
            self.entries
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.owner_id == owner_id && e.action == action)
                .cloned()
                .collect()
        }
    }

    #[async_trait]
    impl ActivityStore for MemActivityStore {
        async fn append(&self, entry: NewActivityLog) -> anyhow::Result<ActivityLog> {
            let row = ActivityLog {
                id: Uuid::new_v4(),
                owner_id: entry.owner_id,
                action: entry.action,
                details: entry.details,
                created_at: entry.created_at,
            };
            self.entries.lock().unwrap().push(row.clone());
            Ok(row)
        }

        async fn list_by_owner(
            &self,
            owner_id: Uuid,
            limit: i64,
            offset: i64,
        ) -> anyhow::Result<Vec<ActivityLog>> {
            let mut rows: Vec<_> = self
                .entries
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.owner_id == owner_id)
                .cloned()
                .collect();
            rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(rows
                .into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .collect())
        }
    }

    enum StubOracle {
        Ok(PredictResponse),
        Err(String),
    }

    #[async_trait]
    impl PredictionOracle for StubOracle {
        async fn predict(
            &self,
            _features: &serde_json::Value,
        ) -> Result<PredictResponse, OracleError> {
            match self {
                StubOracle::Ok(r) => Ok(r.clone()),
                StubOracle::Err(msg) => Err(OracleError(msg.clone())),
            }
        }
    }

    struct Harness {
        service: PredictionService,
        store: Arc<MemPredictionStore>,
        activity: Arc<MemActivityStore>,
    }

    fn harness(oracle: StubOracle) -> Harness {
        let store = Arc::new(MemPredictionStore::default());
        let activity = Arc::new(MemActivityStore::default());
        let service = PredictionService::new(
            store.clone(),
            Arc::new(oracle),
            Arc::new(ActivityLogService::new(activity.clone())),
        );
        Harness {
            service,
            store,
            activity,
        }
    }

    fn ok_oracle() -> StubOracle {
        StubOracle::Ok(PredictResponse {
            predicted_price: 123456.0,
            model_version: "it-test".into(),
            explanations: None,
        })
    }

    fn request() -> PredictRequest {
        PredictRequest {
            bedrooms: 3,
            bathrooms: 2,
            area_sqm: 120.5,
            age_years: 8,
            location_index: 4,
        }
    }

    #[tokio::test]
    async fn create_persists_record_and_records_activity() {
        let h = harness(ok_oracle());
        let owner = Uuid::new_v4();

        let created = h.service.create(owner, &request()).await.unwrap();
        assert_eq!(created.predicted_price, 123456.0);
        assert_eq!(created.model_version, "it-test");
        assert_eq!(created.version, 1);
        assert_eq!(created.created_at, created.updated_at);
        assert_eq!(created.features["bedrooms"], 3);

        assert_eq!(h.store.count(), 1);
        let entries = h.activity.entries_for(owner, "PREDICTION_CREATED");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].details["predictionId"], json!(created.id));
    }

    #[tokio::test]
    async fn create_oracle_failure_writes_nothing() {
        let h = harness(StubOracle::Err("request timeout: deadline exceeded".into()));
        let owner = Uuid::new_v4();

        let err = h.service.create(owner, &request()).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("ML service error"), "got: {msg}");
        assert!(msg.contains("timeout"), "got: {msg}");

        assert_eq!(h.store.count(), 0);
        assert!(h.activity.actions_for(owner).is_empty());
    }

    #[tokio::test]
    async fn list_returns_newest_first() {
        let h = harness(ok_oracle());
        let owner = Uuid::new_v4();

        let mut ids = Vec::new();
        for _ in 0..3 {
            ids.push(h.service.create(owner, &request()).await.unwrap().id);
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        let rows = h.service.list(owner, 0, 10).await.unwrap();
        let listed: Vec<_> = rows.iter().map(|p| p.id).collect();
        ids.reverse();
        assert_eq!(listed, ids);
        assert!(rows.windows(2).all(|w| w[0].created_at > w[1].created_at));
        assert_eq!(h.activity.entries_for(owner, "PREDICTION_LISTED").len(), 1);
    }

    #[tokio::test]
    async fn list_on_empty_owner_still_records_activity() {
        let h = harness(ok_oracle());
        let owner = Uuid::new_v4();

        let rows = h.service.list(owner, 0, 20).await.unwrap();
        assert!(rows.is_empty());
        assert_eq!(h.activity.actions_for(owner), vec!["PREDICTION_LISTED"]);
    }

    #[tokio::test]
    async fn pagination_partitions_without_gaps_or_duplicates() {
        let h = harness(ok_oracle());
        let owner = Uuid::new_v4();
        for _ in 0..5 {
            h.service.create(owner, &request()).await.unwrap();
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        let full = h.service.list(owner, 0, 10).await.unwrap();
        let first = h.service.list(owner, 0, 2).await.unwrap();
        let second = h.service.list(owner, 1, 2).await.unwrap();
        let third = h.service.list(owner, 2, 2).await.unwrap();
        assert_eq!((first.len(), second.len(), third.len()), (2, 2, 1));

        let paged: Vec<_> = first
            .iter()
            .chain(&second)
            .chain(&third)
            .map(|p| p.id)
            .collect();
        let full_ids: Vec<_> = full.iter().map(|p| p.id).collect();
        assert_eq!(paged, full_ids);
        assert_eq!(paged.iter().collect::<HashSet<_>>().len(), 5);
    }

    #[tokio::test]
    async fn foreign_owner_cannot_get_or_delete() {
        let h = harness(ok_oracle());
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let created = h.service.create(alice, &request()).await.unwrap();

        assert!(h.service.get(bob, created.id).await.unwrap().is_none());
        h.service.delete(bob, created.id).await.unwrap();
        assert_eq!(h.store.count(), 1);

        // The owner still sees the unchanged record afterwards.
        let mine = h.service.get(alice, created.id).await.unwrap().unwrap();
        assert_eq!(mine.predicted_price, 123456.0);

        // Nothing was recorded for the intruder.
        assert!(h.activity.actions_for(bob).is_empty());
    }

    #[tokio::test]
    async fn get_records_view_only_on_hit() {
        let h = harness(ok_oracle());
        let owner = Uuid::new_v4();
        let created = h.service.create(owner, &request()).await.unwrap();

        let got = h.service.get(owner, created.id).await.unwrap();
        assert!(got.is_some());
        let views = h.activity.entries_for(owner, "PREDICTION_VIEWED");
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].details["predictionId"], json!(created.id));

        assert!(h.service.get(owner, Uuid::new_v4()).await.unwrap().is_none());
        assert_eq!(h.activity.entries_for(owner, "PREDICTION_VIEWED").len(), 1);
    }

    #[tokio::test]
    async fn delete_owned_removes_record_and_logs() {
        let h = harness(ok_oracle());
        let owner = Uuid::new_v4();
        let created = h.service.create(owner, &request()).await.unwrap();

        h.service.delete(owner, created.id).await.unwrap();
        assert_eq!(h.store.count(), 0);
        assert!(h.service.get(owner, created.id).await.unwrap().is_none());

        let deletes = h.activity.entries_for(owner, "PREDICTION_DELETED");
        assert_eq!(deletes.len(), 1);
        assert_eq!(deletes[0].details["predictionId"], json!(created.id));
    }

    #[tokio::test]
    async fn delete_of_absent_record_is_silent_noop() {
        let h = harness(ok_oracle());
        let owner = Uuid::new_v4();
        h.service.create(owner, &request()).await.unwrap();

        h.service.delete(owner, Uuid::new_v4()).await.unwrap();
        assert_eq!(h.store.count(), 1);
        assert!(h.activity.entries_for(owner, "PREDICTION_DELETED").is_empty());
    }

    #[tokio::test]
    async fn create_carries_explanations_through() {
        let h = harness(StubOracle::Ok(PredictResponse {
            predicted_price: 250000.0,
            model_version: "v1".into(),
            explanations: Some([("area_sqm".to_string(), 0.6)].into_iter().collect()),
        }));
        let owner = Uuid::new_v4();

        let created = h.service.create(owner, &request()).await.unwrap();
        let expl = created.explanations.expect("explanations persisted");
        assert_eq!(expl["area_sqm"], 0.6);
    }

    #[test]
    fn page_window_clamps_bad_input() {
        assert_eq!(page_window(0, 20), (20, 0));
        assert_eq!(page_window(2, 10), (10, 20));
        assert_eq!(page_window(-1, 0), (1, 0));
        assert_eq!(page_window(1, 1000), (100, 100));
    }
}
