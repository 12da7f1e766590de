use std::sync::Arc;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::activity::{repo::PgActivityStore, service::ActivityLogService};
use crate::config::AppConfig;
use crate::predictions::{
    oracle::{MlHttpClient, PredictionOracle},
    repo::PgPredictionStore,
    service::PredictionService,
};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub predictions: Arc<PredictionService>,
    pub activity: Arc<ActivityLogService>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        let oracle = Arc::new(MlHttpClient::new(&config.ml)?) as Arc<dyn PredictionOracle>;
        Ok(Self::from_parts(db, config, oracle))
    }

    pub fn from_parts(
        db: PgPool,
        config: Arc<AppConfig>,
        oracle: Arc<dyn PredictionOracle>,
    ) -> Self {
        let activity = Arc::new(ActivityLogService::new(Arc::new(PgActivityStore::new(
            db.clone(),
        ))));
        let predictions = Arc::new(PredictionService::new(
            Arc::new(PgPredictionStore::new(db.clone())),
            oracle,
            activity.clone(),
        ));
        Self {
            db,
            config,
            predictions,
            activity,
        }
    }
}
