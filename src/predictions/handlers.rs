use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, instrument, warn};
use uuid::Uuid;

use super::dto::{PageParams, PredictRequest, PredictionCreated};
use super::repo::Prediction;
use super::service::PredictionError;
use crate::{auth::jwt::AuthUser, error::ApiError, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/predictions", post(create_prediction).get(list_predictions))
        .route(
            "/predictions/:id",
            get(get_prediction).delete(delete_prediction),
        )
}

#[instrument(skip(state, payload))]
pub async fn create_prediction(
    State(state): State<AppState>,
    AuthUser(owner_id): AuthUser,
    Json(payload): Json<PredictRequest>,
) -> Result<(StatusCode, Json<PredictionCreated>), ApiError> {
    if let Err(msg) = payload.validate() {
        warn!(owner_id = %owner_id, %msg, "invalid predict request");
        return Err(ApiError::validation(msg));
    }

    match state.predictions.create(owner_id, &payload).await {
        Ok(created) => Ok((StatusCode::CREATED, Json(created))),
        Err(PredictionError::Oracle(e)) => {
            error!(owner_id = %owner_id, error = %e, "oracle call failed");
            Err(ApiError::bad_request(e.to_string()))
        }
        Err(PredictionError::Store(e)) => {
            error!(owner_id = %owner_id, error = %e, "prediction persist failed");
            Err(ApiError::internal(e.to_string()))
        }
    }
}

#[instrument(skip(state))]
pub async fn list_predictions(
    State(state): State<AppState>,
    AuthUser(owner_id): AuthUser,
    Query(p): Query<PageParams>,
) -> Result<Json<Vec<Prediction>>, ApiError> {
    let rows = state
        .predictions
        .list(owner_id, p.page, p.size)
        .await
        .map_err(internal)?;
    Ok(Json(rows))
}

#[instrument(skip(state))]
pub async fn get_prediction(
    State(state): State<AppState>,
    AuthUser(owner_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Prediction>, ApiError> {
    match state
        .predictions
        .get(owner_id, id)
        .await
        .map_err(internal)?
    {
        Some(p) => Ok(Json(p)),
        None => Err(ApiError::not_found("Not found")),
    }
}

#[instrument(skip(state))]
pub async fn delete_prediction(
    State(state): State<AppState>,
    AuthUser(owner_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .predictions
        .delete(owner_id, id)
        .await
        .map_err(internal)?;
    Ok(StatusCode::NO_CONTENT)
}

fn internal(e: PredictionError) -> ApiError {
    ApiError::internal(e.to_string())
}
