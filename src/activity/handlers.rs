use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use tracing::{error, instrument};

use super::repo::ActivityLog;
use crate::{
    auth::jwt::AuthUser, error::ApiError, predictions::dto::PageParams, state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/activity", get(list_activity))
}

#[instrument(skip(state))]
pub async fn list_activity(
    State(state): State<AppState>,
    AuthUser(owner_id): AuthUser,
    Query(p): Query<PageParams>,
) -> Result<Json<Vec<ActivityLog>>, ApiError> {
    let rows = state
        .activity
        .list(owner_id, p.page, p.size)
        .await
        .map_err(|e| {
            error!(error = %e, owner_id = %owner_id, "activity list failed");
            ApiError::internal(e.to_string())
        })?;
    Ok(Json(rows))
}
