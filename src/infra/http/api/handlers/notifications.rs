//! Notification listing and deletion.

use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::response::IntoResponse;
use uuid::Uuid;

use super::notification_to_api;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::state::{ApiState, CurrentUser};

pub async fn list_notifications(
    State(state): State<ApiState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let notifications = state
        .notifications
        .list(user.0.id)
        .await
        .map_err(notification_to_api)?;
    Ok(Json(notifications))
}

pub async fn clear_notifications(
    State(state): State<ApiState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .notifications
        .clear(user.0.id)
        .await
        .map_err(notification_to_api)?;
    Ok(Json(Vec::<serde_json::Value>::new()))
}

pub async fn delete_notification(
    State(state): State<ApiState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let remaining = state
        .notifications
        .delete_one(user.0.id, id)
        .await
        .map_err(notification_to_api)?;
    Ok(Json(remaining))
}
