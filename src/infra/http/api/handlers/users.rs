//! Profiles, suggestions and the social graph.

use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::profiles::UpdateProfileCommand;

use super::profile_to_api;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::{UpdatePasswordRequest, UpdateProfileRequest};
use crate::infra::http::api::state::{ApiState, CurrentUser};

pub async fn profile(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = state
        .profiles
        .profile(id)
        .await
        .map_err(profile_to_api)?
        .ok_or_else(|| ApiError::not_found("user not found"))?;
    Ok(Json(payload))
}

pub async fn suggested_users(
    State(state): State<ApiState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = state
        .profiles
        .suggested_users(user.0.id)
        .await
        .map_err(profile_to_api)?;
    Ok(Json(payload))
}

pub async fn followers(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let cards = state
        .profiles
        .followers(id)
        .await
        .map_err(profile_to_api)?
        .ok_or_else(|| ApiError::not_found("user not found"))?;
    Ok(Json(cards))
}

pub async fn following(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let cards = state
        .profiles
        .following(id)
        .await
        .map_err(profile_to_api)?
        .ok_or_else(|| ApiError::not_found("user not found"))?;
    Ok(Json(cards))
}

pub async fn toggle_follow(
    State(state): State<ApiState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .profiles
        .toggle_follow(user.0.id, id)
        .await
        .map_err(profile_to_api)?;
    Ok(Json(outcome))
}

pub async fn update_profile(
    State(state): State<ApiState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = state
        .profiles
        .update_profile(
            user.0.id,
            UpdateProfileCommand {
                user_name: payload.user_name,
                email: payload.email,
                bio: payload.bio,
                link: payload.link,
                profile_pic: payload.profile_pic,
                cover_pic: payload.cover_pic,
            },
        )
        .await
        .map_err(profile_to_api)?;
    Ok(Json(updated))
}

pub async fn update_password(
    State(state): State<ApiState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<UpdatePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .profiles
        .update_password(user.0.id, &payload.old_password, &payload.password)
        .await
        .map_err(profile_to_api)?;
    Ok(Json(serde_json::json!({"message": "password updated"})))
}
