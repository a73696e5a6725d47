//! Feed reads and post write paths.

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::pagination::PageRequest;
use crate::application::posts::CreatePostCommand;

use super::{post_to_api, repo_to_api};
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::{CommentRequest, CreatePostRequest, FeedQuery};
use crate::infra::http::api::state::{ApiState, CurrentUser};

pub async fn list_posts(
    State(state): State<ApiState>,
    Query(query): Query<FeedQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = PageRequest::new(query.page, query.limit);
    let payload = state.feed.all_posts(page).await.map_err(repo_to_api)?;
    Ok(Json(payload))
}

pub async fn following_posts(
    State(state): State<ApiState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<FeedQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = PageRequest::new(query.page, query.limit);
    let payload = state
        .feed
        .following_posts(user.0.id, page)
        .await
        .map_err(repo_to_api)?;
    Ok(Json(payload))
}

pub async fn author_posts(
    State(state): State<ApiState>,
    Path(author): Path<Uuid>,
    Query(query): Query<FeedQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = PageRequest::new(query.page, query.limit);
    let payload = state
        .feed
        .author_posts(author, page)
        .await
        .map_err(repo_to_api)?
        .ok_or_else(|| ApiError::not_found("user not found"))?;
    Ok(Json(payload))
}

pub async fn liked_posts(
    State(state): State<ApiState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<FeedQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = PageRequest::new(query.page, query.limit);
    let payload = state
        .feed
        .liked_posts(user.0.id, page)
        .await
        .map_err(repo_to_api)?;
    Ok(Json(payload))
}

pub async fn post_detail(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = state
        .feed
        .post_detail(id)
        .await
        .map_err(repo_to_api)?
        .ok_or_else(|| ApiError::not_found("post not found"))?;
    Ok(Json(payload))
}

pub async fn create_post(
    State(state): State<ApiState>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let post = state
        .posts
        .create_post(
            user.0.id,
            CreatePostCommand {
                text: payload.text,
                image: payload.image,
            },
        )
        .await
        .map_err(post_to_api)?;

    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn delete_post(
    State(state): State<ApiState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .posts
        .delete_post(user.0.id, id)
        .await
        .map_err(post_to_api)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn comment_on_post(
    State(state): State<ApiState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let post = state
        .posts
        .comment(user.0.id, id, payload.text)
        .await
        .map_err(post_to_api)?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn like_post(
    State(state): State<ApiState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .posts
        .toggle_like(user.0.id, id)
        .await
        .map_err(post_to_api)?;
    Ok(Json(outcome.post))
}
