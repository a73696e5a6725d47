//! Request handlers, thin by design: decode input, call one service, shape
//! the response. Every policy decision lives in the application layer.

mod auth;
mod notifications;
mod posts;
mod users;

pub use auth::{login, logout, me, signup};
pub use notifications::{clear_notifications, delete_notification, list_notifications};
pub use posts::{
    author_posts, comment_on_post, create_post, delete_post, following_posts, like_post,
    liked_posts, list_posts, post_detail,
};
pub use users::{
    followers, following, profile, suggested_users, toggle_follow, update_password, update_profile,
};

use axum::http::StatusCode;

use crate::application::notifications::NotificationError;
use crate::application::posts::PostError;
use crate::application::profiles::ProfileError;
use crate::application::repos::RepoError;
use crate::application::sessions::AuthError;

use super::error::{ApiError, codes};

pub(super) fn repo_to_api(err: RepoError) -> ApiError {
    match err {
        RepoError::NotFound => ApiError::not_found("resource not found"),
        RepoError::Duplicate { constraint } => ApiError::new(
            StatusCode::CONFLICT,
            codes::DUPLICATE,
            "duplicate resource",
            Some(constraint),
        ),
        RepoError::InvalidInput { message } => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "invalid input",
            Some(message),
        ),
        RepoError::Integrity { message } => ApiError::new(
            StatusCode::CONFLICT,
            codes::INTEGRITY,
            "integrity violation",
            Some(message),
        ),
        RepoError::Timeout => ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::DB_TIMEOUT,
            "storage timed out",
            None,
        ),
        RepoError::Persistence(message) => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::REPO,
            "storage failure",
            Some(message),
        ),
    }
}

pub(super) fn auth_to_api(err: AuthError) -> ApiError {
    match err {
        AuthError::Repo(repo) => repo_to_api(repo),
        AuthError::Validation(message) => ApiError::bad_request("invalid request", Some(message)),
        AuthError::EmailTaken => ApiError::duplicate("email already registered"),
        AuthError::InvalidCredentials => ApiError::bad_request("invalid email or password", None),
        AuthError::Missing | AuthError::Invalid | AuthError::Expired => ApiError::unauthorized(),
    }
}

pub(super) fn post_to_api(err: PostError) -> ApiError {
    match err {
        PostError::Repo(repo) => repo_to_api(repo),
        PostError::NotFound => ApiError::not_found("post not found"),
        PostError::AuthorNotFound => ApiError::not_found("user not found"),
        PostError::NotAuthor => ApiError::forbidden("only the author may do that"),
        PostError::Validation(message) => ApiError::bad_request("invalid request", Some(message)),
    }
}

pub(super) fn profile_to_api(err: ProfileError) -> ApiError {
    match err {
        ProfileError::Repo(repo) => repo_to_api(repo),
        ProfileError::NotFound => ApiError::not_found("user not found"),
        ProfileError::SelfFollow => {
            ApiError::bad_request("users cannot follow themselves", None)
        }
        ProfileError::Validation(message) => {
            ApiError::bad_request("invalid request", Some(message))
        }
        ProfileError::WrongPassword => ApiError::bad_request("current password is incorrect", None),
    }
}

pub(super) fn notification_to_api(err: NotificationError) -> ApiError {
    match err {
        NotificationError::Repo(repo) => repo_to_api(repo),
        NotificationError::NotFound => ApiError::not_found("notification not found"),
        NotificationError::NotOwner => {
            ApiError::forbidden("notification belongs to another user")
        }
    }
}
