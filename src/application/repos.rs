//! Repository traits describing persistence adapters.
//!
//! The rest of the application only sees these traits; the Postgres
//! implementation lives in `infra::db`. Projection types returned to API
//! clients are defined here alongside the traits that produce them.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::pagination::{Page, PageRequest};
use crate::domain::entities::{
    CommentRecord, PostRecord, SessionRecord, UserRecord,
};
use crate::domain::types::NotificationKind;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

// ============================================================================
// Projections
// ============================================================================

/// The public slice of a user embedded in feed items and follower lists.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserCard {
    pub id: Uuid,
    pub user_name: String,
    pub profile_pic: Option<String>,
}

/// A fully-assembled feed item: post plus author card, likers and comments.
/// This is what the feed cache stores, never the raw rows.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: Uuid,
    pub author: UserCard,
    pub text: Option<String>,
    pub image: Option<String>,
    pub likes: Vec<Uuid>,
    pub comments: Vec<CommentView>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: Uuid,
    pub author: UserCard,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A profile page: the user sans secrets plus relationship counts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: UserRecord,
    pub followers_count: u64,
    pub following_count: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    pub id: Uuid,
    pub from: UserCard,
    pub kind: NotificationKind,
    pub text: Option<String>,
    pub post_id: Option<Uuid>,
    pub read: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

// ============================================================================
// Write parameters
// ============================================================================

#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub user_name: String,
    pub email: String,
    pub password_hash: Vec<u8>,
    pub password_salt: String,
}

#[derive(Debug, Clone)]
pub struct UpdateProfileParams {
    pub id: Uuid,
    pub user_name: String,
    pub email: String,
    pub bio: Option<String>,
    pub link: Option<String>,
    pub profile_pic: Option<String>,
    pub cover_pic: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    pub author_id: Uuid,
    pub text: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateCommentParams {
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct CreateSessionParams {
    pub user_id: Uuid,
    pub prefix: String,
    pub hashed_secret: Vec<u8>,
    pub expires_at: OffsetDateTime,
}

// ============================================================================
// Traits
// ============================================================================

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError>;

    /// Profile projection: user plus follower/following counts.
    async fn load_profile(&self, id: Uuid) -> Result<Option<UserProfile>, RepoError>;

    /// A random sample of users the viewer does not follow (and is not).
    async fn suggested_users(&self, viewer: Uuid, limit: u32) -> Result<Vec<UserCard>, RepoError>;

    async fn list_followers(&self, id: Uuid) -> Result<Vec<UserCard>, RepoError>;

    async fn list_following(&self, id: Uuid) -> Result<Vec<UserCard>, RepoError>;

    async fn is_following(&self, follower: Uuid, followee: Uuid) -> Result<bool, RepoError>;
}

#[async_trait]
pub trait UsersWriteRepo: Send + Sync {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError>;

    async fn update_profile(&self, params: UpdateProfileParams) -> Result<UserRecord, RepoError>;

    async fn update_password(
        &self,
        id: Uuid,
        password_hash: Vec<u8>,
        password_salt: String,
    ) -> Result<(), RepoError>;

    /// Insert the follow edge and the follow notification in one transaction.
    async fn follow(&self, follower: Uuid, followee: Uuid) -> Result<(), RepoError>;

    async fn unfollow(&self, follower: Uuid, followee: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    async fn list_posts(&self, page: PageRequest) -> Result<Page<PostView>, RepoError>;

    async fn list_following_posts(
        &self,
        viewer: Uuid,
        page: PageRequest,
    ) -> Result<Page<PostView>, RepoError>;

    async fn list_posts_by_author(
        &self,
        author: Uuid,
        page: PageRequest,
    ) -> Result<Page<PostView>, RepoError>;

    async fn list_liked_posts(
        &self,
        viewer: Uuid,
        page: PageRequest,
    ) -> Result<Page<PostView>, RepoError>;

    async fn find_post(&self, id: Uuid) -> Result<Option<PostView>, RepoError>;

    async fn find_post_record(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError>;

    async fn is_liked_by(&self, post_id: Uuid, user_id: Uuid) -> Result<bool, RepoError>;
}

#[async_trait]
pub trait PostsWriteRepo: Send + Sync {
    /// Insert the post and fan one `post` notification out to every follower
    /// of the author, all inside a single transaction.
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError>;

    /// Delete the post; comments and likes cascade.
    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError>;

    /// Insert the comment plus a `comment` notification to the post author
    /// (skipped for self-comments) in one transaction.
    async fn add_comment(&self, params: CreateCommentParams) -> Result<CommentRecord, RepoError>;

    /// Insert the like plus a `like` notification to the post author
    /// (skipped for self-likes) in one transaction.
    async fn like_post(&self, post_id: Uuid, user_id: Uuid) -> Result<(), RepoError>;

    async fn unlike_post(&self, post_id: Uuid, user_id: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait NotificationsRepo: Send + Sync {
    async fn list_for_recipient(
        &self,
        recipient: Uuid,
    ) -> Result<Vec<NotificationView>, RepoError>;

    async fn find_recipient(&self, id: Uuid) -> Result<Option<Uuid>, RepoError>;

    async fn delete_one(&self, id: Uuid) -> Result<(), RepoError>;

    async fn delete_all_for_recipient(&self, recipient: Uuid) -> Result<u64, RepoError>;
}

#[async_trait]
pub trait SessionsRepo: Send + Sync {
    async fn create_session(&self, params: CreateSessionParams)
    -> Result<SessionRecord, RepoError>;

    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<SessionRecord>, RepoError>;

    async fn delete_by_prefix(&self, prefix: &str) -> Result<(), RepoError>;

    async fn delete_expired(&self) -> Result<u64, RepoError>;
}
