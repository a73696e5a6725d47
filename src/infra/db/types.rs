//! Row types bridging SQL results and domain records.

use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{CommentView, NotificationView, UserCard, UserProfile};
use crate::domain::entities::{CommentRecord, PostRecord, SessionRecord, UserRecord};
use crate::domain::types::NotificationKind;

#[derive(Debug, FromRow)]
pub(super) struct UserRow {
    pub id: Uuid,
    pub user_name: String,
    pub email: String,
    pub password_hash: Vec<u8>,
    pub password_salt: String,
    pub bio: Option<String>,
    pub link: Option<String>,
    pub profile_pic: Option<String>,
    pub cover_pic: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        UserRecord {
            id: row.id,
            user_name: row.user_name,
            email: row.email,
            password_hash: row.password_hash,
            password_salt: row.password_salt,
            bio: row.bio,
            link: row.link,
            profile_pic: row.profile_pic,
            cover_pic: row.cover_pic,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub(super) struct ProfileRow {
    #[sqlx(flatten)]
    pub user: UserRow,
    pub followers_count: i64,
    pub following_count: i64,
}

impl From<ProfileRow> for UserProfile {
    fn from(row: ProfileRow) -> Self {
        UserProfile {
            user: row.user.into(),
            followers_count: row.followers_count.max(0) as u64,
            following_count: row.following_count.max(0) as u64,
        }
    }
}

#[derive(Debug, FromRow)]
pub(super) struct UserCardRow {
    pub id: Uuid,
    pub user_name: String,
    pub profile_pic: Option<String>,
}

impl From<UserCardRow> for UserCard {
    fn from(row: UserCardRow) -> Self {
        UserCard {
            id: row.id,
            user_name: row.user_name,
            profile_pic: row.profile_pic,
        }
    }
}

#[derive(Debug, FromRow)]
pub(super) struct PostRow {
    pub id: Uuid,
    pub author_id: Uuid,
    pub text: Option<String>,
    pub image: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        PostRecord {
            id: row.id,
            author_id: row.author_id,
            text: row.text,
            image: row.image,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// A feed item before likes/comments are attached: post columns plus the
/// author card from the join.
#[derive(Debug, FromRow)]
pub(super) struct FeedPostRow {
    pub id: Uuid,
    pub text: Option<String>,
    pub image: Option<String>,
    pub created_at: OffsetDateTime,
    pub author_id: Uuid,
    pub author_user_name: String,
    pub author_profile_pic: Option<String>,
}

impl FeedPostRow {
    pub fn author_card(&self) -> UserCard {
        UserCard {
            id: self.author_id,
            user_name: self.author_user_name.clone(),
            profile_pic: self.author_profile_pic.clone(),
        }
    }
}

#[derive(Debug, FromRow)]
pub(super) struct LikeRow {
    pub post_id: Uuid,
    pub user_id: Uuid,
}

#[derive(Debug, FromRow)]
pub(super) struct CommentRow {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub text: String,
    pub created_at: OffsetDateTime,
}

impl From<CommentRow> for CommentRecord {
    fn from(row: CommentRow) -> Self {
        CommentRecord {
            id: row.id,
            post_id: row.post_id,
            author_id: row.author_id,
            text: row.text,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub(super) struct FeedCommentRow {
    pub id: Uuid,
    pub post_id: Uuid,
    pub text: String,
    pub created_at: OffsetDateTime,
    pub author_id: Uuid,
    pub author_user_name: String,
    pub author_profile_pic: Option<String>,
}

impl FeedCommentRow {
    pub fn into_view(self) -> (Uuid, CommentView) {
        (
            self.post_id,
            CommentView {
                id: self.id,
                author: UserCard {
                    id: self.author_id,
                    user_name: self.author_user_name,
                    profile_pic: self.author_profile_pic,
                },
                text: self.text,
                created_at: self.created_at,
            },
        )
    }
}

#[derive(Debug, FromRow)]
pub(super) struct NotificationViewRow {
    pub id: Uuid,
    pub kind: String,
    pub text: Option<String>,
    pub post_id: Option<Uuid>,
    pub read: bool,
    pub created_at: OffsetDateTime,
    pub sender_id: Uuid,
    pub sender_user_name: String,
    pub sender_profile_pic: Option<String>,
}

impl NotificationViewRow {
    pub fn into_view(self) -> Option<NotificationView> {
        let kind = NotificationKind::parse(&self.kind)?;
        Some(NotificationView {
            id: self.id,
            from: UserCard {
                id: self.sender_id,
                user_name: self.sender_user_name,
                profile_pic: self.sender_profile_pic,
            },
            kind,
            text: self.text,
            post_id: self.post_id,
            read: self.read,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub(super) struct SessionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub prefix: String,
    pub hashed_secret: Vec<u8>,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

impl From<SessionRow> for SessionRecord {
    fn from(row: SessionRow) -> Self {
        SessionRecord {
            id: row.id,
            user_id: row.user_id,
            prefix: row.prefix,
            hashed_secret: row.hashed_secret,
            created_at: row.created_at,
            expires_at: row.expires_at,
        }
    }
}
