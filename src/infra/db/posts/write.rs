use async_trait::async_trait;
use sqlx::query;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    CreateCommentParams, CreatePostParams, PostsWriteRepo, RepoError,
};
use crate::domain::entities::{CommentRecord, PostRecord};
use crate::domain::types::NotificationKind;

use super::super::PostgresRepositories;
use super::super::types::{CommentRow, PostRow};
use super::super::util::map_sqlx_error;

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let row: PostRow = sqlx::query_as(
            "INSERT INTO posts (id, author_id, text, image, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $5) \
             RETURNING id, author_id, text, image, created_at, updated_at",
        )
        .bind(id)
        .bind(params.author_id)
        .bind(&params.text)
        .bind(&params.image)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        // Fan one notification out to every follower, in the same
        // transaction as the post itself.
        query(
            "INSERT INTO notifications (id, sender_id, recipient_id, kind, post_id, created_at) \
             SELECT gen_random_uuid(), $1, follower_id, $2, $3, $4 \
             FROM follows WHERE followee_id = $1",
        )
        .bind(params.author_id)
        .bind(NotificationKind::Post.as_str())
        .bind(id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn delete_post(&self, id: Uuid) -> Result<(), RepoError> {
        let result = query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn add_comment(&self, params: CreateCommentParams) -> Result<CommentRecord, RepoError> {
        let id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let post_author: Uuid = sqlx::query_scalar("SELECT author_id FROM posts WHERE id = $1")
            .bind(params.post_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .ok_or(RepoError::NotFound)?;

        let row: CommentRow = sqlx::query_as(
            "INSERT INTO comments (id, post_id, author_id, text, created_at) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, post_id, author_id, text, created_at",
        )
        .bind(id)
        .bind(params.post_id)
        .bind(params.author_id)
        .bind(&params.text)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        if post_author != params.author_id {
            query(
                "INSERT INTO notifications \
                     (id, sender_id, recipient_id, kind, text, post_id, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(Uuid::new_v4())
            .bind(params.author_id)
            .bind(post_author)
            .bind(NotificationKind::Comment.as_str())
            .bind(&params.text)
            .bind(params.post_id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn like_post(&self, post_id: Uuid, user_id: Uuid) -> Result<(), RepoError> {
        let now = OffsetDateTime::now_utc();
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let post_author: Uuid = sqlx::query_scalar("SELECT author_id FROM posts WHERE id = $1")
            .bind(post_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .ok_or(RepoError::NotFound)?;

        let inserted = query(
            "INSERT INTO post_likes (post_id, user_id, created_at) \
             VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
        )
        .bind(post_id)
        .bind(user_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        // Notify only on a fresh like, and never for self-likes.
        if inserted.rows_affected() > 0 && post_author != user_id {
            query(
                "INSERT INTO notifications (id, sender_id, recipient_id, kind, post_id, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(post_author)
            .bind(NotificationKind::Like.as_str())
            .bind(post_id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn unlike_post(&self, post_id: Uuid, user_id: Uuid) -> Result<(), RepoError> {
        query("DELETE FROM post_likes WHERE post_id = $1 AND user_id = $2")
            .bind(post_id)
            .bind(user_id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}
