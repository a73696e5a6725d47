use async_trait::async_trait;
use sqlx::query;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    CreateUserParams, RepoError, UpdateProfileParams, UserCard, UserProfile, UsersRepo,
    UsersWriteRepo,
};
use crate::domain::entities::UserRecord;
use crate::domain::types::NotificationKind;

use super::PostgresRepositories;
use super::types::{ProfileRow, UserCardRow, UserRow};
use super::util::map_sqlx_error;

const USER_COLUMNS: &str = "id, user_name, email, password_hash, password_salt, \
     bio, link, profile_pic, cover_pic, created_at, updated_at";

#[async_trait]
impl UsersRepo for PostgresRepositories {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(UserRecord::from))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(UserRecord::from))
    }

    async fn load_profile(&self, id: Uuid) -> Result<Option<UserProfile>, RepoError> {
        let sql = format!(
            "SELECT {USER_COLUMNS}, \
                (SELECT COUNT(*) FROM follows WHERE followee_id = users.id) AS followers_count, \
                (SELECT COUNT(*) FROM follows WHERE follower_id = users.id) AS following_count \
             FROM users WHERE id = $1"
        );
        let row = sqlx::query_as::<_, ProfileRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(UserProfile::from))
    }

    async fn suggested_users(&self, viewer: Uuid, limit: u32) -> Result<Vec<UserCard>, RepoError> {
        // Random sample of users the viewer is not already following.
        let rows = sqlx::query_as::<_, UserCardRow>(
            "SELECT id, user_name, profile_pic FROM users u \
             WHERE u.id <> $1 \
               AND NOT EXISTS (SELECT 1 FROM follows f \
                               WHERE f.follower_id = $1 AND f.followee_id = u.id) \
             ORDER BY random() LIMIT $2",
        )
        .bind(viewer)
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(UserCard::from).collect())
    }

    async fn list_followers(&self, id: Uuid) -> Result<Vec<UserCard>, RepoError> {
        let rows = sqlx::query_as::<_, UserCardRow>(
            "SELECT u.id, u.user_name, u.profile_pic \
             FROM follows f INNER JOIN users u ON u.id = f.follower_id \
             WHERE f.followee_id = $1 ORDER BY f.created_at DESC",
        )
        .bind(id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(UserCard::from).collect())
    }

    async fn list_following(&self, id: Uuid) -> Result<Vec<UserCard>, RepoError> {
        let rows = sqlx::query_as::<_, UserCardRow>(
            "SELECT u.id, u.user_name, u.profile_pic \
             FROM follows f INNER JOIN users u ON u.id = f.followee_id \
             WHERE f.follower_id = $1 ORDER BY f.created_at DESC",
        )
        .bind(id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(UserCard::from).collect())
    }

    async fn is_following(&self, follower: Uuid, followee: Uuid) -> Result<bool, RepoError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = $1 AND followee_id = $2)",
        )
        .bind(follower)
        .bind(followee)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }
}

#[async_trait]
impl UsersWriteRepo for PostgresRepositories {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        let sql = format!(
            "INSERT INTO users (id, user_name, email, password_hash, password_salt, \
                                created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $6) \
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(&params.user_name)
            .bind(&params.email)
            .bind(&params.password_hash)
            .bind(&params.password_salt)
            .bind(now)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn update_profile(&self, params: UpdateProfileParams) -> Result<UserRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let sql = format!(
            "UPDATE users SET user_name = $2, email = $3, bio = $4, link = $5, \
                              profile_pic = $6, cover_pic = $7, updated_at = $8 \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(params.id)
            .bind(&params.user_name)
            .bind(&params.email)
            .bind(&params.bio)
            .bind(&params.link)
            .bind(&params.profile_pic)
            .bind(&params.cover_pic)
            .bind(now)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn update_password(
        &self,
        id: Uuid,
        password_hash: Vec<u8>,
        password_salt: String,
    ) -> Result<(), RepoError> {
        let now = OffsetDateTime::now_utc();
        let result = query(
            "UPDATE users SET password_hash = $2, password_salt = $3, updated_at = $4 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(&password_hash)
        .bind(&password_salt)
        .bind(now)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn follow(&self, follower: Uuid, followee: Uuid) -> Result<(), RepoError> {
        let now = OffsetDateTime::now_utc();
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let inserted = query(
            "INSERT INTO follows (follower_id, followee_id, created_at) \
             VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
        )
        .bind(follower)
        .bind(followee)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        // Notify only on a fresh edge; repeating a follow is a no-op.
        if inserted.rows_affected() > 0 {
            query(
                "INSERT INTO notifications (id, sender_id, recipient_id, kind, created_at) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(Uuid::new_v4())
            .bind(follower)
            .bind(followee)
            .bind(NotificationKind::Follow.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)
    }

    async fn unfollow(&self, follower: Uuid, followee: Uuid) -> Result<(), RepoError> {
        query("DELETE FROM follows WHERE follower_id = $1 AND followee_id = $2")
            .bind(follower)
            .bind(followee)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}
