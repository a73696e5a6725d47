use async_trait::async_trait;
use sqlx::query;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{CreateSessionParams, RepoError, SessionsRepo};
use crate::domain::entities::SessionRecord;

use super::PostgresRepositories;
use super::types::SessionRow;
use super::util::map_sqlx_error;

const SESSION_COLUMNS: &str = "id, user_id, prefix, hashed_secret, created_at, expires_at";

#[async_trait]
impl SessionsRepo for PostgresRepositories {
    async fn create_session(
        &self,
        params: CreateSessionParams,
    ) -> Result<SessionRecord, RepoError> {
        let id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        let sql = format!(
            "INSERT INTO sessions (id, user_id, prefix, hashed_secret, created_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {SESSION_COLUMNS}"
        );
        let row = sqlx::query_as::<_, SessionRow>(&sql)
            .bind(id)
            .bind(params.user_id)
            .bind(&params.prefix)
            .bind(&params.hashed_secret)
            .bind(now)
            .bind(params.expires_at)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<SessionRecord>, RepoError> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE prefix = $1");
        let row = sqlx::query_as::<_, SessionRow>(&sql)
            .bind(prefix)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(SessionRecord::from))
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<(), RepoError> {
        query("DELETE FROM sessions WHERE prefix = $1")
            .bind(prefix)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64, RepoError> {
        let result = query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(OffsetDateTime::now_utc())
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }
}
