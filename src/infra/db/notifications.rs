use async_trait::async_trait;
use sqlx::query;
use uuid::Uuid;

use crate::application::repos::{NotificationView, NotificationsRepo, RepoError};

use super::PostgresRepositories;
use super::types::NotificationViewRow;
use super::util::map_sqlx_error;

#[async_trait]
impl NotificationsRepo for PostgresRepositories {
    async fn list_for_recipient(
        &self,
        recipient: Uuid,
    ) -> Result<Vec<NotificationView>, RepoError> {
        let rows: Vec<NotificationViewRow> = sqlx::query_as(
            "SELECT n.id, n.kind, n.text, n.post_id, n.read, n.created_at, \
                    u.id AS sender_id, u.user_name AS sender_user_name, \
                    u.profile_pic AS sender_profile_pic \
             FROM notifications n INNER JOIN users u ON u.id = n.sender_id \
             WHERE n.recipient_id = $1 ORDER BY n.created_at DESC",
        )
        .bind(recipient)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        // Rows with an unknown kind would mean a schema/code mismatch; drop
        // them rather than failing the whole listing.
        Ok(rows
            .into_iter()
            .filter_map(NotificationViewRow::into_view)
            .collect())
    }

    async fn find_recipient(&self, id: Uuid) -> Result<Option<Uuid>, RepoError> {
        sqlx::query_scalar::<_, Uuid>("SELECT recipient_id FROM notifications WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn delete_one(&self, id: Uuid) -> Result<(), RepoError> {
        let result = query("DELETE FROM notifications WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn delete_all_for_recipient(&self, recipient: Uuid) -> Result<u64, RepoError> {
        let result = query("DELETE FROM notifications WHERE recipient_id = $1")
            .bind(recipient)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }
}
