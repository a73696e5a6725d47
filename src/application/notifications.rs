//! Notification reads and deletion.
//!
//! Notifications are written by the post/follow repositories inside their
//! mutation transactions; this service only lists and deletes them.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::application::repos::{NotificationView, NotificationsRepo, RepoError};

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("notification not found")]
    NotFound,
    #[error("notification belongs to another user")]
    NotOwner,
}

#[derive(Clone)]
pub struct NotificationService {
    repo: Arc<dyn NotificationsRepo>,
}

impl NotificationService {
    pub fn new(repo: Arc<dyn NotificationsRepo>) -> Self {
        Self { repo }
    }

    pub async fn list(&self, recipient: Uuid) -> Result<Vec<NotificationView>, NotificationError> {
        Ok(self.repo.list_for_recipient(recipient).await?)
    }

    pub async fn clear(&self, recipient: Uuid) -> Result<u64, NotificationError> {
        Ok(self.repo.delete_all_for_recipient(recipient).await?)
    }

    /// Owner-only single delete; returns the remaining notifications so the
    /// client can refresh its list in one round trip.
    pub async fn delete_one(
        &self,
        recipient: Uuid,
        id: Uuid,
    ) -> Result<Vec<NotificationView>, NotificationError> {
        let owner = self
            .repo
            .find_recipient(id)
            .await?
            .ok_or(NotificationError::NotFound)?;
        if owner != recipient {
            return Err(NotificationError::NotOwner);
        }

        self.repo.delete_one(id).await?;
        Ok(self.repo.list_for_recipient(recipient).await?)
    }
}
