//! User profiles, suggestions and the social graph.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::application::repos::{
    RepoError, UpdateProfileParams, UserCard, UsersRepo, UsersWriteRepo,
};
use crate::application::sessions::{generate_salt, hash_password, verify_password};
use crate::cache::{CacheConfig, CacheInvalidator, CacheStore, Mutation, keys};
use crate::domain::entities::UserRecord;

const SUGGESTED_USERS_LIMIT: u32 = 4;
const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("user not found")]
    NotFound,
    #[error("users cannot follow themselves")]
    SelfFollow,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("current password is incorrect")]
    WrongPassword,
}

impl ProfileError {
    fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

#[derive(Debug, Clone)]
pub struct UpdateProfileCommand {
    pub user_name: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub link: Option<String>,
    pub profile_pic: Option<String>,
    pub cover_pic: Option<String>,
}

/// Both sides of a follow toggle, re-read after the mutation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowOutcome {
    pub my_account: UserRecord,
    pub follow_user: UserRecord,
    pub following: bool,
}

#[derive(Clone)]
pub struct ProfileService {
    users: Arc<dyn UsersRepo>,
    users_write: Arc<dyn UsersWriteRepo>,
    cache: Arc<CacheStore>,
    config: CacheConfig,
    invalidator: CacheInvalidator,
}

impl ProfileService {
    pub fn new(
        users: Arc<dyn UsersRepo>,
        users_write: Arc<dyn UsersWriteRepo>,
        cache: Arc<CacheStore>,
        config: CacheConfig,
        invalidator: CacheInvalidator,
    ) -> Self {
        Self {
            users,
            users_write,
            cache,
            config,
            invalidator,
        }
    }

    /// Profile page (user plus relationship counts), cached per subject.
    pub async fn profile(&self, subject: Uuid) -> Result<Option<Value>, ProfileError> {
        let key = keys::profile_key(subject);
        if self.config.enabled
            && let Some(hit) = self.cache.get(&key)
        {
            return Ok(Some(hit));
        }

        match self.users.load_profile(subject).await? {
            Some(profile) => self.store_rendered(key, &profile).map(Some),
            None => Ok(None),
        }
    }

    /// Up to four users the viewer does not follow yet, cached per viewer.
    pub async fn suggested_users(&self, viewer: Uuid) -> Result<Value, ProfileError> {
        let key = keys::suggested_users_key(viewer);
        if self.config.enabled
            && let Some(hit) = self.cache.get(&key)
        {
            return Ok(hit);
        }

        let users = self
            .users
            .suggested_users(viewer, SUGGESTED_USERS_LIMIT)
            .await?;
        self.store_rendered(key, &users)
    }

    pub async fn followers(&self, subject: Uuid) -> Result<Option<Vec<UserCard>>, ProfileError> {
        if self.users.find_by_id(subject).await?.is_none() {
            return Ok(None);
        }
        Ok(Some(self.users.list_followers(subject).await?))
    }

    pub async fn following(&self, subject: Uuid) -> Result<Option<Vec<UserCard>>, ProfileError> {
        if self.users.find_by_id(subject).await?.is_none() {
            return Ok(None);
        }
        Ok(Some(self.users.list_following(subject).await?))
    }

    /// Follow when not yet following, unfollow otherwise. The follow branch
    /// also writes the notification inside the repository transaction.
    pub async fn toggle_follow(
        &self,
        actor: Uuid,
        target: Uuid,
    ) -> Result<FollowOutcome, ProfileError> {
        if actor == target {
            return Err(ProfileError::SelfFollow);
        }
        if self.users.find_by_id(target).await?.is_none() {
            return Err(ProfileError::NotFound);
        }

        let following = if self.users.is_following(actor, target).await? {
            self.users_write.unfollow(actor, target).await?;
            false
        } else {
            self.users_write.follow(actor, target).await?;
            true
        };

        self.invalidator.apply(Mutation::FollowToggled {
            follower: actor,
            followee: target,
        });

        let my_account = self.require_user(actor).await?;
        let follow_user = self.require_user(target).await?;
        Ok(FollowOutcome {
            my_account,
            follow_user,
            following,
        })
    }

    pub async fn update_profile(
        &self,
        actor: Uuid,
        command: UpdateProfileCommand,
    ) -> Result<UserRecord, ProfileError> {
        let current = self.require_user(actor).await?;

        let user_name = command
            .user_name
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(current.user_name);
        let email = command
            .email
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(current.email);

        let updated = self
            .users_write
            .update_profile(UpdateProfileParams {
                id: actor,
                user_name,
                email,
                bio: command.bio.or(current.bio),
                link: command.link.or(current.link),
                profile_pic: command.profile_pic.or(current.profile_pic),
                cover_pic: command.cover_pic.or(current.cover_pic),
            })
            .await?;

        self.invalidator
            .apply(Mutation::ProfileUpdated { user: actor });

        Ok(updated)
    }

    pub async fn update_password(
        &self,
        actor: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), ProfileError> {
        if old_password.is_empty() || new_password.is_empty() {
            return Err(ProfileError::validation(
                "both current and new password are required",
            ));
        }
        if new_password.len() < MIN_PASSWORD_LEN {
            return Err(ProfileError::validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters long"
            )));
        }

        let user = self.require_user(actor).await?;
        if !verify_password(old_password, &user.password_salt, &user.password_hash) {
            return Err(ProfileError::WrongPassword);
        }

        let salt = generate_salt();
        let hash = hash_password(new_password, &salt);
        self.users_write.update_password(actor, hash, salt).await?;
        Ok(())
    }

    async fn require_user(&self, id: Uuid) -> Result<UserRecord, ProfileError> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or(ProfileError::NotFound)
    }

    fn store_rendered<T: Serialize>(&self, key: String, payload: &T) -> Result<Value, ProfileError> {
        let value = serde_json::to_value(payload).map_err(|err| {
            warn!(key = %key, error = %err, "profile payload failed to serialize; nothing cached");
            ProfileError::Repo(RepoError::from_persistence(err))
        })?;
        if self.config.enabled {
            self.cache
                .set(key, value.clone(), Some(self.config.profile_ttl()));
        }
        Ok(value)
    }
}
