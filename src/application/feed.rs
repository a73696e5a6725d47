//! Cached feed reads.
//!
//! Every method follows the same read-through shape: derive the key, try the
//! cache, otherwise run the composite query, store the rendered payload,
//! return it. The cache step only runs after the query has fully succeeded,
//! so a storage failure surfaces exactly as it would without caching and no
//! partial payload is ever stored. A cache hit skips persistent storage
//! entirely.

use std::sync::Arc;

use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::application::pagination::{Page, PageRequest};
use crate::application::repos::{PostView, PostsRepo, RepoError, UsersRepo};
use crate::cache::{CacheConfig, CacheStore, keys};

#[derive(Clone)]
pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    users: Arc<dyn UsersRepo>,
    cache: Arc<CacheStore>,
    config: CacheConfig,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        users: Arc<dyn UsersRepo>,
        cache: Arc<CacheStore>,
        config: CacheConfig,
    ) -> Self {
        Self {
            posts,
            users,
            cache,
            config,
        }
    }

    /// Global feed, newest first.
    pub async fn all_posts(&self, page: PageRequest) -> Result<Value, RepoError> {
        let key = keys::all_posts_key(page);
        if let Some(hit) = self.cache_get(&key) {
            return Ok(hit);
        }

        let posts = self.posts.list_posts(page).await?;
        self.render_and_store(key, &posts, self.config.feed_ttl())
    }

    /// Posts by authors the viewer follows.
    pub async fn following_posts(
        &self,
        viewer: Uuid,
        page: PageRequest,
    ) -> Result<Value, RepoError> {
        let key = keys::following_posts_key(viewer, page);
        if let Some(hit) = self.cache_get(&key) {
            return Ok(hit);
        }

        let posts = self.posts.list_following_posts(viewer, page).await?;
        self.render_and_store(key, &posts, self.config.feed_ttl())
    }

    /// One author's posts. `None` when the author does not exist.
    pub async fn author_posts(
        &self,
        author: Uuid,
        page: PageRequest,
    ) -> Result<Option<Value>, RepoError> {
        let key = keys::author_posts_key(author, page);
        if let Some(hit) = self.cache_get(&key) {
            return Ok(Some(hit));
        }

        if self.users.find_by_id(author).await?.is_none() {
            return Ok(None);
        }

        let posts = self.posts.list_posts_by_author(author, page).await?;
        self.render_and_store(key, &posts, self.config.author_ttl())
            .map(Some)
    }

    /// A single post with likers and comments. `None` when it does not
    /// exist; misses are never cached.
    pub async fn post_detail(&self, id: Uuid) -> Result<Option<Value>, RepoError> {
        let key = keys::post_detail_key(id);
        if let Some(hit) = self.cache_get(&key) {
            return Ok(Some(hit));
        }

        match self.posts.find_post(id).await? {
            Some(post) => self
                .render_and_store(key, &post, self.config.author_ttl())
                .map(Some),
            None => Ok(None),
        }
    }

    /// Posts the viewer has liked. Uncached: the like toggle would have to
    /// evict per-viewer keys it cannot enumerate cheaply.
    pub async fn liked_posts(
        &self,
        viewer: Uuid,
        page: PageRequest,
    ) -> Result<Page<PostView>, RepoError> {
        self.posts.list_liked_posts(viewer, page).await
    }

    fn cache_get(&self, key: &str) -> Option<Value> {
        if !self.config.enabled {
            return None;
        }
        self.cache.get(key)
    }

    /// Serialize the payload and, on success, cache it. A serialization
    /// failure stores nothing and fails the read the same way encoding the
    /// response would have without a cache in front of it.
    fn render_and_store<T: serde::Serialize>(
        &self,
        key: String,
        payload: &T,
        ttl: std::time::Duration,
    ) -> Result<Value, RepoError> {
        let value = serde_json::to_value(payload).map_err(|err| {
            warn!(key = %key, error = %err, "feed payload failed to serialize; nothing cached");
            RepoError::from_persistence(err)
        })?;
        if self.config.enabled {
            self.cache.set(key, value.clone(), Some(ttl));
        }
        Ok(value)
    }
}
