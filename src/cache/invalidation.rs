//! Write-path cache invalidation.
//!
//! Each mutating operation reports what happened; this module decides which
//! key families could now be stale and evicts them. The mapping is
//! deliberately conservative: a post mutation evicts every viewer's
//! following feed rather than chasing the author's follower set, trading
//! some hit rate for the guarantee that nothing stale survives. Eviction is
//! a performance optimization layered on TTL expiry, so it never fails the
//! calling request.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use super::config::CacheConfig;
use super::keys;
use super::store::CacheStore;

/// A committed mutation, described just precisely enough to derive the
/// affected key families.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// A post was created or deleted by `author`.
    PostWritten { author: Uuid, post: Uuid },
    /// A post was liked, unliked or commented on.
    PostEngaged { author: Uuid, post: Uuid },
    /// `follower` started or stopped following `followee`.
    FollowToggled { follower: Uuid, followee: Uuid },
    /// `user` changed profile fields that feed items embed.
    ProfileUpdated { user: Uuid },
    /// A new account was created.
    UserJoined,
}

/// The prefixes a mutation evicts. Exposed separately from the application
/// step so tests can pin the mapping itself.
pub fn eviction_prefixes(mutation: &Mutation) -> Vec<String> {
    match mutation {
        Mutation::PostWritten { author, post } => vec![
            keys::ALL_POSTS_PREFIX.to_string(),
            keys::FOLLOWING_PREFIX.to_string(),
            keys::author_posts_prefix(*author),
            keys::post_detail_key(*post),
        ],
        Mutation::PostEngaged { author, post } => vec![
            keys::ALL_POSTS_PREFIX.to_string(),
            keys::FOLLOWING_PREFIX.to_string(),
            keys::author_posts_prefix(*author),
            keys::post_detail_key(*post),
        ],
        Mutation::FollowToggled { follower, followee } => vec![
            keys::FOLLOWING_PREFIX.to_string(),
            keys::SUGGESTED_PREFIX.to_string(),
            keys::profile_key(*follower),
            keys::profile_key(*followee),
        ],
        Mutation::ProfileUpdated { user } => vec![
            keys::profile_key(*user),
            keys::ALL_POSTS_PREFIX.to_string(),
            keys::FOLLOWING_PREFIX.to_string(),
            keys::author_posts_prefix(*user),
            keys::SUGGESTED_PREFIX.to_string(),
        ],
        Mutation::UserJoined => vec![keys::SUGGESTED_PREFIX.to_string()],
    }
}

/// Applies mutations to the store. Cloned freely into every write service.
#[derive(Clone)]
pub struct CacheInvalidator {
    enabled: bool,
    store: Arc<CacheStore>,
}

impl CacheInvalidator {
    pub fn new(config: &CacheConfig, store: Arc<CacheStore>) -> Self {
        Self {
            enabled: config.enabled,
            store,
        }
    }

    /// Evict every key family the mutation could have staled. Called only
    /// after the mutation has committed.
    pub fn apply(&self, mutation: Mutation) {
        if !self.enabled {
            return;
        }
        let prefixes = eviction_prefixes(&mutation);
        debug!(?mutation, count = prefixes.len(), "evicting cache prefixes");
        for prefix in prefixes {
            self.store.delete_by_prefix(&prefix);
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::application::pagination::PageRequest;

    fn setup() -> (Arc<CacheStore>, CacheInvalidator) {
        let config = CacheConfig::default();
        let store = Arc::new(CacheStore::new(&config));
        let invalidator = CacheInvalidator::new(&config, store.clone());
        (store, invalidator)
    }

    #[test]
    fn post_written_spares_the_author_profile() {
        let (store, invalidator) = setup();
        let author = Uuid::new_v4();
        let post = Uuid::new_v4();
        let page = PageRequest::default();

        store.set(keys::all_posts_key(page), json!([1]), None);
        store.set(keys::author_posts_key(author, page), json!([1]), None);
        store.set(keys::profile_key(author), json!({"id": author}), None);

        invalidator.apply(Mutation::PostWritten { author, post });

        assert!(store.get(&keys::all_posts_key(page)).is_none());
        assert!(store.get(&keys::author_posts_key(author, page)).is_none());
        // A post creation says nothing about the profile itself.
        assert!(store.get(&keys::profile_key(author)).is_some());
    }

    #[test]
    fn engagement_evicts_the_post_detail() {
        let (store, invalidator) = setup();
        let author = Uuid::new_v4();
        let post = Uuid::new_v4();
        let other_post = Uuid::new_v4();

        store.set(keys::post_detail_key(post), json!({"likes": []}), None);
        store.set(keys::post_detail_key(other_post), json!({"likes": []}), None);

        invalidator.apply(Mutation::PostEngaged { author, post });

        assert!(store.get(&keys::post_detail_key(post)).is_none());
        assert!(store.get(&keys::post_detail_key(other_post)).is_some());
    }

    #[test]
    fn follow_evicts_every_following_feed_and_both_profiles() {
        let (store, invalidator) = setup();
        let follower = Uuid::new_v4();
        let followee = Uuid::new_v4();
        let bystander = Uuid::new_v4();
        let page = PageRequest::default();

        store.set(keys::following_posts_key(follower, page), json!([1]), None);
        store.set(keys::following_posts_key(bystander, page), json!([2]), None);
        store.set(keys::suggested_users_key(bystander), json!([]), None);
        store.set(keys::profile_key(follower), json!({}), None);
        store.set(keys::profile_key(followee), json!({}), None);
        store.set(keys::profile_key(bystander), json!({}), None);

        invalidator.apply(Mutation::FollowToggled { follower, followee });

        // The whole following-feed and suggestion families go, since the
        // affected viewers are unknown to the cache layer.
        assert!(store.get(&keys::following_posts_key(follower, page)).is_none());
        assert!(store.get(&keys::following_posts_key(bystander, page)).is_none());
        assert!(store.get(&keys::suggested_users_key(bystander)).is_none());
        assert!(store.get(&keys::profile_key(follower)).is_none());
        assert!(store.get(&keys::profile_key(followee)).is_none());
        assert!(store.get(&keys::profile_key(bystander)).is_some());
    }

    #[test]
    fn profile_update_evicts_feeds_embedding_the_author_card() {
        let (store, invalidator) = setup();
        let user = Uuid::new_v4();
        let page = PageRequest::default();

        store.set(keys::all_posts_key(page), json!([1]), None);
        store.set(keys::author_posts_key(user, page), json!([1]), None);
        store.set(keys::profile_key(user), json!({}), None);

        invalidator.apply(Mutation::ProfileUpdated { user });

        assert!(store.get(&keys::all_posts_key(page)).is_none());
        assert!(store.get(&keys::author_posts_key(user, page)).is_none());
        assert!(store.get(&keys::profile_key(user)).is_none());
    }

    #[test]
    fn disabled_invalidator_leaves_entries_alone() {
        let config = CacheConfig {
            enabled: false,
            ..Default::default()
        };
        let store = Arc::new(CacheStore::new(&config));
        let invalidator = CacheInvalidator::new(&config, store.clone());

        store.set("posts_all_p1_l10", json!([1]), None);
        invalidator.apply(Mutation::UserJoined);
        invalidator.apply(Mutation::PostWritten {
            author: Uuid::new_v4(),
            post: Uuid::new_v4(),
        });

        assert!(store.get("posts_all_p1_l10").is_some());
    }
}
