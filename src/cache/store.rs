//! Response cache storage.
//!
//! A process-local table of rendered read responses keyed by strings whose
//! prefixes encode the resource class (see `keys`). Entries expire lazily on
//! read; a background sweep may also purge them. The store is deliberately
//! infallible: every operation is a plain in-memory map step under one lock,
//! and anything unexpected degrades to a miss rather than an error.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use metrics::counter;
use serde_json::Value;
use time::OffsetDateTime;

use super::config::CacheConfig;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::store";

struct CacheEntry {
    value: Value,
    expires_at: OffsetDateTime,
}

/// In-memory key/value table with per-entry expiry and bulk prefix eviction.
///
/// One instance is constructed at startup and injected wherever caching is
/// needed; tests build their own isolated instances. A single mutex guards
/// every operation because `delete_by_prefix` iterates the key set and must
/// not interleave with inserts.
pub struct CacheStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
    default_ttl: Duration,
}

impl CacheStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl: config.default_ttl(),
        }
    }

    /// Look up a live entry. Absent keys and expired entries both read as a
    /// miss; an expired entry is dropped on the way out.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.get_at(key, OffsetDateTime::now_utc())
    }

    fn get_at(&self, key: &str, now: OffsetDateTime) -> Option<Value> {
        let mut entries = mutex_lock(&self.entries, SOURCE, "get");
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => {
                counter!("corvid_cache_hit_total").increment(1);
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                counter!("corvid_cache_miss_total").increment(1);
                None
            }
            None => {
                counter!("corvid_cache_miss_total").increment(1);
                None
            }
        }
    }

    /// Insert or overwrite an entry. `None` (and a zero duration) mean the
    /// configured default TTL; every entry carries an absolute deadline.
    pub fn set(&self, key: impl Into<String>, value: Value, ttl: Option<Duration>) {
        self.set_at(key, value, ttl, OffsetDateTime::now_utc());
    }

    fn set_at(
        &self,
        key: impl Into<String>,
        value: Value,
        ttl: Option<Duration>,
        now: OffsetDateTime,
    ) {
        let ttl = match ttl {
            Some(ttl) if !ttl.is_zero() => ttl,
            _ => self.default_ttl,
        };
        let entry = CacheEntry {
            value,
            expires_at: now + ttl,
        };
        mutex_lock(&self.entries, SOURCE, "set").insert(key.into(), entry);
    }

    /// Remove one key. Idempotent; absent keys are not an error.
    pub fn delete(&self, key: &str) {
        mutex_lock(&self.entries, SOURCE, "delete").remove(key);
    }

    /// Remove every key starting with `prefix`. Cost is linear in the number
    /// of live keys, which TTL turnover keeps bounded.
    pub fn delete_by_prefix(&self, prefix: &str) {
        let mut entries = mutex_lock(&self.entries, SOURCE, "delete_by_prefix");
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        let evicted = before - entries.len();
        if evicted > 0 {
            counter!("corvid_cache_evict_total").increment(evicted as u64);
        }
    }

    /// Clear the whole table. Test/reset paths only, never request handlers.
    pub fn flush_all(&self) {
        mutex_lock(&self.entries, SOURCE, "flush_all").clear();
    }

    /// Drop entries whose deadline has passed. Returns how many were purged.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(OffsetDateTime::now_utc())
    }

    fn purge_expired_at(&self, now: OffsetDateTime) -> usize {
        let mut entries = mutex_lock(&self.entries, SOURCE, "purge_expired");
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    /// Number of physically held entries, expired or not.
    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use serde_json::json;

    use super::*;

    fn store() -> CacheStore {
        CacheStore::new(&CacheConfig::default())
    }

    #[test]
    fn miss_then_hit() {
        let store = store();
        assert!(store.get("posts_all_p1_l10").is_none());

        store.set(
            "posts_all_p1_l10",
            json!({"items": [1, 2, 3]}),
            Some(Duration::from_secs(60)),
        );
        assert_eq!(
            store.get("posts_all_p1_l10"),
            Some(json!({"items": [1, 2, 3]}))
        );
    }

    #[test]
    fn last_write_wins() {
        let store = store();
        store.set("k", json!(1), None);
        store.set("k", json!(2), None);
        assert_eq!(store.get("k"), Some(json!(2)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn entry_expires_after_ttl() {
        let store = store();
        let now = OffsetDateTime::now_utc();
        store.set_at(
            "posts_all_p1_l10",
            json!({"items": [1, 2, 3]}),
            Some(Duration::from_secs(60)),
            now,
        );

        assert!(store.get_at("posts_all_p1_l10", now).is_some());
        assert!(
            store
                .get_at("posts_all_p1_l10", now + Duration::from_secs(59))
                .is_some()
        );
        // 61 seconds later the entry reads as absent even though it was
        // never explicitly deleted.
        assert!(
            store
                .get_at("posts_all_p1_l10", now + Duration::from_secs(61))
                .is_none()
        );
        // The expired read also dropped it physically.
        assert!(store.is_empty());
    }

    #[test]
    fn zero_ttl_means_default_not_immortal() {
        let store = store();
        let now = OffsetDateTime::now_utc();
        store.set_at("k", json!(true), Some(Duration::ZERO), now);

        assert!(store.get_at("k", now + Duration::from_secs(299)).is_some());
        assert!(store.get_at("k", now + Duration::from_secs(301)).is_none());
    }

    #[test]
    fn delete_is_idempotent() {
        let store = store();
        store.delete("never-set");
        store.set("k", json!(1), None);
        store.delete("k");
        store.delete("k");
        assert!(store.get("k").is_none());
    }

    #[test]
    fn prefix_eviction_is_complete_and_scoped() {
        let store = store();
        store.set("posts_user_42_p1_l10", json!([1]), None);
        store.set("posts_user_42_p2_l10", json!([2]), None);
        store.set("posts_user_99_p1_l10", json!([3]), None);

        store.delete_by_prefix("posts_user_42");

        assert!(store.get("posts_user_42_p1_l10").is_none());
        assert!(store.get("posts_user_42_p2_l10").is_none());
        assert_eq!(store.get("posts_user_99_p1_l10"), Some(json!([3])));
    }

    #[test]
    fn flush_all_clears_everything() {
        let store = store();
        store.set("a", json!(1), None);
        store.set("b", json!(2), None);
        store.flush_all();
        assert!(store.is_empty());
    }

    #[test]
    fn sweep_purges_only_expired_entries() {
        let store = store();
        let now = OffsetDateTime::now_utc();
        store.set_at("old", json!(1), Some(Duration::from_secs(10)), now);
        store.set_at("fresh", json!(2), Some(Duration::from_secs(120)), now);

        let purged = store.purge_expired_at(now + Duration::from_secs(30));
        assert_eq!(purged, 1);
        assert_eq!(store.len(), 1);
        assert!(store.get_at("fresh", now + Duration::from_secs(30)).is_some());
    }

    #[test]
    fn store_recovers_from_poisoned_lock() {
        let store = store();

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = store.entries.lock().expect("entries lock");
            panic!("poison entries lock");
        }));

        store.set("k", json!(1), None);
        assert_eq!(store.get("k"), Some(json!(1)));
    }
}
