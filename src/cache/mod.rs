//! Corvid response cache.
//!
//! Feed-shaped reads are expensive (joins across posts, likes, comments and
//! author cards) and extremely hot, so their rendered responses are cached
//! in-process with per-class TTLs. Writes evict by key prefix: every cached
//! key starts with the prefix of its resource class, so a mutation can
//! invalidate a whole class without knowing which concrete keys exist.
//!
//! The cache is process-local and volatile. In a multi-instance deployment
//! each instance holds its own table, so a write on one instance leaves the
//! others stale for at most one TTL interval; that bound is accepted rather
//! than papered over with distributed invalidation.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! feed_ttl_seconds = 60
//! # ... see config.rs for all options
//! ```

mod config;
mod invalidation;
pub mod keys;
mod lock;
mod store;

pub use config::CacheConfig;
pub use invalidation::{CacheInvalidator, Mutation, eviction_prefixes};
pub use store::CacheStore;
