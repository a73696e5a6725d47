//! Application services orchestrating repositories and the cache.

pub mod error;
pub mod feed;
pub mod notifications;
pub mod pagination;
pub mod posts;
pub mod profiles;
pub mod repos;
pub mod sessions;
