//! Corvid: a self-hosted social feed backend.
//!
//! Layering follows dependency direction: `domain` holds entity types,
//! `application` the services and repository seams, `cache` the response
//! cache with prefix invalidation, `infra` the Postgres and HTTP adapters.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
