use std::sync::Arc;

use crate::application::feed::FeedService;
use crate::application::notifications::NotificationService;
use crate::application::posts::PostService;
use crate::application::profiles::ProfileService;
use crate::application::sessions::SessionService;
use crate::domain::entities::UserRecord;
use crate::infra::db::PostgresRepositories;

use super::rate_limit::ApiRateLimiter;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "corvid_session";

#[derive(Clone)]
pub struct ApiState {
    pub sessions: Arc<SessionService>,
    pub feed: Arc<FeedService>,
    pub posts: Arc<PostService>,
    pub profiles: Arc<ProfileService>,
    pub notifications: Arc<NotificationService>,
    pub db: Arc<PostgresRepositories>,
    pub rate_limiter: Arc<ApiRateLimiter>,
}

/// The authenticated user, injected by the session middleware.
#[derive(Clone)]
pub struct CurrentUser(pub UserRecord);
