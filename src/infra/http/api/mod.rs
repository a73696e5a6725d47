pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod rate_limit;
pub mod state;

pub use rate_limit::ApiRateLimiter;
pub use state::{ApiState, CurrentUser, SESSION_COOKIE};

use axum::{
    Router,
    extract::State,
    middleware as axum_middleware,
    response::Response,
    routing::{delete, get, patch, post},
};

use crate::infra::http::db_health_response;

/// The full REST surface. Signup/login/logout and the health probe are open;
/// everything else sits behind the session middleware, with rate limiting
/// applied per authenticated user.
pub fn build_api_router(state: ApiState) -> Router {
    let open = Router::new()
        .route("/healthz", get(health))
        .route("/api/auth/signup", post(handlers::signup))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/logout", post(handlers::logout));

    let protected = Router::new()
        .route("/api/auth/me", get(handlers::me))
        .route(
            "/api/posts",
            get(handlers::list_posts).post(handlers::create_post),
        )
        .route("/api/posts/following", get(handlers::following_posts))
        .route("/api/posts/liked", get(handlers::liked_posts))
        .route("/api/posts/user/{id}", get(handlers::author_posts))
        .route(
            "/api/posts/{id}",
            get(handlers::post_detail).delete(handlers::delete_post),
        )
        .route("/api/posts/{id}/comments", post(handlers::comment_on_post))
        .route("/api/posts/{id}/like", post(handlers::like_post))
        .route("/api/users/suggested", get(handlers::suggested_users))
        .route("/api/users/me", patch(handlers::update_profile))
        .route("/api/users/me/password", patch(handlers::update_password))
        .route("/api/users/{id}", get(handlers::profile))
        .route("/api/users/{id}/followers", get(handlers::followers))
        .route("/api/users/{id}/following", get(handlers::following))
        .route("/api/users/{id}/follow", post(handlers::toggle_follow))
        .route(
            "/api/notifications",
            get(handlers::list_notifications).delete(handlers::clear_notifications),
        )
        .route(
            "/api/notifications/{id}",
            delete(handlers::delete_notification),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::api_rate_limit,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::session_auth,
        ));

    open.merge(protected).with_state(state)
}

async fn health(State(state): State<ApiState>) -> Response {
    db_health_response(state.db.health_check().await)
}
