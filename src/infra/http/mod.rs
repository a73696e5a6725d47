//! HTTP surface: router assembly and shared middleware.

pub mod api;
pub mod middleware;

pub use api::{ApiRateLimiter, ApiState, CurrentUser, SESSION_COOKIE};

use axum::{
    Json, Router,
    http::{HeaderValue, Method, StatusCode, header},
    middleware as axum_middleware,
    response::{IntoResponse, Response},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

use crate::config::ServerSettings;

/// Assemble the application router with CORS, request-context and logging
/// layers around the API routes.
pub fn build_router(state: ApiState, server: &ServerSettings) -> Router {
    let mut router = api::build_api_router(state)
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context));

    if let Some(cors) = cors_layer(server) {
        router = router.layer(cors);
    }

    router
}

/// Cookie auth requires credentialed CORS, which in turn requires explicit
/// origins; no configured origins means no cross-origin access.
fn cors_layer(server: &ServerSettings) -> Option<CorsLayer> {
    if server.cors_allowed_origins.is_empty() {
        return None;
    }

    let origins: Vec<HeaderValue> = server
        .cors_allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "skipping unparseable CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
            ])
            .allow_headers([header::CONTENT_TYPE])
            .allow_credentials(true),
    )
}

pub(crate) fn db_health_response(result: Result<(), sqlx::Error>) -> Response {
    match result {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({"status": "ok"}))).into_response(),
        Err(err) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "degraded",
                "detail": err.to_string(),
            })),
        )
            .into_response(),
    }
}
