use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::application::sessions::AuthError;

use super::error::ApiError;
use super::state::{ApiState, CurrentUser, SESSION_COOKIE};

/// Resolve the session cookie to a user and stash it in the request
/// extensions. Requests without a valid session never reach a handler.
pub async fn session_auth(
    State(state): State<ApiState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token = match session_cookie(&request) {
        Some(value) => value,
        None => return ApiError::unauthorized().into_response(),
    };

    let user = match state.sessions.authenticate(&token).await {
        Ok(user) => user,
        Err(AuthError::Expired) => {
            return ApiError::new(
                StatusCode::UNAUTHORIZED,
                "expired",
                "Session expired",
                None,
            )
            .into_response();
        }
        Err(_) => return ApiError::unauthorized().into_response(),
    };

    request.extensions_mut().insert(CurrentUser(user));
    next.run(request).await
}

pub async fn api_rate_limit(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let user = match request.extensions().get::<CurrentUser>() {
        Some(user) => user,
        None => {
            warn!(
                target = "corvid::api::ratelimit",
                "missing current user in rate limit middleware"
            );
            return ApiError::unauthorized().into_response();
        }
    };

    let key = user.0.id.to_string();

    if !state.rate_limiter.allow(&key, &path) {
        return ApiError::rate_limited(state.rate_limiter.retry_after_secs());
    }

    next.run(request).await
}

/// Pull the session token out of the `Cookie` header.
fn session_cookie(request: &Request<Body>) -> Option<String> {
    let raw = request.headers().get(header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_with_cookie(value: &str) -> Request<Body> {
        Request::builder()
            .header(header::COOKIE, value)
            .body(Body::empty())
            .expect("request")
    }

    #[test]
    fn extracts_the_session_cookie_among_others() {
        let request =
            request_with_cookie("theme=dark; corvid_session=cv_abc_secret; lang=en");
        assert_eq!(
            session_cookie(&request).as_deref(),
            Some("cv_abc_secret")
        );
    }

    #[test]
    fn missing_cookie_reads_as_none() {
        let request = request_with_cookie("theme=dark");
        assert!(session_cookie(&request).is_none());

        let bare = Request::builder().body(Body::empty()).expect("request");
        assert!(session_cookie(&bare).is_none());
    }
}
