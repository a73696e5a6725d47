//! Signup, login, logout and the current-user probe.

use axum::Json;
use axum::body::Body;
use axum::extract::{Extension, State};
use axum::http::{Request, StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::application::sessions::{SessionOpened, SignupCommand};

use super::auth_to_api;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::{LoginRequest, SignupRequest};
use crate::infra::http::api::state::{ApiState, CurrentUser, SESSION_COOKIE};

pub async fn signup(
    State(state): State<ApiState>,
    Json(payload): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let opened = state
        .sessions
        .signup(SignupCommand {
            user_name: payload.user_name,
            email: payload.email,
            password: payload.password,
        })
        .await
        .map_err(auth_to_api)?;

    Ok(session_response(StatusCode::CREATED, opened))
}

pub async fn login(
    State(state): State<ApiState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let opened = state
        .sessions
        .login(&payload.email, &payload.password)
        .await
        .map_err(auth_to_api)?;

    Ok(session_response(StatusCode::OK, opened))
}

/// Best-effort: an absent or already-dead session still clears the cookie.
pub async fn logout(State(state): State<ApiState>, request: Request<Body>) -> Response {
    if let Some(token) = cookie_value(&request) {
        let _ = state.sessions.logout(&token).await;
    }

    let mut response = (
        StatusCode::OK,
        Json(serde_json::json!({"message": "logged out"})),
    )
        .into_response();
    set_cookie(&mut response, "", 0);
    response
}

pub async fn me(Extension(user): Extension<CurrentUser>) -> impl IntoResponse {
    Json(user.0)
}

fn session_response(status: StatusCode, opened: SessionOpened) -> Response {
    let max_age = (opened.expires_at - time::OffsetDateTime::now_utc())
        .whole_seconds()
        .max(0);
    let mut response = (status, Json(opened.user)).into_response();
    set_cookie(&mut response, &opened.token, max_age);
    response
}

fn set_cookie(response: &mut Response, token: &str, max_age: i64) {
    let cookie =
        format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    if let Ok(value) = header::HeaderValue::from_str(&cookie) {
        response.headers_mut().insert(header::SET_COOKIE, value);
    }
}

fn cookie_value(request: &Request<Body>) -> Option<String> {
    let raw = request.headers().get(header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}
