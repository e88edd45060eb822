//! Login, logout and current-session routes

use axum::{extract::State, http::HeaderMap, Extension, Json};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use tokio::time::Instant;
use warden_shared::PrincipalId;

use crate::{
    auth::{
        cookies::{
            anti_forgery_cookie, clear_anti_forgery_cookie, clear_session_cookie, session_cookie,
            session_id_from,
        },
        password::{calculate_password_strength, PasswordStrengthLevel},
        AuthSession, RequestContext,
    },
    error::ApiResult,
    state::AppState,
};

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub principal_id: PrincipalId,
    pub username: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub principal_id: PrincipalId,
    pub username: String,
    pub roles: Vec<String>,
    pub session_expires_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckPasswordStrengthRequest {
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct CheckPasswordStrengthResponse {
    pub score: u8,
    pub level: PasswordStrengthLevel,
    pub feedback: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// =============================================================================
// Handlers
// =============================================================================

/// Authenticate and open a session.
///
/// Every outcome takes at least `LOGIN_MIN_RESPONSE_MS`, so response time says
/// nothing about whether the username exists.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> ApiResult<(CookieJar, Json<LoginResponse>)> {
    let started = Instant::now();
    let ctx = RequestContext::from_headers(&headers);

    let result = state
        .authenticator
        .login(req.username.trim(), &req.password, &ctx)
        .await;

    tokio::time::sleep_until(started + state.config.login_min_response).await;

    let login = result?;
    let secure = state.config.cookie_secure;
    let jar = jar
        .add(session_cookie(&login.session_id, secure))
        .add(anti_forgery_cookie(&login.anti_forgery_token, secure));

    Ok((
        jar,
        Json(LoginResponse {
            principal_id: login.principal_id,
            username: login.username,
        }),
    ))
}

/// End the caller's session. Succeeds without one.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    auth: Option<Extension<AuthSession>>,
) -> (CookieJar, Json<MessageResponse>) {
    let ctx = RequestContext::from_headers(&headers);
    let session_id = session_id_from(&jar);

    state
        .logout
        .logout(session_id.as_ref(), auth.map(|Extension(a)| a), &ctx)
        .await;

    let jar = jar
        .add(clear_session_cookie())
        .add(clear_anti_forgery_cookie());

    (
        jar,
        Json(MessageResponse {
            message: "Logged out".to_string(),
        }),
    )
}

/// Principal bound to the current session
pub async fn me(Extension(auth): Extension<AuthSession>) -> Json<MeResponse> {
    let session_expires_at = auth
        .session
        .expires_at
        .format(&Rfc3339)
        .unwrap_or_else(|_| auth.session.expires_at.to_string());

    Json(MeResponse {
        principal_id: auth.principal_id,
        username: auth.username,
        roles: auth.roles,
        session_expires_at,
    })
}

/// Strength feedback for a candidate new password
pub async fn check_password_strength(
    Json(req): Json<CheckPasswordStrengthRequest>,
) -> Json<CheckPasswordStrengthResponse> {
    let strength = calculate_password_strength(&req.password);
    Json(CheckPasswordStrengthResponse {
        score: strength.score,
        level: strength.level,
        feedback: strength.feedback,
    })
}
