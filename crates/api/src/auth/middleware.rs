//! Session-validating middleware
//!
//! Resolves the `SESSION` cookie against the registry, slides the session's
//! expiry and binds an [`AuthSession`] to the request.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

use super::context::AuthSession;
use super::cookies::session_id_from;
use super::registry::{SessionId, Touch};
use crate::audit_constants::{event_type, session_event};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Touch the session and load its principal.
pub async fn resolve_session(state: &AppState, session_id: &SessionId) -> ApiResult<AuthSession> {
    let record = match state.registry.touch(session_id).await {
        Touch::Active(record) => record,
        Touch::Superseded => {
            tracing::info!(
                event = session_event::CONCURRENT_REJECTED,
                event_type = event_type::SESSION,
                session = session_id.short(),
                "Request with a session ended by a newer login"
            );
            return Err(ApiError::SessionExpiredConcurrent);
        }
        Touch::TimedOut => {
            tracing::debug!(
                event = session_event::TIMED_OUT,
                event_type = event_type::SESSION,
                session = session_id.short(),
                "Request with a timed-out session"
            );
            return Err(ApiError::SessionInvalid);
        }
        Touch::Unknown => return Err(ApiError::SessionInvalid),
    };

    let Some(principal) = state.principals.find_by_id(record.principal_id).await? else {
        tracing::warn!(
            user_id = %record.principal_id,
            "Session belongs to a deleted principal, removing"
        );
        state.registry.remove(session_id).await;
        return Err(ApiError::SessionInvalid);
    };

    Ok(AuthSession {
        principal_id: principal.id,
        username: principal.username,
        roles: principal.roles,
        session: record,
    })
}

/// Reject requests without a live session
pub async fn require_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let session_id = session_id_from(&jar).ok_or(ApiError::SessionInvalid)?;
    let auth = resolve_session(&state, &session_id).await?;
    request.extensions_mut().insert(auth);
    Ok(next.run(request).await)
}

/// Bind the session if there is a live one, otherwise continue anonymously
pub async fn optional_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(session_id) = session_id_from(&jar) {
        match resolve_session(&state, &session_id).await {
            Ok(auth) => {
                request.extensions_mut().insert(auth);
            }
            Err(ApiError::Unexpected) => return Err(ApiError::Unexpected),
            Err(_) => {}
        }
    }
    Ok(next.run(request).await)
}

/// Route layer for endpoints that need a role. Runs inside `require_session`.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let auth = request
        .extensions()
        .get::<AuthSession>()
        .ok_or(ApiError::SessionInvalid)?;
    if !auth.has_role(ADMIN_ROLE) {
        tracing::warn!(user_id = %auth.principal_id, path = %request.uri().path(), "Admin role required");
        return Err(ApiError::Forbidden);
    }
    Ok(next.run(request).await)
}

pub const ADMIN_ROLE: &str = "ADMIN";
