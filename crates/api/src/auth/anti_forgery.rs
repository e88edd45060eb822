//! Anti-forgery (double-submit) tokens bound to the session lifetime
//!
//! Requests that carry a live session get a token generated on demand and
//! mirrored into the `XSRF-TOKEN` cookie. Mutating requests must echo it back in
//! the `X-XSRF-TOKEN` header.

use axum::{
    extract::{Request, State},
    http::{header::SET_COOKIE, HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;
use subtle::ConstantTimeEq;

use super::context::AuthSession;
use super::cookies::{anti_forgery_cookie, anti_forgery_from, ANTI_FORGERY_COOKIE, ANTI_FORGERY_HEADER};
use super::registry::{SessionId, SessionRegistry, SessionStatus, TokenLookup};
use crate::audit_constants::{event_type, session_event};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub struct AntiForgeryCoordinator {
    registry: Arc<SessionRegistry>,
}

impl AntiForgeryCoordinator {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Token for a live session, generated if absent.
    ///
    /// A session ended by a newer login fails as `SessionExpiredConcurrent`,
    /// any other ended or unknown session as `SessionInvalid`.
    pub async fn ensure(&self, session_id: &SessionId) -> ApiResult<String> {
        match self.registry.ensure_anti_forgery(session_id).await {
            TokenLookup::Issued(token) => Ok(token),
            TokenLookup::Ended(SessionStatus::ExpiredConcurrent) => {
                Err(ApiError::SessionExpiredConcurrent)
            }
            TokenLookup::Ended(_) | TokenLookup::Unknown => Err(ApiError::SessionInvalid),
        }
    }

    pub fn verify(expected: &str, presented: Option<&str>) -> ApiResult<()> {
        match presented {
            Some(presented) if bool::from(presented.as_bytes().ct_eq(expected.as_bytes())) => Ok(()),
            _ => Err(ApiError::AntiForgeryFailed),
        }
    }
}

pub fn is_mutating(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

fn response_sets_cookie(response: &Response, name: &str) -> bool {
    let prefix = format!("{name}=");
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with(&prefix))
}

/// Runs after the session middleware. Requests without a live session pass through.
pub async fn anti_forgery(
    State(state): State<AppState>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(auth) = request.extensions().get::<AuthSession>() else {
        return Ok(next.run(request).await);
    };
    let session_id = auth.session.session_id.clone();
    let principal_id = auth.principal_id;

    // Ended between the session check and here, e.g. by a concurrent login
    let expected = state.anti_forgery.ensure(&session_id).await?;

    if is_mutating(request.method()) {
        let presented = request
            .headers()
            .get(ANTI_FORGERY_HEADER)
            .and_then(|v| v.to_str().ok());
        if let Err(err) = AntiForgeryCoordinator::verify(&expected, presented) {
            tracing::warn!(
                event = session_event::ANTI_FORGERY_FAILED,
                event_type = event_type::SESSION,
                user_id = %principal_id,
                method = %request.method(),
                path = %request.uri().path(),
                header_present = presented.is_some(),
                "Anti-forgery check failed"
            );
            return Err(err);
        }
    }

    let cookie_current = anti_forgery_from(&jar).is_some_and(|v| v == expected);
    let mut response = next.run(request).await;

    // A handler that already set or cleared the cookie (logout) has the last word
    if !cookie_current && !response_sets_cookie(&response, ANTI_FORGERY_COOKIE) {
        let cookie = anti_forgery_cookie(&expected, state.config.cookie_secure);
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => tracing::error!(error = %e, "Could not encode anti-forgery cookie"),
        }
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_requires_exact_match() {
        assert!(AntiForgeryCoordinator::verify("abc", Some("abc")).is_ok());
        assert!(matches!(
            AntiForgeryCoordinator::verify("abc", Some("abd")),
            Err(ApiError::AntiForgeryFailed)
        ));
        assert!(AntiForgeryCoordinator::verify("abc", Some("ab")).is_err());
        assert!(AntiForgeryCoordinator::verify("abc", None).is_err());
    }

    #[tokio::test]
    async fn test_ensure_keeps_superseded_distinct_from_invalid() {
        use crate::auth::{RequestContext, SessionRecord};
        use time::Duration;
        use warden_shared::{ManualClock, PrincipalId};

        let registry = Arc::new(SessionRegistry::new(
            Arc::new(ManualClock::starting_now()),
            Duration::hours(24),
        ));
        let coordinator = AntiForgeryCoordinator::new(registry.clone());
        let alice = PrincipalId::new();
        let ctx = RequestContext::default();

        let first = SessionRecord::new(alice, registry.now(), Duration::hours(24), &ctx);
        let first_id = first.session_id.clone();
        registry.register_exclusive(first).await;
        assert!(coordinator.ensure(&first_id).await.is_ok());

        // A newer login lands after the session check but before the token lookup
        let second = SessionRecord::new(alice, registry.now(), Duration::hours(24), &ctx);
        let second_id = second.session_id.clone();
        registry.register_exclusive(second).await;
        assert!(matches!(
            coordinator.ensure(&first_id).await,
            Err(ApiError::SessionExpiredConcurrent)
        ));

        registry.remove(&second_id).await;
        assert!(matches!(
            coordinator.ensure(&second_id).await,
            Err(ApiError::SessionInvalid)
        ));
    }

    #[test]
    fn test_mutating_methods() {
        assert!(is_mutating(&Method::POST));
        assert!(is_mutating(&Method::PATCH));
        assert!(is_mutating(&Method::DELETE));
        assert!(is_mutating(&Method::PUT));
        assert!(!is_mutating(&Method::GET));
        assert!(!is_mutating(&Method::HEAD));
        assert!(!is_mutating(&Method::OPTIONS));
    }
}
