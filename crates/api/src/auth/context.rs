//! Per-request security context

use axum::http::{header::USER_AGENT, HeaderMap};
use warden_shared::PrincipalId;

use super::registry::SessionRecord;

/// Where a request came from, recorded on sessions and reset tokens for audit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            ip_address: extract_client_ip(headers),
            user_agent: headers
                .get(USER_AGENT)
                .and_then(|h| h.to_str().ok())
                .map(|s| s.chars().take(512).collect()),
        }
    }
}

/// Extract client IP address from request headers.
/// Checks common proxy headers in order of preference.
pub fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("cf-connecting-ip")
        .or_else(|| headers.get("x-real-ip"))
        .or_else(|| headers.get("x-forwarded-for"))
        .and_then(|h| h.to_str().ok())
        .map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Security context bound to a request that carries a live session.
///
/// Inserted as a request extension by the session middleware.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub session: SessionRecord,
    pub principal_id: PrincipalId,
    pub username: String,
    pub roles: Vec<String>,
}

impl AuthSession {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip_prefers_cloudflare_then_forwarded() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("198.51.100.7, 10.0.0.1"));
        assert_eq!(extract_client_ip(&headers).as_deref(), Some("198.51.100.7"));

        headers.insert("cf-connecting-ip", HeaderValue::from_static("203.0.113.5"));
        assert_eq!(extract_client_ip(&headers).as_deref(), Some("203.0.113.5"));
    }

    #[test]
    fn test_context_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("curl/8.4"));
        let ctx = RequestContext::from_headers(&headers);
        assert_eq!(ctx.ip_address, None);
        assert_eq!(ctx.user_agent.as_deref(), Some("curl/8.4"));
    }
}
