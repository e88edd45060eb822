//! Common types used across Warden

use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// ID Wrappers
// =============================================================================

/// Principal (user) ID wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(pub Uuid);

impl PrincipalId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PrincipalId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for PrincipalId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// =============================================================================
// Audit
// =============================================================================

/// Audit fields embedded in mutable records.
///
/// Populated by whichever component performs the write, never implicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditStamp {
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub updated_by: Option<String>,
}

impl AuditStamp {
    pub fn created(now: OffsetDateTime, actor: Option<&str>) -> Self {
        Self {
            created_at: now,
            updated_at: now,
            updated_by: actor.map(str::to_string),
        }
    }

    pub fn record_update(&mut self, now: OffsetDateTime, actor: &str) {
        self.updated_at = now;
        self.updated_by = Some(actor.to_string());
    }
}

// =============================================================================
// Principal
// =============================================================================

/// An authenticatable user, owned by the user-management side of the platform.
#[derive(Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: PrincipalId,
    pub username: String,
    pub email: String,
    /// Argon2 PHC string
    pub password_hash: String,
    pub roles: Vec<String>,
    pub audit: AuditStamp,
}

impl Principal {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }

    /// Matches either the username or the email address, case-insensitively
    pub fn matches_identity(&self, identity: &str) -> bool {
        self.username.eq_ignore_ascii_case(identity) || self.email.eq_ignore_ascii_case(identity)
    }
}

// Keeps the hash out of logs and panic messages.
impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Principal")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("roles", &self.roles)
            .field("audit", &self.audit)
            .finish()
    }
}

// =============================================================================
// Password Reset Tokens
// =============================================================================

/// Persisted password-reset grant. Only the SHA-256 of the secret is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetToken {
    pub id: Uuid,
    pub principal_id: PrincipalId,
    pub secret_hash: String,
    pub expires_at: OffsetDateTime,
    pub used_at: Option<OffsetDateTime>,
    pub issued_ip: Option<String>,
    pub issued_user_agent: Option<String>,
    pub created_at: OffsetDateTime,
}

impl ResetToken {
    /// Unused and strictly before its deadline
    pub fn is_live(&self, now: OffsetDateTime) -> bool {
        self.used_at.is_none() && self.expires_at > now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn principal() -> Principal {
        Principal {
            id: PrincipalId::new(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "$argon2id$v=19$m=8,t=1,p=1$c2FsdHNhbHQ$aGFzaA".to_string(),
            roles: vec!["USER".to_string(), "ADMIN".to_string()],
            audit: AuditStamp::created(datetime!(2024-01-01 00:00 UTC), None),
        }
    }

    #[test]
    fn test_principal_debug_redacts_hash() {
        let rendered = format!("{:?}", principal());
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("argon2id"));
    }

    #[test]
    fn test_identity_matching() {
        let p = principal();
        assert!(p.matches_identity("ALICE"));
        assert!(p.matches_identity("Alice@Example.com"));
        assert!(!p.matches_identity("bob"));
        assert!(p.has_role("admin"));
        assert!(!p.has_role("auditor"));
    }

    #[test]
    fn test_reset_token_liveness() {
        let token = ResetToken {
            id: Uuid::new_v4(),
            principal_id: PrincipalId::new(),
            secret_hash: "ab".repeat(32),
            expires_at: datetime!(2024-01-01 00:30 UTC),
            used_at: None,
            issued_ip: None,
            issued_user_agent: None,
            created_at: datetime!(2024-01-01 00:00 UTC),
        };
        assert!(token.is_live(datetime!(2024-01-01 00:29:59 UTC)));
        assert!(!token.is_live(datetime!(2024-01-01 00:30 UTC)));

        let used = ResetToken {
            used_at: Some(datetime!(2024-01-01 00:10 UTC)),
            ..token
        };
        assert!(!used.is_live(datetime!(2024-01-01 00:11 UTC)));
    }

    #[test]
    fn test_audit_stamp_update() {
        let mut stamp = AuditStamp::created(datetime!(2024-01-01 00:00 UTC), Some("seed"));
        stamp.record_update(datetime!(2024-02-01 00:00 UTC), "password-reset");
        assert_eq!(stamp.created_at, datetime!(2024-01-01 00:00 UTC));
        assert_eq!(stamp.updated_at, datetime!(2024-02-01 00:00 UTC));
        assert_eq!(stamp.updated_by.as_deref(), Some("password-reset"));
    }
}
