//! Login: verify credentials, then replace the principal's sessions with a new one

use std::sync::Arc;
use time::OffsetDateTime;
use warden_shared::PrincipalId;

use super::context::RequestContext;
use super::credentials::CredentialVerifier;
use super::registry::{random_token, SessionId, SessionRecord, SessionRegistry};
use super::validation::{validate_login_password, validate_username};
use crate::audit_constants::{auth_event, event_type, session_event};
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone)]
pub struct LoginResult {
    pub principal_id: PrincipalId,
    pub username: String,
    pub session_id: SessionId,
    pub anti_forgery_token: String,
    pub expires_at: OffsetDateTime,
}

pub struct AuthenticationCoordinator {
    verifier: CredentialVerifier,
    registry: Arc<SessionRegistry>,
}

impl AuthenticationCoordinator {
    pub fn new(verifier: CredentialVerifier, registry: Arc<SessionRegistry>) -> Self {
        Self { verifier, registry }
    }

    pub async fn login(
        &self,
        username: &str,
        password: &str,
        ctx: &RequestContext,
    ) -> ApiResult<LoginResult> {
        validate_username(username)?;
        validate_login_password(password)?;

        let principal = match self.verifier.verify(username, password).await {
            Ok(principal) => principal,
            Err(err) => {
                if matches!(err, ApiError::InvalidCredentials) {
                    tracing::warn!(
                        event = auth_event::LOGIN_FAILED,
                        event_type = event_type::AUTHENTICATION,
                        ip = ?ctx.ip_address,
                        "Login failed"
                    );
                }
                return Err(err);
            }
        };

        let mut record = SessionRecord::new(
            principal.id,
            self.registry.now(),
            self.registry.max_inactivity(),
            ctx,
        );
        // Issued up front so the client can call mutating endpoints (logout) immediately
        let anti_forgery_token = random_token();
        record.anti_forgery_token = Some(anti_forgery_token.clone());

        let session_id = record.session_id.clone();
        let expires_at = record.expires_at;
        let superseded = self.registry.register_exclusive(record).await;

        if !superseded.is_empty() {
            tracing::info!(
                event = session_event::SUPERSEDED,
                event_type = event_type::SESSION,
                user_id = %principal.id,
                count = superseded.len(),
                "Ended older sessions after new login"
            );
        }

        tracing::info!(
            event = auth_event::LOGIN_SUCCESS,
            event_type = event_type::AUTHENTICATION,
            user_id = %principal.id,
            session = session_id.short(),
            ip = ?ctx.ip_address,
            "Login succeeded"
        );

        Ok(LoginResult {
            principal_id: principal.id,
            username: principal.username,
            session_id,
            anti_forgery_token,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::{hash_password, TEST_PARAMS};
    use crate::auth::registry::{SessionStatus, Touch};
    use time::Duration;
    use warden_shared::{AuditStamp, ManualClock, MemoryStore, Principal, PrincipalStore};

    const PASSWORD: &str = "Correct-Horse-9-Battery";

    async fn coordinator() -> (Arc<SessionRegistry>, AuthenticationCoordinator) {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_principal(Principal {
                id: PrincipalId::new(),
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                password_hash: hash_password(PASSWORD, TEST_PARAMS).unwrap(),
                roles: vec!["USER".to_string()],
                audit: AuditStamp::created(OffsetDateTime::now_utc(), None),
            })
            .await
            .unwrap();

        let clock = Arc::new(ManualClock::starting_now());
        let registry = Arc::new(SessionRegistry::new(clock, Duration::hours(24)));
        let verifier = CredentialVerifier::new(store, TEST_PARAMS).unwrap();
        (registry.clone(), AuthenticationCoordinator::new(verifier, registry))
    }

    #[tokio::test]
    async fn test_login_registers_active_session_with_token() {
        let (registry, coordinator) = coordinator().await;
        let result = coordinator
            .login("alice", PASSWORD, &RequestContext::default())
            .await
            .unwrap();

        let record = registry.get(&result.session_id).await.unwrap();
        assert_eq!(record.status, SessionStatus::Active);
        assert_eq!(record.anti_forgery_token.as_deref(), Some(result.anti_forgery_token.as_str()));
        assert_eq!(result.expires_at, record.created_at + Duration::hours(24));
    }

    #[tokio::test]
    async fn test_second_login_supersedes_first() {
        let (registry, coordinator) = coordinator().await;
        let ctx = RequestContext::default();
        let first = coordinator.login("alice", PASSWORD, &ctx).await.unwrap();
        let second = coordinator.login("ALICE", PASSWORD, &ctx).await.unwrap();

        assert!(matches!(registry.touch(&first.session_id).await, Touch::Superseded));
        assert!(matches!(registry.touch(&second.session_id).await, Touch::Active(_)));
    }

    #[tokio::test]
    async fn test_failed_login_leaves_existing_session_alone() {
        let (registry, coordinator) = coordinator().await;
        let ctx = RequestContext::default();
        let first = coordinator.login("alice", PASSWORD, &ctx).await.unwrap();

        assert!(matches!(
            coordinator.login("alice", "wrong-password", &ctx).await,
            Err(ApiError::InvalidCredentials)
        ));
        assert!(matches!(registry.touch(&first.session_id).await, Touch::Active(_)));
    }

    #[tokio::test]
    async fn test_blank_fields_are_validation_errors() {
        let (_, coordinator) = coordinator().await;
        let ctx = RequestContext::default();
        assert!(matches!(
            coordinator.login("   ", PASSWORD, &ctx).await,
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            coordinator.login("alice", "", &ctx).await,
            Err(ApiError::Validation(_))
        ));
    }
}
