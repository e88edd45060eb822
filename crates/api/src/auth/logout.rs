//! Logout teardown

use std::sync::Arc;

use super::context::{AuthSession, RequestContext};
use super::registry::{SessionId, SessionRecord, SessionRegistry};
use crate::audit_constants::{auth_event, event_type};

pub struct LogoutCoordinator {
    registry: Arc<SessionRegistry>,
}

impl LogoutCoordinator {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Remove the session and drop the bound security context.
    ///
    /// Succeeds whether or not a session was present. Returns the removed record,
    /// if any, with status LOGGED_OUT.
    pub async fn logout(
        &self,
        session_id: Option<&SessionId>,
        auth: Option<AuthSession>,
        ctx: &RequestContext,
    ) -> Option<SessionRecord> {
        // The context is request-scoped; consuming it here ends its use.
        drop(auth);

        let removed = match session_id {
            Some(id) => self.registry.remove(id).await,
            None => None,
        };

        match &removed {
            Some(record) => tracing::info!(
                event = auth_event::LOGOUT_SUCCESS,
                event_type = event_type::AUTHENTICATION,
                user_id = %record.principal_id,
                session = record.session_id.short(),
                ip = ?ctx.ip_address,
                "Logged out"
            ),
            None => tracing::debug!("Logout without a known session"),
        }

        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::registry::{SessionStatus, Touch};
    use time::Duration;
    use warden_shared::{ManualClock, PrincipalId};

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let registry = Arc::new(SessionRegistry::new(
            Arc::new(ManualClock::starting_now()),
            Duration::hours(24),
        ));
        let coordinator = LogoutCoordinator::new(registry.clone());
        let ctx = RequestContext::default();

        let record = SessionRecord::new(PrincipalId::new(), registry.now(), Duration::hours(24), &ctx);
        let id = record.session_id.clone();
        registry.register_exclusive(record).await;

        let removed = coordinator.logout(Some(&id), None, &ctx).await.unwrap();
        assert_eq!(removed.status, SessionStatus::LoggedOut);
        assert!(matches!(registry.touch(&id).await, Touch::Unknown));

        assert!(coordinator.logout(Some(&id), None, &ctx).await.is_none());
        assert!(coordinator.logout(None, None, &ctx).await.is_none());
    }
}
