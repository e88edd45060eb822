//! Shared application state

use std::sync::Arc;
use warden_shared::{Clock, PrincipalStore, TokenStore};

use crate::auth::{
    password::PasswordError, AntiForgeryCoordinator, AuthenticationCoordinator, CredentialVerifier,
    LogoutCoordinator, ResetTokenManager, SessionInventory, SessionRegistry,
};
use crate::config::Config;
use crate::email::ResetMailer;

/// Everything handlers and middleware need, cloned per request
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub principals: Arc<dyn PrincipalStore>,
    pub registry: Arc<SessionRegistry>,
    pub authenticator: Arc<AuthenticationCoordinator>,
    pub logout: Arc<LogoutCoordinator>,
    pub resets: Arc<ResetTokenManager>,
    pub anti_forgery: Arc<AntiForgeryCoordinator>,
    pub inventory: Arc<SessionInventory>,
}

/// Collaborators supplied by the binary (or a test)
pub struct Collaborators {
    pub principals: Arc<dyn PrincipalStore>,
    pub tokens: Arc<dyn TokenStore>,
    pub mailer: Arc<dyn ResetMailer>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Wire the components. Fails only if the hashing parameters are unusable.
    pub fn build(config: Config, deps: Collaborators) -> Result<Self, PasswordError> {
        let Collaborators {
            principals,
            tokens,
            mailer,
            clock,
        } = deps;

        let registry = Arc::new(SessionRegistry::new(
            Arc::clone(&clock),
            config.session_max_inactivity,
        ));
        let verifier = CredentialVerifier::new(Arc::clone(&principals), config.hashing)?;

        let resets = ResetTokenManager::new(
            Arc::clone(&principals),
            tokens,
            mailer,
            clock,
            config.reset_token_ttl,
            config.hashing,
        );

        Ok(Self {
            authenticator: Arc::new(AuthenticationCoordinator::new(verifier, Arc::clone(&registry))),
            logout: Arc::new(LogoutCoordinator::new(Arc::clone(&registry))),
            resets: Arc::new(resets),
            anti_forgery: Arc::new(AntiForgeryCoordinator::new(Arc::clone(&registry))),
            inventory: Arc::new(SessionInventory::new(
                Arc::clone(&registry),
                Arc::clone(&principals),
                config.display_offset,
            )),
            config: Arc::new(config),
            principals,
            registry,
        })
    }
}
