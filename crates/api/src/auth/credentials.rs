//! Username/password verification against stored Argon2 hashes

use std::sync::Arc;
use warden_shared::{Principal, PrincipalStore};

use super::password::{generate_impossible_hash, verify_password_blocking, HashingParams, PasswordError};
use crate::error::{ApiError, ApiResult};

pub struct CredentialVerifier {
    principals: Arc<dyn PrincipalStore>,
    /// Verified against when the username is unknown
    decoy_hash: String,
}

impl CredentialVerifier {
    pub fn new(principals: Arc<dyn PrincipalStore>, params: HashingParams) -> Result<Self, PasswordError> {
        Ok(Self {
            principals,
            decoy_hash: generate_impossible_hash(params)?,
        })
    }

    /// Unknown usernames and wrong passwords both fail with `InvalidCredentials`
    /// after one Argon2 verification.
    pub async fn verify(&self, username: &str, candidate: &str) -> ApiResult<Principal> {
        let principal = self.principals.find_by_username(username).await?;

        let hash = principal
            .as_ref()
            .map(|p| p.password_hash.clone())
            .unwrap_or_else(|| self.decoy_hash.clone());

        let matched = match verify_password_blocking(candidate.to_string(), hash).await {
            Ok(matched) => matched,
            Err(PasswordError::InvalidHash(e)) => {
                tracing::error!(
                    user_id = ?principal.as_ref().map(|p| p.id),
                    error = %e,
                    "Stored password hash is unreadable"
                );
                false
            }
            Err(e) => return Err(e.into()),
        };

        match principal {
            Some(principal) if matched => Ok(principal),
            _ => Err(ApiError::InvalidCredentials),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::{hash_password, TEST_PARAMS};
    use time::OffsetDateTime;
    use warden_shared::{AuditStamp, MemoryStore, PrincipalId};

    async fn verifier_with(username: &str, password_hash: String) -> CredentialVerifier {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_principal(Principal {
                id: PrincipalId::new(),
                username: username.to_string(),
                email: format!("{username}@example.com"),
                password_hash,
                roles: vec!["USER".to_string()],
                audit: AuditStamp::created(OffsetDateTime::now_utc(), None),
            })
            .await
            .unwrap();
        CredentialVerifier::new(store, TEST_PARAMS).unwrap()
    }

    #[tokio::test]
    async fn test_correct_password_returns_principal() {
        let verifier = verifier_with("alice", hash_password("Tr0ub4dor&3x!", TEST_PARAMS).unwrap()).await;
        let principal = verifier.verify("alice", "Tr0ub4dor&3x!").await.unwrap();
        assert_eq!(principal.username, "alice");
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_user_fail_alike() {
        let verifier = verifier_with("alice", hash_password("Tr0ub4dor&3x!", TEST_PARAMS).unwrap()).await;

        let wrong = verifier.verify("alice", "nope").await.unwrap_err();
        let unknown = verifier.verify("mallory", "Tr0ub4dor&3x!").await.unwrap_err();

        assert!(matches!(wrong, ApiError::InvalidCredentials));
        assert!(matches!(unknown, ApiError::InvalidCredentials));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn test_corrupt_stored_hash_is_rejected() {
        let verifier = verifier_with("alice", "plaintext-oops".to_string()).await;
        assert!(matches!(
            verifier.verify("alice", "plaintext-oops").await,
            Err(ApiError::InvalidCredentials)
        ));
    }
}
