//! Password-reset tokens
//!
//! A token is a random UUID plus a 256-bit secret. Only the SHA-256 of the secret
//! is stored; the secret itself travels once, inside the reset link. Redemption
//! is a single conditional update in the token store, so a token can change a
//! password at most once.

use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use time::Duration;
use uuid::Uuid;
use warden_shared::{Clock, PrincipalId, PrincipalStore, RedeemOutcome, Redemption, ResetToken, TokenStore};

use super::context::RequestContext;
use super::password::{hash_password_blocking, validate_password_strength, HashingParams};
use super::validation::validate_identity;
use crate::audit_constants::{auth_event, event_type};
use crate::email::{ResetMail, ResetMailer};
use crate::error::{ApiError, ApiResult};

/// Recorded in the principal's audit stamp on redemption
pub const RESET_ACTOR: &str = "password-reset";

/// Random secret, hex encoded
fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn hash_secret(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

fn parse_token_id(token_id: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(token_id.trim()).map_err(|_| ApiError::TokenExpiredOrInvalid)
}

pub struct ResetTokenManager {
    principals: Arc<dyn PrincipalStore>,
    tokens: Arc<dyn TokenStore>,
    mailer: Arc<dyn ResetMailer>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    hashing: HashingParams,
}

impl ResetTokenManager {
    pub fn new(
        principals: Arc<dyn PrincipalStore>,
        tokens: Arc<dyn TokenStore>,
        mailer: Arc<dyn ResetMailer>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
        hashing: HashingParams,
    ) -> Self {
        Self {
            principals,
            tokens,
            mailer,
            clock,
            ttl,
            hashing,
        }
    }

    /// Issue a token for the principal matching `identity` (username or email)
    /// and hand it to the mailer.
    ///
    /// An unknown identity is not an error. Returns the new token id, if any.
    pub async fn issue(&self, identity: &str, ctx: &RequestContext) -> ApiResult<Option<Uuid>> {
        validate_identity(identity)?;

        let Some(principal) = self.principals.find_by_identity(identity.trim()).await? else {
            tracing::info!(
                event = auth_event::PASSWORD_RESET_UNKNOWN_IDENTITY,
                ip = ?ctx.ip_address,
                "Password reset requested for unknown identity"
            );
            return Ok(None);
        };

        let now = self.clock.now();
        let secret = generate_secret();
        let token = ResetToken {
            id: Uuid::new_v4(),
            principal_id: principal.id,
            secret_hash: hash_secret(&secret),
            expires_at: now + self.ttl,
            used_at: None,
            issued_ip: ctx.ip_address.clone(),
            issued_user_agent: ctx.user_agent.clone(),
            created_at: now,
        };
        let token_id = token.id;
        self.tokens.insert_token(token).await?;

        tracing::info!(
            event = auth_event::PASSWORD_RESET_REQUESTED,
            event_type = event_type::AUTHENTICATION,
            user_id = %principal.id,
            token_id = %token_id,
            ip = ?ctx.ip_address,
            "Password reset token issued"
        );

        let mailer = Arc::clone(&self.mailer);
        let mail = ResetMail {
            to: principal.email,
            username: principal.username,
            token_id,
            secret,
            valid_for: self.ttl,
        };
        tokio::spawn(async move {
            mailer.send_password_reset(mail).await;
        });

        Ok(Some(token_id))
    }

    /// Check a token without redeeming it
    pub async fn verify_only(&self, token_id: &str, secret: &str) -> ApiResult<()> {
        let id = parse_token_id(token_id)?;
        let token = self.tokens.find_token(id).await?;

        let valid = token.is_some_and(|t| {
            let hash_matches: bool = hash_secret(secret)
                .as_bytes()
                .ct_eq(t.secret_hash.as_bytes())
                .into();
            hash_matches && t.is_live(self.clock.now())
        });

        if valid {
            Ok(())
        } else {
            tracing::info!(
                event = auth_event::PASSWORD_RESET_REJECTED,
                token_id = %id,
                "Reset token failed verification"
            );
            Err(ApiError::TokenExpiredOrInvalid)
        }
    }

    /// Redeem the token and replace the principal's password.
    pub async fn consume(
        &self,
        token_id: &str,
        secret: &str,
        new_password: &str,
        ctx: &RequestContext,
    ) -> ApiResult<PrincipalId> {
        validate_password_strength(new_password).map_err(|e| ApiError::Validation(e.to_string()))?;
        let id = parse_token_id(token_id)?;

        let secret_hash = hash_secret(secret);
        let new_password_hash =
            hash_password_blocking(new_password.to_string(), self.hashing).await?;

        let outcome = self
            .tokens
            .redeem_token(Redemption {
                token_id: id,
                secret_hash: &secret_hash,
                new_password_hash: &new_password_hash,
                now: self.clock.now(),
                actor: RESET_ACTOR,
            })
            .await?;

        match outcome {
            RedeemOutcome::Redeemed { principal_id } => {
                tracing::info!(
                    event = auth_event::PASSWORD_RESET_COMPLETED,
                    event_type = event_type::AUTHENTICATION,
                    user_id = %principal_id,
                    token_id = %id,
                    ip = ?ctx.ip_address,
                    "Password reset completed"
                );
                self.notify_changed(principal_id, ctx.ip_address.clone());
                Ok(principal_id)
            }
            RedeemOutcome::PrincipalMissing => {
                tracing::warn!(token_id = %id, "Reset token belongs to a deleted principal");
                Err(ApiError::PrincipalNotFound)
            }
            RedeemOutcome::Rejected => {
                tracing::info!(
                    event = auth_event::PASSWORD_RESET_REJECTED,
                    token_id = %id,
                    "Reset token rejected on consume"
                );
                Err(ApiError::TokenExpiredOrInvalid)
            }
        }
    }

    fn notify_changed(&self, principal_id: PrincipalId, ip_address: Option<String>) {
        let principals = Arc::clone(&self.principals);
        let mailer = Arc::clone(&self.mailer);
        tokio::spawn(async move {
            match principals.find_by_id(principal_id).await {
                Ok(Some(principal)) => {
                    mailer
                        .send_password_changed(&principal.email, ip_address.as_deref())
                        .await
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "Could not load principal for notice"),
            }
        });
    }
}
