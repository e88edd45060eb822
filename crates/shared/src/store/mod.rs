//! Persistence seams for principals and password-reset tokens
//!
//! Two implementations: [`MemoryStore`] for single-process deployments and tests,
//! and [`PgStore`] backed by Postgres.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::StoreError;
use crate::types::{Principal, PrincipalId, ResetToken};

/// Read access to principals, plus the single write the reset flow needs.
#[async_trait]
pub trait PrincipalStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<Principal>, StoreError>;

    /// Username or email
    async fn find_by_identity(&self, identity: &str) -> Result<Option<Principal>, StoreError>;

    async fn find_by_id(&self, id: PrincipalId) -> Result<Option<Principal>, StoreError>;

    async fn insert_principal(&self, principal: Principal) -> Result<(), StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Arguments for [`TokenStore::redeem_token`]
#[derive(Debug, Clone, Copy)]
pub struct Redemption<'a> {
    pub token_id: Uuid,
    pub secret_hash: &'a str,
    pub new_password_hash: &'a str,
    pub now: OffsetDateTime,
    pub actor: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedeemOutcome {
    /// Token marked used and the principal's password replaced
    Redeemed { principal_id: PrincipalId },
    /// Unknown, wrong secret, already used or expired. Nothing changed.
    Rejected,
    /// Token was redeemable but its principal is gone. Nothing changed.
    PrincipalMissing,
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn insert_token(&self, token: ResetToken) -> Result<(), StoreError>;

    async fn find_token(&self, id: Uuid) -> Result<Option<ResetToken>, StoreError>;

    /// Atomically: if the token is unused, unexpired at `now` and its hash matches,
    /// set `used_at = now` and replace the owning principal's password hash.
    async fn redeem_token(&self, redemption: Redemption<'_>) -> Result<RedeemOutcome, StoreError>;
}
