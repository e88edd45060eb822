//! Postgres-backed store

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{PrincipalStore, RedeemOutcome, Redemption, TokenStore};
use crate::error::StoreError;
use crate::types::{AuditStamp, Principal, PrincipalId, ResetToken};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct PrincipalRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    roles: Vec<String>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
    updated_by: Option<String>,
}

impl From<PrincipalRow> for Principal {
    fn from(row: PrincipalRow) -> Self {
        Principal {
            id: PrincipalId(row.id),
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            roles: row.roles,
            audit: AuditStamp {
                created_at: row.created_at,
                updated_at: row.updated_at,
                updated_by: row.updated_by,
            },
        }
    }
}

#[derive(FromRow)]
struct TokenRow {
    id: Uuid,
    principal_id: Uuid,
    secret_hash: String,
    expires_at: OffsetDateTime,
    used_at: Option<OffsetDateTime>,
    issued_ip: Option<String>,
    issued_user_agent: Option<String>,
    created_at: OffsetDateTime,
}

impl From<TokenRow> for ResetToken {
    fn from(row: TokenRow) -> Self {
        ResetToken {
            id: row.id,
            principal_id: PrincipalId(row.principal_id),
            secret_hash: row.secret_hash,
            expires_at: row.expires_at,
            used_at: row.used_at,
            issued_ip: row.issued_ip,
            issued_user_agent: row.issued_user_agent,
            created_at: row.created_at,
        }
    }
}

const PRINCIPAL_COLUMNS: &str =
    "id, username, email, password_hash, roles, created_at, updated_at, updated_by";

#[async_trait]
impl PrincipalStore for PgStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<Principal>, StoreError> {
        let row: Option<PrincipalRow> = sqlx::query_as(&format!(
            "SELECT {PRINCIPAL_COLUMNS} FROM principals WHERE lower(username) = lower($1)"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Principal::from))
    }

    async fn find_by_identity(&self, identity: &str) -> Result<Option<Principal>, StoreError> {
        let row: Option<PrincipalRow> = sqlx::query_as(&format!(
            r#"
            SELECT {PRINCIPAL_COLUMNS} FROM principals
            WHERE lower(username) = lower($1) OR lower(email) = lower($1)
            LIMIT 1
            "#
        ))
        .bind(identity)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Principal::from))
    }

    async fn find_by_id(&self, id: PrincipalId) -> Result<Option<Principal>, StoreError> {
        let row: Option<PrincipalRow> = sqlx::query_as(&format!(
            "SELECT {PRINCIPAL_COLUMNS} FROM principals WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Principal::from))
    }

    async fn insert_principal(&self, principal: Principal) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO principals (id, username, email, password_hash, roles, created_at, updated_at, updated_by)
            SELECT $1, $2, $3, $4, $5, $6, $7, $8
            WHERE NOT EXISTS (
                SELECT 1 FROM principals
                WHERE lower(username) IN (lower($2), lower($3))
                   OR lower(email) IN (lower($2), lower($3))
            )
            "#,
        )
        .bind(principal.id.0)
        .bind(&principal.username)
        .bind(&principal.email)
        .bind(&principal.password_hash)
        .bind(&principal.roles)
        .bind(principal.audit.created_at)
        .bind(principal.audit.updated_at)
        .bind(&principal.audit.updated_by)
        .execute(&self.pool)
        .await;

        let conflict = || {
            StoreError::Conflict(format!("principal '{}' already exists", principal.username))
        };

        match result {
            Ok(done) if done.rows_affected() == 1 => Ok(()),
            // Username or email already names another principal
            Ok(_) => Err(conflict()),
            // PostgreSQL unique violation
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23505") => {
                tracing::warn!(
                    user_id = %principal.id,
                    constraint = db_err.constraint().unwrap_or("unknown"),
                    "Principal insert rejected by unique constraint"
                );
                Err(conflict())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl TokenStore for PgStore {
    async fn insert_token(&self, token: ResetToken) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO password_reset_tokens
                (id, principal_id, secret_hash, expires_at, used_at, issued_ip, issued_user_agent, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(token.id)
        .bind(token.principal_id.0)
        .bind(&token.secret_hash)
        .bind(token.expires_at)
        .bind(token.used_at)
        .bind(&token.issued_ip)
        .bind(&token.issued_user_agent)
        .bind(token.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_token(&self, id: Uuid) -> Result<Option<ResetToken>, StoreError> {
        let row: Option<TokenRow> = sqlx::query_as(
            r#"
            SELECT id, principal_id, secret_hash, expires_at, used_at, issued_ip, issued_user_agent, created_at
            FROM password_reset_tokens
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ResetToken::from))
    }

    async fn redeem_token(&self, r: Redemption<'_>) -> Result<RedeemOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        // The WHERE guard is the check-and-set: a concurrent redeemer blocks on the
        // row lock and then sees used_at already set.
        let principal_id: Option<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE password_reset_tokens
            SET used_at = $3
            WHERE id = $1 AND secret_hash = $2 AND used_at IS NULL AND expires_at > $3
            RETURNING principal_id
            "#,
        )
        .bind(r.token_id)
        .bind(r.secret_hash)
        .bind(r.now)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(principal_id) = principal_id else {
            tx.rollback().await?;
            return Ok(RedeemOutcome::Rejected);
        };

        let updated = sqlx::query(
            r#"
            UPDATE principals
            SET password_hash = $1, updated_at = $2, updated_by = $3
            WHERE id = $4
            "#,
        )
        .bind(r.new_password_hash)
        .bind(r.now)
        .bind(r.actor)
        .bind(principal_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(RedeemOutcome::PrincipalMissing);
        }

        tx.commit().await?;

        Ok(RedeemOutcome::Redeemed {
            principal_id: PrincipalId(principal_id),
        })
    }
}
