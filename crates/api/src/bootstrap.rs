//! First-run seeding

use time::OffsetDateTime;
use warden_shared::{AuditStamp, Principal, PrincipalId, PrincipalStore, StoreError};

use crate::auth::ADMIN_ROLE;
use crate::config::BootstrapAdmin;

pub const BOOTSTRAP_ACTOR: &str = "bootstrap";

/// Insert the configured administrator unless the username is taken.
/// Returns true if a principal was created.
pub async fn seed_admin(
    principals: &dyn PrincipalStore,
    admin: &BootstrapAdmin,
    now: OffsetDateTime,
) -> Result<bool, StoreError> {
    if principals.find_by_username(&admin.username).await?.is_some() {
        return Ok(false);
    }

    let principal = Principal {
        id: PrincipalId::new(),
        username: admin.username.clone(),
        email: admin.email.clone(),
        password_hash: admin.password_hash.clone(),
        roles: vec![ADMIN_ROLE.to_string(), "USER".to_string()],
        audit: AuditStamp::created(now, Some(BOOTSTRAP_ACTOR)),
    };
    let id = principal.id;
    principals.insert_principal(principal).await?;
    tracing::info!(user_id = %id, username = %admin.username, "Seeded bootstrap administrator");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_shared::MemoryStore;

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let store = MemoryStore::new();
        let admin = BootstrapAdmin {
            username: "root".to_string(),
            email: "root@example.com".to_string(),
            password_hash: "$argon2id$v=19$m=64,t=1,p=1$c2FsdA$aGFzaA".to_string(),
        };
        let now = OffsetDateTime::now_utc();

        assert!(seed_admin(&store, &admin, now).await.unwrap());
        assert!(!seed_admin(&store, &admin, now).await.unwrap());

        let seeded = store.find_by_username("root").await.unwrap().unwrap();
        assert!(seeded.has_role(ADMIN_ROLE));
        assert_eq!(seeded.audit.updated_by.as_deref(), Some(BOOTSTRAP_ACTOR));
    }
}
