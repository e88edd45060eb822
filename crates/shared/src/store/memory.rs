//! In-process store
//!
//! One mutex covers principals and tokens together, so a redemption is a single
//! critical section over both.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use super::{PrincipalStore, RedeemOutcome, Redemption, TokenStore};
use crate::error::StoreError;
use crate::types::{Principal, PrincipalId, ResetToken};

#[derive(Default)]
struct MemoryState {
    principals: HashMap<PrincipalId, Principal>,
    tokens: HashMap<Uuid, ResetToken>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a principal (used to model user deletion by the owning service)
    pub fn delete_principal(&self, id: PrincipalId) -> Result<bool, StoreError> {
        let mut state = self.state.lock().map_err(|_| StoreError::poisoned())?;
        Ok(state.principals.remove(&id).is_some())
    }

    pub fn token_count(&self) -> usize {
        self.state.lock().map(|s| s.tokens.len()).unwrap_or(0)
    }
}

#[async_trait]
impl PrincipalStore for MemoryStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<Principal>, StoreError> {
        let state = self.state.lock().map_err(|_| StoreError::poisoned())?;
        Ok(state
            .principals
            .values()
            .find(|p| p.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn find_by_identity(&self, identity: &str) -> Result<Option<Principal>, StoreError> {
        let state = self.state.lock().map_err(|_| StoreError::poisoned())?;
        Ok(state
            .principals
            .values()
            .find(|p| p.matches_identity(identity))
            .cloned())
    }

    async fn find_by_id(&self, id: PrincipalId) -> Result<Option<Principal>, StoreError> {
        let state = self.state.lock().map_err(|_| StoreError::poisoned())?;
        Ok(state.principals.get(&id).cloned())
    }

    async fn insert_principal(&self, principal: Principal) -> Result<(), StoreError> {
        let mut state = self.state.lock().map_err(|_| StoreError::poisoned())?;
        // Either identifier of the newcomer must not resolve to someone else, or
        // `find_by_identity` would become ambiguous.
        let clash = state.principals.values().any(|p| {
            p.id != principal.id
                && (p.matches_identity(&principal.username) || p.matches_identity(&principal.email))
        });
        if clash {
            return Err(StoreError::Conflict(format!(
                "principal '{}' already exists",
                principal.username
            )));
        }
        state.principals.insert(principal.id, principal);
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.state.lock().map(|_| ()).map_err(|_| StoreError::poisoned())
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn insert_token(&self, token: ResetToken) -> Result<(), StoreError> {
        let mut state = self.state.lock().map_err(|_| StoreError::poisoned())?;
        if state.tokens.contains_key(&token.id) {
            return Err(StoreError::Conflict(format!("token {} already exists", token.id)));
        }
        state.tokens.insert(token.id, token);
        Ok(())
    }

    async fn find_token(&self, id: Uuid) -> Result<Option<ResetToken>, StoreError> {
        let state = self.state.lock().map_err(|_| StoreError::poisoned())?;
        Ok(state.tokens.get(&id).cloned())
    }

    async fn redeem_token(&self, r: Redemption<'_>) -> Result<RedeemOutcome, StoreError> {
        let mut guard = self.state.lock().map_err(|_| StoreError::poisoned())?;
        let state = &mut *guard;

        let Some(token) = state.tokens.get_mut(&r.token_id) else {
            return Ok(RedeemOutcome::Rejected);
        };
        if !token.is_live(r.now) || token.secret_hash != r.secret_hash {
            return Ok(RedeemOutcome::Rejected);
        }
        let Some(principal) = state.principals.get_mut(&token.principal_id) else {
            return Ok(RedeemOutcome::PrincipalMissing);
        };

        token.used_at = Some(r.now);
        principal.password_hash = r.new_password_hash.to_string();
        principal.audit.record_update(r.now, r.actor);

        Ok(RedeemOutcome::Redeemed {
            principal_id: principal.id,
        })
    }
}
