//! Session registry
//!
//! Single source of truth for who is logged in where. Sessions are grouped by
//! principal, with a session-id index for per-request lookups. Every operation
//! that reads and then writes a principal's sessions runs under one write guard,
//! which is what keeps a principal at no more than one ACTIVE session.
//!
//! Terminal sessions stay in the registry until [`SessionRegistry::sweep`] reaps
//! them, so a superseded cookie can still be told apart from an unknown one.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;
use warden_shared::{Clock, PrincipalId};

use super::context::RequestContext;

/// Opaque session identifier (256 random bits, URL-safe base64)
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(random_token())
    }

    /// Wrap a value presented by a client
    pub fn from_client(value: &str) -> Self {
        Self(value.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading characters only, for log lines
    pub fn short(&self) -> &str {
        let end = self.0.char_indices().nth(8).map(|(i, _)| i).unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({}…)", self.short())
    }
}

impl Serialize for SessionId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// 32 bytes from the OS RNG, URL-safe base64 without padding
pub(crate) fn random_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Active,
    ExpiredConcurrent,
    ExpiredTimeout,
    LoggedOut,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SessionStatus::Active)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Active => "ACTIVE",
            SessionStatus::ExpiredConcurrent => "EXPIRED_CONCURRENT",
            SessionStatus::ExpiredTimeout => "EXPIRED_TIMEOUT",
            SessionStatus::LoggedOut => "LOGGED_OUT",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub session_id: SessionId,
    pub principal_id: PrincipalId,
    pub created_at: OffsetDateTime,
    pub last_seen_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
    pub status: SessionStatus,
    pub anti_forgery_token: Option<String>,
    pub issued_ip: Option<String>,
    pub issued_user_agent: Option<String>,
}

impl SessionRecord {
    pub fn new(
        principal_id: PrincipalId,
        now: OffsetDateTime,
        max_inactivity: Duration,
        ctx: &RequestContext,
    ) -> Self {
        Self {
            session_id: SessionId::generate(),
            principal_id,
            created_at: now,
            last_seen_at: now,
            expires_at: now + max_inactivity,
            status: SessionStatus::Active,
            anti_forgery_token: None,
            issued_ip: ctx.ip_address.clone(),
            issued_user_agent: ctx.user_agent.clone(),
        }
    }

    /// Forward-only status change. Returns false if the record was already terminal.
    fn transition(&mut self, to: SessionStatus) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = to;
        true
    }
}

/// Result of [`SessionRegistry::touch`]
#[derive(Debug, Clone)]
pub enum Touch {
    /// Session is live; snapshot after the sliding window moved
    Active(SessionRecord),
    /// A newer login for the same principal ended this session
    Superseded,
    /// Inactivity window passed (possibly flipped by this call)
    TimedOut,
    /// Never issued, logged out, or already reaped
    Unknown,
}

/// Outcome of [`SessionRegistry::ensure_anti_forgery`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenLookup {
    /// Session is live; its token, generated if it had none
    Issued(String),
    /// Session exists but reached a terminal status
    Ended(SessionStatus),
    /// Never issued or already removed
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub timed_out: usize,
    pub reaped: usize,
}

#[derive(Default)]
struct RegistryInner {
    by_principal: HashMap<PrincipalId, Vec<SessionRecord>>,
    index: HashMap<SessionId, PrincipalId>,
}

impl RegistryInner {
    fn record_mut(&mut self, session_id: &SessionId) -> Option<&mut SessionRecord> {
        let principal_id = self.index.get(session_id)?;
        self.by_principal
            .get_mut(principal_id)?
            .iter_mut()
            .find(|s| &s.session_id == session_id)
    }

    fn put(&mut self, record: SessionRecord) {
        self.index.insert(record.session_id.clone(), record.principal_id);
        let sessions = self.by_principal.entry(record.principal_id).or_default();
        match sessions.iter_mut().find(|s| s.session_id == record.session_id) {
            Some(existing) => *existing = record,
            None => sessions.push(record),
        }
    }

    fn invalidate_all_active(&mut self, principal_id: PrincipalId) -> Vec<SessionId> {
        self.by_principal
            .get_mut(&principal_id)
            .map(|sessions| {
                sessions
                    .iter_mut()
                    .filter(|s| s.status == SessionStatus::Active)
                    .filter_map(|s| {
                        s.transition(SessionStatus::ExpiredConcurrent)
                            .then(|| s.session_id.clone())
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn remove(&mut self, session_id: &SessionId) -> Option<SessionRecord> {
        let principal_id = self.index.remove(session_id)?;
        let sessions = self.by_principal.get_mut(&principal_id)?;
        let position = sessions.iter().position(|s| &s.session_id == session_id)?;
        let record = sessions.swap_remove(position);
        if sessions.is_empty() {
            self.by_principal.remove(&principal_id);
        }
        Some(record)
    }
}

/// Concurrency-safe session index shared by all request tasks
pub struct SessionRegistry {
    inner: RwLock<RegistryInner>,
    clock: Arc<dyn Clock>,
    max_inactivity: Duration,
}

impl SessionRegistry {
    pub fn new(clock: Arc<dyn Clock>, max_inactivity: Duration) -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
            clock,
            max_inactivity,
        }
    }

    pub fn max_inactivity(&self) -> Duration {
        self.max_inactivity
    }

    pub fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }

    /// Insert or replace a record as-is
    pub async fn put(&self, record: SessionRecord) {
        self.inner.write().await.put(record);
    }

    /// Mark every ACTIVE session of the principal EXPIRED_CONCURRENT
    pub async fn invalidate_all_active(&self, principal_id: PrincipalId) -> Vec<SessionId> {
        self.inner.write().await.invalidate_all_active(principal_id)
    }

    /// Invalidate the principal's ACTIVE sessions and install `record` in one
    /// transition. No reader can observe both the old and the new session ACTIVE.
    pub async fn register_exclusive(&self, record: SessionRecord) -> Vec<SessionId> {
        let mut inner = self.inner.write().await;
        let superseded = inner.invalidate_all_active(record.principal_id);
        inner.put(record);
        superseded
    }

    /// Record activity on a session and slide its expiry.
    pub async fn touch(&self, session_id: &SessionId) -> Touch {
        let now = self.clock.now();
        let window = self.max_inactivity;
        let mut inner = self.inner.write().await;

        let Some(record) = inner.record_mut(session_id) else {
            return Touch::Unknown;
        };

        match record.status {
            SessionStatus::Active if now > record.expires_at => {
                record.transition(SessionStatus::ExpiredTimeout);
                Touch::TimedOut
            }
            SessionStatus::Active => {
                record.last_seen_at = now;
                record.expires_at = now + window;
                Touch::Active(record.clone())
            }
            SessionStatus::ExpiredConcurrent => Touch::Superseded,
            SessionStatus::ExpiredTimeout => Touch::TimedOut,
            SessionStatus::LoggedOut => Touch::Unknown,
        }
    }

    pub async fn get(&self, session_id: &SessionId) -> Option<SessionRecord> {
        let inner = self.inner.read().await;
        let principal_id = inner.index.get(session_id)?;
        inner
            .by_principal
            .get(principal_id)?
            .iter()
            .find(|s| &s.session_id == session_id)
            .cloned()
    }

    /// Remove a session. The returned record carries status LOGGED_OUT if it was
    /// still active.
    pub async fn remove(&self, session_id: &SessionId) -> Option<SessionRecord> {
        let mut record = self.inner.write().await.remove(session_id)?;
        record.transition(SessionStatus::LoggedOut);
        Some(record)
    }

    /// Point-in-time copy of every record
    pub async fn list_all(&self) -> Vec<SessionRecord> {
        let inner = self.inner.read().await;
        inner.by_principal.values().flatten().cloned().collect()
    }

    pub async fn sessions_for(&self, principal_id: PrincipalId) -> Vec<SessionRecord> {
        let inner = self.inner.read().await;
        inner
            .by_principal
            .get(&principal_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Anti-forgery token of an ACTIVE session, generated on first request.
    pub async fn ensure_anti_forgery(&self, session_id: &SessionId) -> TokenLookup {
        let mut inner = self.inner.write().await;
        let Some(record) = inner.record_mut(session_id) else {
            return TokenLookup::Unknown;
        };
        if record.status.is_terminal() {
            return TokenLookup::Ended(record.status);
        }
        TokenLookup::Issued(
            record
                .anti_forgery_token
                .get_or_insert_with(random_token)
                .clone(),
        )
    }

    /// Flip overdue ACTIVE sessions to EXPIRED_TIMEOUT and drop terminal sessions
    /// idle for longer than `retention`.
    pub async fn sweep(&self, retention: Duration) -> SweepStats {
        let now = self.clock.now();
        let mut stats = SweepStats::default();
        let mut inner = self.inner.write().await;
        let RegistryInner {
            by_principal,
            index,
        } = &mut *inner;

        by_principal.retain(|_, sessions| {
            for session in sessions.iter_mut() {
                if session.status == SessionStatus::Active
                    && now > session.expires_at
                    && session.transition(SessionStatus::ExpiredTimeout)
                {
                    stats.timed_out += 1;
                }
            }
            sessions.retain(|s| {
                let keep = !s.status.is_terminal() || s.last_seen_at + retention >= now;
                if !keep {
                    index.remove(&s.session_id);
                    stats.reaped += 1;
                }
                keep
            });
            !sessions.is_empty()
        });

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_shared::ManualClock;

    fn registry() -> (Arc<ManualClock>, SessionRegistry) {
        let clock = Arc::new(ManualClock::starting_now());
        let registry = SessionRegistry::new(clock.clone(), Duration::hours(24));
        (clock, registry)
    }

    fn record(registry: &SessionRegistry, principal_id: PrincipalId) -> SessionRecord {
        SessionRecord::new(
            principal_id,
            registry.now(),
            registry.max_inactivity(),
            &RequestContext::default(),
        )
    }

    async fn active_count(registry: &SessionRegistry, principal_id: PrincipalId) -> usize {
        registry
            .sessions_for(principal_id)
            .await
            .iter()
            .filter(|s| s.status == SessionStatus::Active)
            .count()
    }

    #[test]
    fn test_session_ids_are_random_and_url_safe() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 43);
        assert!(a
            .as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert!(!format!("{a:?}").contains(a.as_str()));
    }

    #[tokio::test]
    async fn test_register_exclusive_supersedes_previous() {
        let (_, registry) = registry();
        let alice = PrincipalId::new();

        let first = record(&registry, alice);
        assert!(registry.register_exclusive(first.clone()).await.is_empty());

        let second = record(&registry, alice);
        let superseded = registry.register_exclusive(second.clone()).await;
        assert_eq!(superseded, vec![first.session_id.clone()]);

        assert!(matches!(registry.touch(&first.session_id).await, Touch::Superseded));
        assert!(matches!(registry.touch(&second.session_id).await, Touch::Active(_)));
        assert_eq!(active_count(&registry, alice).await, 1);
    }

    #[tokio::test]
    async fn test_invalidate_all_active_only_touches_principal() {
        let (_, registry) = registry();
        let alice = PrincipalId::new();
        let bob = PrincipalId::new();
        registry.put(record(&registry, alice)).await;
        registry.put(record(&registry, alice)).await;
        registry.put(record(&registry, bob)).await;

        assert_eq!(registry.invalidate_all_active(alice).await.len(), 2);
        assert_eq!(active_count(&registry, alice).await, 0);
        assert_eq!(active_count(&registry, bob).await, 1);
        assert!(registry.invalidate_all_active(alice).await.is_empty());
    }

    #[tokio::test]
    async fn test_touch_slides_expiry() {
        let (clock, registry) = registry();
        let session = record(&registry, PrincipalId::new());
        registry.put(session.clone()).await;

        clock.advance(Duration::hours(23));
        let Touch::Active(touched) = registry.touch(&session.session_id).await else {
            panic!("session should still be active");
        };
        assert_eq!(touched.expires_at, clock.now() + Duration::hours(24));

        clock.advance(Duration::hours(23));
        assert!(matches!(registry.touch(&session.session_id).await, Touch::Active(_)));
    }

    #[tokio::test]
    async fn test_touch_times_out_and_stays_terminal() {
        let (clock, registry) = registry();
        let session = record(&registry, PrincipalId::new());
        registry.put(session.clone()).await;

        clock.advance(Duration::hours(24) + Duration::seconds(1));
        assert!(matches!(registry.touch(&session.session_id).await, Touch::TimedOut));

        // Terminal states never reopen, even if the clock goes back
        clock.set(session.created_at);
        assert!(matches!(registry.touch(&session.session_id).await, Touch::TimedOut));
        let stored = registry.get(&session.session_id).await.unwrap();
        assert_eq!(stored.status, SessionStatus::ExpiredTimeout);
    }

    #[tokio::test]
    async fn test_timed_out_session_is_not_marked_concurrent() {
        let (clock, registry) = registry();
        let alice = PrincipalId::new();
        let old = record(&registry, alice);
        registry.put(old.clone()).await;

        clock.advance(Duration::days(2));
        assert!(matches!(registry.touch(&old.session_id).await, Touch::TimedOut));

        let superseded = registry.register_exclusive(record(&registry, alice)).await;
        assert!(superseded.is_empty());
        assert_eq!(
            registry.get(&old.session_id).await.unwrap().status,
            SessionStatus::ExpiredTimeout
        );
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (_, registry) = registry();
        let session = record(&registry, PrincipalId::new());
        registry.put(session.clone()).await;

        let removed = registry.remove(&session.session_id).await.unwrap();
        assert_eq!(removed.status, SessionStatus::LoggedOut);
        assert!(registry.remove(&session.session_id).await.is_none());
        assert!(registry.get(&session.session_id).await.is_none());
        assert!(matches!(registry.touch(&session.session_id).await, Touch::Unknown));
        assert!(registry.list_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_anti_forgery_token_is_stable_until_session_ends() {
        let (_, registry) = registry();
        let alice = PrincipalId::new();
        let session = record(&registry, alice);
        registry.register_exclusive(session.clone()).await;

        let TokenLookup::Issued(token) = registry.ensure_anti_forgery(&session.session_id).await
        else {
            panic!("live session should have a token");
        };
        assert_eq!(
            registry.ensure_anti_forgery(&session.session_id).await,
            TokenLookup::Issued(token.clone())
        );

        registry.invalidate_all_active(alice).await;
        assert_eq!(
            registry.ensure_anti_forgery(&session.session_id).await,
            TokenLookup::Ended(SessionStatus::ExpiredConcurrent)
        );
        assert_eq!(
            registry
                .ensure_anti_forgery(&SessionId::from_client("nope"))
                .await,
            TokenLookup::Unknown
        );
    }

    #[tokio::test]
    async fn test_sweep_expires_and_reaps() {
        let (clock, registry) = registry();
        let alice = PrincipalId::new();
        let bob = PrincipalId::new();
        let stale = record(&registry, alice);
        registry.put(stale.clone()).await;

        clock.advance(Duration::hours(25));
        let fresh = record(&registry, bob);
        registry.put(fresh.clone()).await;

        let stats = registry.sweep(Duration::hours(24)).await;
        assert_eq!(stats, SweepStats { timed_out: 1, reaped: 0 });
        assert_eq!(
            registry.get(&stale.session_id).await.unwrap().status,
            SessionStatus::ExpiredTimeout
        );

        // last_seen_at of the stale session is now 49h behind
        clock.advance(Duration::hours(24));
        let stats = registry.sweep(Duration::hours(24)).await;
        assert_eq!(stats.reaped, 1);
        assert!(registry.get(&stale.session_id).await.is_none());
        assert!(registry.sessions_for(alice).await.is_empty());
        assert!(registry.sessions_for(bob).await.len() == 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_logins_leave_one_active() {
        let (_, registry) = registry();
        let registry = Arc::new(registry);
        let alice = PrincipalId::new();

        let mut handles = Vec::new();
        for _ in 0..32 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                let session = record(&registry, alice);
                registry.register_exclusive(session.clone()).await;
                session.session_id
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }

        let sessions = registry.sessions_for(alice).await;
        assert_eq!(sessions.len(), 32);
        assert_eq!(active_count(&registry, alice).await, 1);
        let superseded = sessions
            .iter()
            .filter(|s| s.status == SessionStatus::ExpiredConcurrent)
            .count();
        assert_eq!(superseded, 31);
    }
}
