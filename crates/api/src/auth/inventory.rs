//! Read-only projection of the session registry for administrators

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use time::{macros::format_description, Duration, OffsetDateTime, UtcOffset};
use warden_shared::{Principal, PrincipalId, PrincipalStore};

use super::registry::{SessionRegistry, SessionStatus};
use crate::error::ApiResult;

pub const UNKNOWN_PRINCIPAL: &str = "<unknown>";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub principal_id: PrincipalId,
    pub username: String,
    pub authorities: Vec<String>,
    /// Leading characters of the id only
    pub session_id: String,
    pub last_seen_at: String,
    pub last_seen_ago: String,
    pub status: SessionStatus,
    pub remaining_validity: String,
}

pub struct SessionInventory {
    registry: Arc<SessionRegistry>,
    principals: Arc<dyn PrincipalStore>,
    display_offset: UtcOffset,
}

impl SessionInventory {
    pub fn new(
        registry: Arc<SessionRegistry>,
        principals: Arc<dyn PrincipalStore>,
        display_offset: UtcOffset,
    ) -> Self {
        Self {
            registry,
            principals,
            display_offset,
        }
    }

    /// Most recently seen first
    pub async fn list(&self) -> ApiResult<Vec<SessionView>> {
        let now = self.registry.now();
        let mut records = self.registry.list_all().await;
        records.sort_by(|a, b| b.last_seen_at.cmp(&a.last_seen_at));

        let mut principals: HashMap<PrincipalId, Option<Principal>> = HashMap::new();
        let mut views = Vec::with_capacity(records.len());

        for record in records {
            if !principals.contains_key(&record.principal_id) {
                let principal = self.principals.find_by_id(record.principal_id).await?;
                principals.insert(record.principal_id, principal);
            }
            let (username, authorities) = match principals.get(&record.principal_id) {
                Some(Some(p)) => (p.username.clone(), p.roles.clone()),
                _ => (UNKNOWN_PRINCIPAL.to_string(), Vec::new()),
            };

            let remaining_validity = if record.status == SessionStatus::Active {
                humanize_remaining(record.expires_at - now)
            } else {
                "expired".to_string()
            };

            views.push(SessionView {
                principal_id: record.principal_id,
                username,
                authorities,
                session_id: record.session_id.short().to_string(),
                last_seen_at: format_local(record.last_seen_at, self.display_offset),
                last_seen_ago: humanize(now - record.last_seen_at),
                status: record.status,
                remaining_validity,
            });
        }

        Ok(views)
    }
}

pub fn format_local(at: OffsetDateTime, offset: UtcOffset) -> String {
    let local = at.to_offset(offset);
    local
        .format(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second] [offset_hour sign:mandatory]:[offset_minute]"
        ))
        .unwrap_or_else(|_| local.to_string())
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

fn coarse(elapsed: Duration) -> Option<String> {
    if elapsed < Duration::MINUTE {
        None
    } else if elapsed < Duration::HOUR {
        Some(plural(elapsed.whole_minutes(), "minute"))
    } else if elapsed < Duration::DAY {
        Some(plural(elapsed.whole_hours(), "hour"))
    } else {
        Some(plural(elapsed.whole_days(), "day"))
    }
}

/// "moments ago", "N minute(s) ago", "N hour(s) ago", "N day(s) ago"
pub fn humanize(elapsed: Duration) -> String {
    match coarse(elapsed) {
        Some(amount) => format!("{amount} ago"),
        None => "moments ago".to_string(),
    }
}

/// "in N minute(s)" and so on, or "expired"
pub fn humanize_remaining(remaining: Duration) -> String {
    if remaining <= Duration::ZERO {
        return "expired".to_string();
    }
    match coarse(remaining) {
        Some(amount) => format!("in {amount}"),
        None => "in moments".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::context::RequestContext;
    use crate::auth::registry::SessionRecord;
    use time::macros::{datetime, offset};
    use warden_shared::{AuditStamp, Clock, ManualClock, MemoryStore};

    #[test]
    fn test_humanize_buckets() {
        assert_eq!(humanize(Duration::seconds(0)), "moments ago");
        assert_eq!(humanize(Duration::seconds(59)), "moments ago");
        assert_eq!(humanize(Duration::seconds(60)), "1 minute ago");
        assert_eq!(humanize(Duration::minutes(59)), "59 minutes ago");
        assert_eq!(humanize(Duration::minutes(60)), "1 hour ago");
        assert_eq!(humanize(Duration::hours(23)), "23 hours ago");
        assert_eq!(humanize(Duration::hours(24)), "1 day ago");
        assert_eq!(humanize(Duration::days(9)), "9 days ago");
        assert_eq!(humanize(Duration::seconds(-5)), "moments ago");
    }

    #[test]
    fn test_humanize_remaining() {
        assert_eq!(humanize_remaining(Duration::ZERO), "expired");
        assert_eq!(humanize_remaining(Duration::seconds(-1)), "expired");
        assert_eq!(humanize_remaining(Duration::seconds(30)), "in moments");
        assert_eq!(humanize_remaining(Duration::minutes(2)), "in 2 minutes");
        assert_eq!(humanize_remaining(Duration::hours(1)), "in 1 hour");
    }

    #[test]
    fn test_local_format_applies_offset() {
        let at = datetime!(2024-03-01 23:30:05 UTC);
        assert_eq!(format_local(at, offset!(+02:00)), "2024-03-02 01:30:05 +02:00");
        assert_eq!(format_local(at, UtcOffset::UTC), "2024-03-01 23:30:05 +00:00");
    }

    #[tokio::test]
    async fn test_list_sorts_and_marks_deleted_principals() {
        let clock = Arc::new(ManualClock::new(datetime!(2024-01-01 12:00 UTC)));
        let registry = Arc::new(SessionRegistry::new(clock.clone(), Duration::hours(24)));
        let store = Arc::new(MemoryStore::new());

        let alice = Principal {
            id: PrincipalId::new(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: String::new(),
            roles: vec!["ADMIN".to_string()],
            audit: AuditStamp::created(clock.now(), None),
        };
        store.insert_principal(alice.clone()).await.unwrap();

        let ctx = RequestContext::default();
        let ghost = PrincipalId::new();
        registry
            .put(SessionRecord::new(ghost, clock.now(), Duration::hours(24), &ctx))
            .await;
        clock.advance(Duration::minutes(5));
        registry
            .put(SessionRecord::new(alice.id, clock.now(), Duration::hours(24), &ctx))
            .await;
        clock.advance(Duration::minutes(1));

        let inventory = SessionInventory::new(registry, store, UtcOffset::UTC);
        let views = inventory.list().await.unwrap();

        assert_eq!(views.len(), 2);
        assert_eq!(views[0].username, "alice");
        assert_eq!(views[0].authorities, vec!["ADMIN".to_string()]);
        assert_eq!(views[0].last_seen_ago, "1 minute ago");
        assert_eq!(views[0].last_seen_at, "2024-01-01 12:05:00 +00:00");
        assert_eq!(views[0].remaining_validity, "in 23 hours");
        assert_eq!(views[1].username, UNKNOWN_PRINCIPAL);
        assert!(views[1].authorities.is_empty());
        assert_eq!(views[1].last_seen_ago, "6 minutes ago");
    }
}
