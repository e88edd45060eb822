//! Periodic session sweep
//!
//! Flips overdue sessions to EXPIRED_TIMEOUT and drops terminal sessions once
//! they are older than the retention window, so the registry does not grow
//! without bound.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::audit_constants::{event_type, session_event};
use crate::auth::{SessionRegistry, SweepStats};

pub async fn sweep_once(registry: &SessionRegistry, retention: time::Duration) -> SweepStats {
    let stats = registry.sweep(retention).await;
    if stats.timed_out > 0 || stats.reaped > 0 {
        tracing::info!(
            event = session_event::SWEEP_COMPLETED,
            event_type = event_type::SESSION,
            timed_out = stats.timed_out,
            reaped = stats.reaped,
            "Session sweep completed"
        );
    }
    stats
}

/// Runs until the returned handle is aborted
pub fn spawn_session_sweeper(
    registry: Arc<SessionRegistry>,
    every: Duration,
    retention: time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            sweep_once(&registry, retention).await;
        }
    })
}
