//! Background sweeper that tears down idle sessions.

use std::sync::Arc;
use std::time::Duration;

use flickmatch_core::SessionManager;
use metrics::counter;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::metrics::SESSIONS_EXPIRED_TOTAL;

/// Run one sweep. Returns how many sessions were expired.
pub fn sweep_once(sessions: &SessionManager, max_idle: Duration) -> usize {
    let expired = sessions.expire_idle(max_idle);
    if !expired.is_empty() {
        counter!(SESSIONS_EXPIRED_TOTAL).increment(expired.len() as u64);
        info!(count = expired.len(), "expired idle sessions");
    }
    expired.len()
}

/// Spawn a task sweeping every `interval` until `token` is cancelled.
pub fn spawn_idle_sweeper(
    sessions: Arc<SessionManager>,
    max_idle: Duration,
    interval: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // Skip the immediate first tick
        let _ = ticker.tick().await;
        debug!(?max_idle, ?interval, "idle sweeper started");

        loop {
            tokio::select! {
                () = token.cancelled() => break,
                _ = ticker.tick() => {
                    let _ = sweep_once(&sessions, max_idle);
                }
            }
        }
        debug!("idle sweeper stopped");
    })
}
