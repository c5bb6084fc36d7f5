//! Background cleanup of expired launcher sessions
//!
//! Expired sessions already fail validation; sweeping only keeps the store
//! from growing without bound.

use std::sync::Arc;
use std::time::Duration;

use common::now_millis;
use repository::LauncherSessionRepository;
use tracing::{debug, info, warn};

/// Spawn a task that deletes expired launcher sessions every `interval`.
pub fn spawn_session_sweeper(
    sessions: Arc<dyn LauncherSessionRepository>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick fires immediately; nothing has expired yet at startup
        ticker.tick().await;

        loop {
            ticker.tick().await;
            sweep_cycle(sessions.as_ref(), now_millis()).await;
        }
    })
}

async fn sweep_cycle(sessions: &dyn LauncherSessionRepository, now_millis: u64) -> usize {
    match sessions.delete_expired_launcher_sessions(now_millis).await {
        Ok(0) => {
            debug!("no expired launcher sessions");
            0
        }
        Ok(removed) => {
            info!(removed, "swept expired launcher sessions");
            removed
        }
        Err(e) => {
            warn!(error = %e, "launcher session sweep failed, will retry next cycle");
            0
        }
    }
}
