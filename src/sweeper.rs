//! Background eviction of expired sessions.
//!
//! A periodic housekeeping task; its evictions are never surfaced to any
//! caller. Expiry is also enforced lazily on access, so the sweeper only
//! bounds how long an abandoned session's index stays resident.

use std::sync::Arc;
use std::time::Duration;

use crate::session::SessionStore;

/// Spawn the sweep loop. The task runs until the process exits or the
/// returned handle is aborted.
pub fn spawn(store: Arc<SessionStore>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so a fresh store is not
        // swept before it has served anything.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let swept = store.sweep();
            if swept > 0 {
                tracing::info!(swept, live = store.len(), "sweeper pass complete");
            }
        }
    })
}
