//! Periodic request-cache purge.

use std::time::Duration;

use bracketeer_client::CachedApi;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Purge rows older than `max_age_secs` every `every`, starting one period from now.
pub fn spawn_purge_task(api: CachedApi, every: Duration, max_age_secs: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if let Err(e) = api.purge(max_age_secs).await {
                tracing::error!(error = %e, "scheduled cache purge failed");
            }
        }
    })
}
