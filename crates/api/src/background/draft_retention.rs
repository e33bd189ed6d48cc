//! Periodic cleanup of expired drafts.
//!
//! Drafts older than the store's retention are already ignored on load;
//! this job deletes them so abandoned onboardings do not accumulate.

use std::time::Duration;

use onboard_db::DraftStore;
use tokio_util::sync::CancellationToken;

/// How often the cleanup job runs.
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

/// Run the draft retention loop until `cancel` is triggered.
pub async fn run(store: DraftStore, interval: Duration, cancel: CancellationToken) {
    tracing::info!(
        retention_days = store.retention().num_days(),
        interval_secs = interval.as_secs(),
        "Draft retention job started"
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Draft retention job stopping");
                break;
            }
            _ = ticker.tick() => {
                match store.purge_expired().await {
                    Ok(0) => tracing::debug!("Draft retention: nothing to purge"),
                    Ok(deleted) => tracing::info!(deleted, "Draft retention: purged expired drafts"),
                    Err(e) => tracing::error!(error = %e, "Draft retention: cleanup failed"),
                }
            }
        }
    }
}
