//! Periodic purge of finished jobs.
//!
//! Retention policy: terminal jobs (succeeded or failed) are kept for a
//! configurable window after `finished_at`, then deleted. A `get` on a
//! purged id reports `NotFound`. Queued and running jobs are never
//! purged.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use renderq_db::JobStore;

/// Default retention window: 24 hours after completion.
pub const DEFAULT_RETENTION_HOURS: i64 = 24;

/// How often the purge runs.
const SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// Run the retention sweep until `cancel` is triggered.
pub async fn run(store: Arc<dyn JobStore>, retention_hours: i64, cancel: CancellationToken) {
    tracing::info!(
        retention_hours,
        interval_secs = SWEEP_INTERVAL.as_secs(),
        "Retention sweep started",
    );

    let mut interval = tokio::time::interval(SWEEP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Retention sweep stopping");
                break;
            }
            _ = interval.tick() => {
                let cutoff = Utc::now() - chrono::Duration::hours(retention_hours);
                match store.purge_finished(cutoff).await {
                    Ok(purged) if purged > 0 => {
                        tracing::info!(purged, "Retention: purged finished jobs");
                    }
                    Ok(_) => {
                        tracing::debug!("Retention: nothing to purge");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Retention purge failed");
                    }
                }
            }
        }
    }
}
