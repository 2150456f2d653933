use chrono::{Duration, Utc};
use tokio::time::{Duration as TokioDuration, sleep};
use tracing::info;

use crate::AppState;

const CLEANUP_INTERVAL_MINUTES: u64 = 15;

/// Periodic retention sweep over the task table. Terminal tasks older
/// than the configured retention window are dropped; in-flight tasks are
/// never touched.
pub fn spawn(state: AppState) {
    tokio::spawn(async move {
        let interval = TokioDuration::from_secs(CLEANUP_INTERVAL_MINUTES * 60);
        loop {
            let cutoff = Utc::now() - Duration::hours(state.task_retention_hours());
            let removed = state.tasks().prune_terminal(cutoff).await;
            if removed > 0 {
                info!(removed, "task retention cleanup completed");
            }
            sleep(interval).await;
        }
    });
}
