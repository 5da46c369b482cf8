// [libs/infra/jobs/src/reaper.rs]
use std::time::Duration as StdDuration;

use chrono::Duration;
use tokio::time::interval;
use tracing::{info, warn};

use crate::broker::JobBroker;
use crate::config::BrokerConfig;

const SWEEP_INTERVAL_SECONDS: u64 = 15;

/// Periodically requeues stalled jobs and trims completed/failed
/// retention windows. Runs for the lifetime of the process; callers
/// drop the returned handle to stop it.
pub fn spawn_reaper(broker: std::sync::Arc<JobBroker>, config: BrokerConfig) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(StdDuration::from_secs(SWEEP_INTERVAL_SECONDS));
        info!("job reaper started, sweeping every {SWEEP_INTERVAL_SECONDS}s");

        loop {
            ticker.tick().await;

            match broker
                .repository()
                .requeue_stalled(Duration::seconds(config.stalled_interval_seconds), config.max_stalled_count)
                .await
            {
                Ok(requeued) if !requeued.is_empty() => {
                    warn!("reaper requeued {} stalled job(s): {:?}", requeued.len(), requeued);
                }
                Ok(_) => {}
                Err(e) => warn!("reaper stall sweep failed: {e}"),
            }

            if let Err(e) = broker.repository().trim_retention(config.retention_completed, config.retention_failed).await {
                warn!("reaper retention trim failed: {e}");
            }
        }
    })
}
