// [apps/worker/src/claim_loop.rs]
//! Generic per-queue polling loop: claim, hand off to a handler, sleep when
//! empty. `concurrency` independent loops run per queue so one slow job
//! never stalls the others claiming from the same queue.

use std::future::Future;
use std::time::Duration as StdDuration;

use aegis_domain_models::job::{Job, QueueName};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::state::WorkerState;

pub fn spawn_claim_loops<F, Fut>(
    state: WorkerState,
    queue: QueueName,
    concurrency: usize,
    poll_interval: StdDuration,
    cancel: CancellationToken,
    handler: F,
) -> Vec<JoinHandle<()>>
where
    F: Fn(WorkerState, Job) -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    (0..concurrency)
        .map(|worker_index| {
            let state = state.clone();
            let cancel = cancel.clone();
            let handler = handler.clone();
            tokio::spawn(async move { run_claim_loop(state, queue, poll_interval, cancel, handler, worker_index).await })
        })
        .collect()
}

async fn run_claim_loop<F, Fut>(state: WorkerState, queue: QueueName, poll_interval: StdDuration, cancel: CancellationToken, handler: F, worker_index: usize)
where
    F: Fn(WorkerState, Job) -> Fut,
    Fut: Future<Output = ()>,
{
    info!("queue [{}] worker {worker_index} started", queue.as_str());

    loop {
        if cancel.is_cancelled() {
            break;
        }

        match state.job_broker.claim_next(queue).await {
            Ok(Some(job)) => handler(state.clone(), job).await,
            Ok(None) => {
                tokio::select! {
                    _ = tokio::time::sleep(poll_interval) => {}
                    _ = cancel.cancelled() => break,
                }
            }
            Err(e) => {
                error!("queue [{}] worker {worker_index} failed to claim: {e}", queue.as_str());
                tokio::select! {
                    _ = tokio::time::sleep(poll_interval) => {}
                    _ = cancel.cancelled() => break,
                }
            }
        }
    }

    info!("queue [{}] worker {worker_index} stopped", queue.as_str());
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use aegis_infra_db::DbClient;

    use super::*;
    use crate::config::Settings;
    use crate::state::WorkerState;

    fn test_settings() -> Settings {
        Settings {
            database_url: ":memory:".to_string(),
            database_auth_token: None,
            vault_master_key: "test-key-0123456789abcdef".to_string(),
            vault_key_version: 1,
            credential_refresh_buffer_seconds: 300,
            discovery_concurrency: 1,
            risk_assessment_concurrency: 1,
            notifications_concurrency: 1,
            poll_interval_idle_ms: 20,
            staleness_window_days: 7,
            audit_lookback_hours: 24,
            risk_score_base: 30,
            risk_score_per_factor: 15,
            feedback_review_window_seconds: 3600,
            feedback_review_cadence_hours: 24,
            discovery_cadence_hours: 24,
        }
    }

    #[tokio::test]
    async fn claims_a_queued_job_and_hands_it_to_the_handler() {
        let db = DbClient::connect(":memory:", None).await.expect("connect");
        let state = WorkerState::new(test_settings(), db);
        state.job_broker.enqueue_discovery(&"org-1".to_string(), "conn-1", 0).await.expect("enqueue");

        let handled = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let handles = spawn_claim_loops(state, QueueName::Discovery, 1, StdDuration::from_millis(10), cancel.clone(), {
            let handled = handled.clone();
            move |_state, _job| {
                let handled = handled.clone();
                async move {
                    handled.fetch_add(1, Ordering::SeqCst);
                }
            }
        });

        tokio::time::sleep(StdDuration::from_millis(100)).await;
        cancel.cancel();
        for handle in handles {
            let _ = handle.await;
        }

        assert_eq!(handled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stops_promptly_once_cancelled_with_an_empty_queue() {
        let db = DbClient::connect(":memory:", None).await.expect("connect");
        let state = WorkerState::new(test_settings(), db);

        let cancel = CancellationToken::new();
        let handles = spawn_claim_loops(state, QueueName::Notifications, 2, StdDuration::from_secs(30), cancel.clone(), |_state, _job: Job| async move {});

        cancel.cancel();
        let deadline = tokio::time::Instant::now() + StdDuration::from_secs(1);
        for handle in handles {
            tokio::time::timeout_at(deadline, handle).await.expect("loop should stop promptly after cancellation").expect("join");
        }
    }
}
