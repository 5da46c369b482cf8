// [apps/worker/src/main.rs]
//! Job executor entry point: load environment, connect the store, compose
//! `WorkerState`, start the reaper and the three queues' claim loops, and
//! wait for a shutdown signal.

mod claim_loop;
mod config;
mod errors;
mod executors;
mod state;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use aegis_domain_models::job::QueueName;
use aegis_infra_db::DbClient;
use aegis_infra_jobs::{spawn_reaper, BrokerConfig, JobBroker};
use tokio_util::sync::CancellationToken;
use tracing::info;

use config::Settings;
use state::WorkerState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    aegis_shared_telemetry::init_tracing("aegis-worker");

    let settings = Settings::from_env();
    let poll_interval = StdDuration::from_millis(settings.poll_interval_idle_ms);
    let discovery_concurrency = settings.discovery_concurrency;
    let risk_assessment_concurrency = settings.risk_assessment_concurrency;
    let notifications_concurrency = settings.notifications_concurrency;

    let db = DbClient::connect(&settings.database_url, settings.database_auth_token.clone()).await?;
    let worker_state = WorkerState::new(settings, db.clone());

    spawn_reaper(Arc::new(JobBroker::new(db)), BrokerConfig::default());

    let cancel = CancellationToken::new();
    let mut handles = Vec::new();
    handles.extend(claim_loop::spawn_claim_loops(worker_state.clone(), QueueName::Discovery, discovery_concurrency, poll_interval, cancel.clone(), |state, job| async move {
        executors::discovery::handle(state, job).await
    }));
    handles.extend(claim_loop::spawn_claim_loops(worker_state.clone(), QueueName::RiskAssessment, risk_assessment_concurrency, poll_interval, cancel.clone(), |state, job| async move {
        executors::risk_assessment::handle(state, job).await
    }));
    handles.extend(claim_loop::spawn_claim_loops(worker_state.clone(), QueueName::Notifications, notifications_concurrency, poll_interval, cancel.clone(), |state, job| async move {
        executors::notifications::handle(state, job).await
    }));

    info!("aegis-worker running with {} claim loop(s)", handles.len());

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, draining claim loops");
    cancel.cancel();

    for handle in handles {
        let _ = handle.await;
    }

    Ok(())
}
