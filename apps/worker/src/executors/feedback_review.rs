// [apps/worker/src/executors/feedback_review.rs]
//! Periodic tick (riding the notifications queue, see DESIGN.md) that
//! crystallizes the trailing feedback window into a metrics snapshot,
//! compares it against the immediately preceding window, and merges any
//! resulting detector-configuration proposal as a new version.

use aegis_domain_feedback::{ConfigurationAdvisor, DegradationDetector, DriftThresholds, FeedbackAggregator};
use aegis_domain_models::job::Job;
use aegis_domain_models::BusEvent;
use aegis_domain_notification::{NotificationSeverity, SystemNotification};
use chrono::{Duration, Utc};
use tracing::{error, info, warn};

use crate::state::WorkerState;

pub async fn handle(state: WorkerState, job: Job) {
    let job_id = job.id.clone();
    match run(&state, &job).await {
        Ok(()) => {
            if let Err(e) = state.job_broker.complete(&job_id, serde_json::json!({})).await {
                error!("feedback-review job [{job_id}] finished but could not be marked complete: {e}");
            }
        }
        Err(message) => {
            warn!("feedback-review job [{job_id}] failed: {message}");
            if let Err(e) = state.job_broker.fail(&job_id, &message).await {
                error!("feedback-review job [{job_id}] failed and could not be marked failed: {e}");
            }
        }
    }
}

async fn run(state: &WorkerState, job: &Job) -> Result<(), String> {
    let organization_id = job.organization_id.clone();
    let window = Duration::seconds(state.settings.feedback_review_window_seconds);
    let now = Utc::now();

    let current_start = now - window;
    let previous_start = current_start - window;

    let current_rows = state.feedback.list_in_window(&organization_id, current_start, now).await.map_err(|e| e.to_string())?;
    let previous_rows = state.feedback.list_in_window(&organization_id, previous_start, current_start).await.map_err(|e| e.to_string())?;

    let current_snapshot = FeedbackAggregator::crystallize_snapshot(&organization_id, &current_rows, current_start, now);
    let previous_snapshot = FeedbackAggregator::crystallize_snapshot(&organization_id, &previous_rows, previous_start, current_start);

    if let Some(proposal) = ConfigurationAdvisor::propose(&previous_snapshot, &current_snapshot, &DriftThresholds::default()) {
        let existing = state.detector_configurations.get_active(&organization_id, proposal.detector_code).await.map_err(|e| e.to_string())?;
        let merged = merge_thresholds(existing.map(|c| c.thresholds), &proposal.proposed_thresholds);
        let version = state.detector_configurations.create_version(&organization_id, proposal.detector_code, &merged, true).await.map_err(|e| e.to_string())?;
        info!("feedback review for org [{organization_id}] proposed detector [{:?}] v{}: {}", proposal.detector_code, version.version, proposal.reason);
    }

    if let Some(notification) = DegradationDetector::check(&organization_id, &[previous_snapshot, current_snapshot]) {
        persist_degradation_notification(state, &organization_id, notification).await?;
    }

    Ok(())
}

/// Folds a proposal's delta/override keys on top of whatever the detector's
/// active version already carries, so a second proposal doesn't wipe out an
/// earlier tenant override it didn't touch.
fn merge_thresholds(existing: Option<serde_json::Value>, proposed: &serde_json::Value) -> serde_json::Value {
    let mut merged = existing.unwrap_or_else(|| serde_json::json!({}));
    if let (serde_json::Value::Object(base), serde_json::Value::Object(incoming)) = (&mut merged, proposed) {
        for (key, value) in incoming {
            base.insert(key.clone(), value.clone());
        }
    }
    merged
}

async fn persist_degradation_notification(state: &WorkerState, organization_id: &str, notification: SystemNotification) -> Result<(), String> {
    let persisted = state.notifications.create(&notification).await.map_err(|e| e.to_string())?;
    state
        .event_bus
        .publish(
            organization_id,
            BusEvent::SystemNotification {
                level: level_str(persisted.level),
                message: persisted.message.clone(),
                at: Utc::now(),
                title: persisted.title.clone(),
                details: persisted.details.clone(),
            },
        )
        .await;
    Ok(())
}

fn level_str(level: NotificationSeverity) -> String {
    match level {
        NotificationSeverity::Info => "info".to_string(),
        NotificationSeverity::Warning => "warning".to_string(),
        NotificationSeverity::Critical => "critical".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_existing_keys_the_proposal_does_not_touch() {
        let existing = Some(serde_json::json!({ "velocity_threshold_events_delta": -5, "batch_size_threshold": 60 }));
        let proposed = serde_json::json!({ "confidence_floor_delta": 0.1 });
        let merged = merge_thresholds(existing, &proposed);
        assert_eq!(merged["velocity_threshold_events_delta"], -5);
        assert_eq!(merged["batch_size_threshold"], 60);
        assert_eq!(merged["confidence_floor_delta"], 0.1);
    }

    #[test]
    fn merge_overwrites_a_key_the_proposal_does_touch() {
        let existing = Some(serde_json::json!({ "confidence_floor_delta": 0.1 }));
        let proposed = serde_json::json!({ "confidence_floor_delta": 0.2 });
        let merged = merge_thresholds(existing, &proposed);
        assert_eq!(merged["confidence_floor_delta"], 0.2);
    }

    #[test]
    fn merge_with_no_existing_configuration_starts_from_an_empty_object() {
        let merged = merge_thresholds(None, &serde_json::json!({ "batch_size_threshold": 10 }));
        assert_eq!(merged["batch_size_threshold"], 10);
    }

    #[test]
    fn level_str_matches_every_severity() {
        assert_eq!(level_str(NotificationSeverity::Info), "info");
        assert_eq!(level_str(NotificationSeverity::Warning), "warning");
        assert_eq!(level_str(NotificationSeverity::Critical), "critical");
    }
}
