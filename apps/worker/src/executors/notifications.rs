// [apps/worker/src/executors/notifications.rs]
//! Claims off the notifications queue. Most jobs here are risk-alert
//! payloads enqueued by the discovery and risk-assessment executors;
//! `payload.kind == "feedback_review"` is the one exception, routed to the
//! feedback/RL loop instead of ordinary notification persistence.

use aegis_domain_models::job::Job;
use aegis_domain_models::BusEvent;
use aegis_domain_notification::{NotificationSeverity, SystemNotification};
use chrono::Utc;
use tracing::{error, warn};

use crate::executors::feedback_review;
use crate::state::WorkerState;

pub async fn handle(state: WorkerState, job: Job) {
    if job.payload.get("kind").and_then(|v| v.as_str()) == Some("feedback_review") {
        feedback_review::handle(state, job).await;
        return;
    }

    let job_id = job.id.clone();
    match run(&state, &job).await {
        Ok(()) => {
            if let Err(e) = state.job_broker.complete(&job_id, serde_json::json!({})).await {
                error!("notification job [{job_id}] finished but could not be marked complete: {e}");
            }
        }
        Err(message) => {
            warn!("notification job [{job_id}] failed: {message}");
            if let Err(e) = state.job_broker.fail(&job_id, &message).await {
                error!("notification job [{job_id}] failed and could not be marked failed: {e}");
            }
        }
    }
}

async fn run(state: &WorkerState, job: &Job) -> Result<(), String> {
    let organization_id = job.organization_id.clone();
    let notification = build_notification(&organization_id, &job.payload);

    let persisted = state.notifications.create(&notification).await.map_err(|e| e.to_string())?;

    state
        .event_bus
        .publish(
            &organization_id,
            BusEvent::SystemNotification { level: format!("{:?}", persisted.level).to_lowercase(), message: persisted.message.clone(), at: Utc::now(), title: persisted.title.clone(), details: persisted.details.clone() },
        )
        .await;

    Ok(())
}

fn build_notification(organization_id: &str, payload: &serde_json::Value) -> SystemNotification {
    let name = payload.get("name").and_then(|v| v.as_str()).unwrap_or("an automation");
    let risk = payload.get("overallRisk").and_then(|v| v.as_str()).unwrap_or("elevated");
    let level = if risk.eq_ignore_ascii_case("critical") { NotificationSeverity::Critical } else { NotificationSeverity::Warning };

    SystemNotification::new(organization_id.to_string(), level, format!("{name} flagged as {risk} risk")).with_title("risk alert").with_details(payload.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_risk_maps_to_critical_severity() {
        let payload = serde_json::json!({ "name": "Zapier", "overallRisk": "Critical", "riskScore": 95 });
        let notification = build_notification("org-1", &payload);
        assert_eq!(notification.level, NotificationSeverity::Critical);
        assert!(notification.message.contains("Zapier"));
    }

    #[test]
    fn non_critical_risk_maps_to_warning_severity() {
        let payload = serde_json::json!({ "name": "Slackbot", "overallRisk": "High", "riskScore": 70 });
        let notification = build_notification("org-1", &payload);
        assert_eq!(notification.level, NotificationSeverity::Warning);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let notification = build_notification("org-1", &serde_json::json!({}));
        assert_eq!(notification.level, NotificationSeverity::Warning);
        assert!(notification.message.contains("an automation"));
        assert!(notification.message.contains("elevated"));
    }
}
