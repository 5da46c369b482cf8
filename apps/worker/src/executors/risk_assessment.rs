// [apps/worker/src/executors/risk_assessment.rs]
//! Re-scores one already-discovered automation. Chained off a completed
//! discovery job today via `JobBroker::chain_risk_assessment`, but also
//! callable standalone once a detector configuration change should be
//! reflected without waiting for the next discovery run.

use aegis_domain_models::job::Job;
use aegis_domain_models::{BusEvent, OverallRisk};
use aegis_domain_risk::{RiskConfig, RiskEngine, ASSESSOR_VERSION};
use chrono::Utc;
use tracing::{error, warn};

use crate::state::WorkerState;

pub async fn handle(state: WorkerState, job: Job) {
    let job_id = job.id.clone();
    match run(&state, &job).await {
        Ok(result) => {
            if let Err(e) = state.job_broker.complete(&job_id, result).await {
                error!("risk-assessment job [{job_id}] finished but could not be marked complete: {e}");
            }
        }
        Err(message) => {
            warn!("risk-assessment job [{job_id}] failed: {message}");
            if let Err(e) = state.job_broker.fail(&job_id, &message).await {
                error!("risk-assessment job [{job_id}] failed and could not be marked failed: {e}");
            }
        }
    }
}

async fn run(state: &WorkerState, job: &Job) -> Result<serde_json::Value, String> {
    let organization_id = job.organization_id.clone();
    let automation_id = job
        .payload
        .get("automationId")
        .and_then(|v| v.as_str())
        .ok_or_else(|| "risk-assessment job payload is missing automationId".to_string())?
        .to_string();
    let discovery_run_id = job.payload.get("discoveryRunId").and_then(|v| v.as_str()).unwrap_or_default().to_string();

    let automation = state.automations.get(&organization_id, &automation_id).await.map_err(|e| e.to_string())?;
    let connection = state.connections.get(&organization_id, &automation.connection_id).await.map_err(|e| e.to_string())?;

    let risk_config = RiskConfig { base_score: state.settings.risk_score_base, per_factor_score: state.settings.risk_score_per_factor, ..RiskConfig::default() };
    let outcome = RiskEngine::assess(&automation.detection_metadata, &risk_config);

    let assessment = state
        .risk_assessments
        .create(&organization_id, &automation.id, outcome.overall_risk, outcome.risk_score, &outcome.risk_factors, ASSESSOR_VERSION)
        .await
        .map_err(|e| e.to_string())?;

    if outcome.overall_risk >= OverallRisk::High {
        let payload = serde_json::json!({
            "automationId": automation.id,
            "name": automation.name,
            "overallRisk": format!("{:?}", outcome.overall_risk),
            "riskScore": outcome.risk_score,
        });
        let _ = state.job_broker.enqueue_notification(&organization_id, &discovery_run_id, payload, outcome.overall_risk == OverallRisk::Critical).await;
    }

    state
        .event_bus
        .publish(
            &organization_id,
            BusEvent::AutomationDiscovered {
                automation_id: automation.id.clone(),
                name: automation.name.clone(),
                platform: connection.platform,
                risk_level: outcome.overall_risk,
                at: Utc::now(),
                risk_score: Some(outcome.risk_score),
                automation_type: Some(format!("{:?}", automation.automation_type)),
            },
        )
        .await;

    Ok(serde_json::json!({ "assessmentId": assessment.id, "riskScore": assessment.risk_score }))
}
