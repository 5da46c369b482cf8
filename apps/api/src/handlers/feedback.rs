// [apps/api/src/handlers/feedback.rs]
//! Verdict capture and ML training-batch export — the two facade
//! operations over the feedback/RL loop (`aegis-domain-feedback` itself
//! runs inside the worker, on a schedule; this module only ever writes
//! or reads feedback rows).

use axum::extract::State;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use aegis_domain_models::feedback::{Feedback, FeedbackSentiment, FeedbackType};

use crate::errors::ApiError;
use crate::middleware::TenantIdentity;
use crate::state::AppState;

/// A tenant's feedback export is capped at 100 rows per request —
/// large enough for a training batch, small enough to never need
/// pagination on this endpoint.
const ML_TRAINING_BATCH_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitFeedbackRequest {
    pub automation_id: String,
    pub feedback_type: FeedbackType,
    pub sentiment: FeedbackSentiment,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub suggested_corrections: serde_json::Value,
}

/// `POST /feedback` — snapshots the automation's detection metadata and
/// latest risk assessment into `ml_metadata` at submission time, so a
/// later detector change never retroactively alters what a piece of
/// feedback was agreeing or disagreeing with.
pub async fn submit(State(state): State<AppState>, Extension(identity): Extension<TenantIdentity>, Json(body): Json<SubmitFeedbackRequest>) -> Result<Json<Feedback>, ApiError> {
    let automation = state.automations.get(&identity.organization_id, &body.automation_id).await?;
    let latest_risk = state.risk_assessments.latest_for_automation(&identity.organization_id, &body.automation_id).await.ok();

    let ml_metadata = serde_json::json!({
        "detectionMetadata": automation.detection_metadata,
        "riskAssessment": latest_risk,
        "capturedAt": chrono::Utc::now(),
    });

    let feedback = state
        .feedback
        .create(
            &identity.organization_id,
            &body.automation_id,
            &identity.user_id,
            &identity.user_email,
            body.feedback_type,
            body.sentiment,
            body.comment.as_deref(),
            &body.suggested_corrections,
            &ml_metadata,
        )
        .await?;

    Ok(Json(feedback))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MlTrainingBatchResponse {
    pub items: Vec<Feedback>,
}

/// `GET /feedback/ml-training-batch` — most-recent-first page of this
/// tenant's feedback, each row carrying the `ml_metadata` snapshot a
/// training job needs without re-joining against live automation state.
pub async fn ml_training_batch(State(state): State<AppState>, Extension(identity): Extension<TenantIdentity>) -> Result<Json<MlTrainingBatchResponse>, ApiError> {
    let items = state.feedback.list_recent(&identity.organization_id, ML_TRAINING_BATCH_LIMIT).await?;
    Ok(Json(MlTrainingBatchResponse { items }))
}
