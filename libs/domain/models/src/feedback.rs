// [libs/domain/models/src/feedback.rs]
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::OrganizationId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    CorrectDetection,
    FalsePositive,
    FalseNegative,
    IncorrectClassification,
    IncorrectRiskScore,
    IncorrectAiProvider,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackSentiment {
    Positive,
    Negative,
    Neutral,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackStatus {
    Pending,
    Acknowledged,
    Resolved,
    Archived,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    pub id: String,
    pub organization_id: OrganizationId,
    pub automation_id: String,
    pub user_id: String,
    pub user_email: String,
    pub feedback_type: FeedbackType,
    pub sentiment: FeedbackSentiment,
    pub comment: Option<String>,
    pub suggested_corrections: serde_json::Value,
    pub status: FeedbackStatus,
    /// Snapshot of the detection inputs/outputs at the time feedback was
    /// captured, so later model changes don't retroactively change what
    /// a piece of feedback was agreeing or disagreeing with.
    pub ml_metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
