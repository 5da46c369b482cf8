// [libs/domain/models/src/risk_assessment.rs]
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::OrganizationId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum OverallRisk {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskFactor {
    pub code: String,
    pub description: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub id: String,
    pub automation_id: String,
    pub organization_id: OrganizationId,
    pub overall_risk: OverallRisk,
    pub risk_score: u8,
    pub risk_factors: Vec<RiskFactor>,
    pub assessed_at: DateTime<Utc>,
    pub assessor_version: String,
}

/// One point in a `RiskAssessment`'s history, queried over 7/30/90/365
/// day windows for trend analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskHistoryPoint {
    pub automation_id: String,
    pub at: DateTime<Utc>,
    pub score: u8,
    pub overall_risk: OverallRisk,
    pub changes: Vec<String>,
}
