// [libs/domain/models/src/automation.rs]
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::OrganizationId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AutomationType {
    Bot,
    Workflow,
    Integration,
    Webhook,
    Script,
    App,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AutomationStatus {
    Active,
    Inactive,
    Suspicious,
}

/// Evidence-based classification produced by the detection engine.
/// `risk_factors` here are the raw detector outputs; the Risk Engine
/// folds them into a `RiskAssessment`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DetectionMetadata {
    pub is_ai_platform: bool,
    pub ai_provider: Option<String>,
    pub platform_name: Option<String>,
    pub scopes: Vec<String>,
    pub detection_method: Option<String>,
    pub confidence: f64,
    pub evidence: Vec<String>,
    pub risk_factors: Vec<crate::risk_assessment::RiskFactor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerInfo {
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredAutomation {
    pub id: String,
    pub organization_id: OrganizationId,
    pub connection_id: String,
    pub discovery_run_id: String,
    pub external_id: String,
    pub name: String,
    pub description: Option<String>,
    pub automation_type: AutomationType,
    pub status: AutomationStatus,
    pub trigger_type: Option<String>,
    pub requested_permissions: Vec<String>,
    pub data_access_patterns: Vec<String>,
    pub owner_info: OwnerInfo,
    pub first_discovered_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub is_active: bool,
    pub platform_metadata: serde_json::Value,
    pub detection_metadata: DetectionMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DiscoveredAutomation {
    /// `isActive = true ⇒ lastSeenAt` within the staleness window.
    pub fn is_stale(&self, now: DateTime<Utc>, staleness_window: chrono::Duration) -> bool {
        now - self.last_seen_at > staleness_window
    }
}
