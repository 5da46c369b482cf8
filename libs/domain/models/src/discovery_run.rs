// [libs/domain/models/src/discovery_run.rs]
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::OrganizationId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryStage {
    Queued,
    FetchingCredentials,
    Paginating,
    Normalizing,
    Detecting,
    ScoringRisk,
    Persisting,
    Done,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DiscoveryRunStats {
    pub automations_found: u32,
    pub errors: u32,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryRun {
    pub id: String,
    pub organization_id: OrganizationId,
    pub connection_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub stage: DiscoveryStage,
    pub stats: DiscoveryRunStats,
    pub algorithms_executed: Vec<String>,
    pub cancel_requested: bool,
}

impl DiscoveryRun {
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|end| end - self.started_at)
    }
}
