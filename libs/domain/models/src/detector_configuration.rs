// [libs/domain/models/src/detector_configuration.rs]
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::OrganizationId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DetectorCode {
    Velocity,
    OffHours,
    Batch,
    AiProvider,
}

/// Per-tenant thresholds and toggles for one detector. Versioned: every
/// update produces a new row rather than mutating in place, so the RL
/// loop can always diff the active version against its proposal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfiguration {
    pub id: String,
    pub organization_id: OrganizationId,
    pub version: u32,
    pub detector_code: DetectorCode,
    pub thresholds: serde_json::Value,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}
