// [libs/domain/models/src/job.rs]
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::OrganizationId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum QueueName {
    Discovery,
    RiskAssessment,
    Notifications,
}

impl QueueName {
    pub fn as_str(self) -> &'static str {
        match self {
            QueueName::Discovery => "discovery",
            QueueName::RiskAssessment => "risk-assessment",
            QueueName::Notifications => "notifications",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "discovery" => Some(QueueName::Discovery),
            "risk-assessment" => Some(QueueName::RiskAssessment),
            "notifications" => Some(QueueName::Notifications),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Active,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub queue_name: QueueName,
    pub organization_id: OrganizationId,
    pub payload: serde_json::Value,
    pub priority: i32,
    pub attempts: u32,
    pub max_attempts: u32,
    pub status: JobStatus,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub stalled_count: u32,
    pub heartbeat_at: Option<DateTime<Utc>>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Identifies a job across retries for idempotency and for the
/// deterministic repeatable-job no-op-reregistration rule.
pub fn deterministic_job_id(queue: QueueName, discriminator: &str) -> String {
    format!("{}:{}", queue.as_str(), discriminator)
}
