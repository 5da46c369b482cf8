// [libs/domain/connectors/src/types.rs]
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One platform-native listing row, before normalization. `raw` preserves
/// every field the platform returned so downstream normalization can pick
/// out what matters without the adapter having to know the whole schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAutomation {
    pub external_id: String,
    pub name: String,
    pub description: Option<String>,
    pub owner_email: Option<String>,
    pub owner_name: Option<String>,
    pub scopes: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub trigger_type: Option<String>,
    pub client_id: Option<String>,
    pub user_agent: Option<String>,
    pub raw: serde_json::Value,
}

/// A normalized audit event used by the velocity / batch / off-hours
/// detectors. Ordering is by `occurred_at`, which is the platform's own
/// stated event time, not wall-clock receipt time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedAuditEvent {
    pub external_id: String,
    pub actor_email: Option<String>,
    pub action: String,
    pub occurred_at: DateTime<Utc>,
    pub target_count: u32,
    pub data_access_patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CredentialValidation {
    pub valid: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub missing_permissions: Vec<String>,
    pub rate_limit_remaining: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshedCredential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExportStatus {
    Pending,
    Ready,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportHandle {
    pub export_id: String,
    pub requested_range_start: DateTime<Utc>,
    pub requested_range_end: DateTime<Utc>,
}

/// One page of either automations or audit events, carrying the cursor a
/// caller must persist to resume after a restart. `items` is generic over
/// `RawAutomation` or `NormalizedAuditEvent` depending on which method
/// produced it.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AuditQuery {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
    pub cursor: Option<String>,
}
