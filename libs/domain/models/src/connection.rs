// [libs/domain/models/src/connection.rs]
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::OrganizationId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Slack,
    Google,
    Microsoft,
    Jira,
    Chatgpt,
    Claude,
    Gemini,
}

impl Platform {
    /// Whether this platform's credentials support `refreshCredentials`.
    /// Slack bot tokens and ChatGPT Compliance API keys are long-lived and
    /// non-refreshable; every other adapter here refreshes via OAuth2.
    pub fn supports_refresh(self) -> bool {
        !matches!(self, Platform::Slack | Platform::Chatgpt)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Active,
    Pending,
    Error,
    Expired,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SyncConfiguration {
    pub cadence_hours: Option<u32>,
    pub targets: Vec<String>,
    pub filters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConnection {
    pub id: String,
    pub organization_id: OrganizationId,
    pub platform: Platform,
    pub display_name: String,
    pub status: ConnectionStatus,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_error_message: Option<String>,
    pub sync_configuration: SyncConfiguration,
    pub capabilities: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Capability bits a connector may satisfy. Not every platform satisfies
/// every capability (Slack has no export capability; Claude's audit
/// stream is satisfied entirely through `EXPORT`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities(pub u32);

impl Capabilities {
    pub const AUTH: Capabilities = Capabilities(0b0001);
    pub const LIST: Capabilities = Capabilities(0b0010);
    pub const AUDIT_STREAM: Capabilities = Capabilities(0b0100);
    pub const EXPORT: Capabilities = Capabilities(0b1000);

    pub fn contains(self, other: Capabilities) -> bool {
        (self.0 & other.0) == other.0
    }
}

impl std::ops::BitOr for Capabilities {
    type Output = Capabilities;
    fn bitor(self, rhs: Capabilities) -> Capabilities {
        Capabilities(self.0 | rhs.0)
    }
}
