// [libs/domain/models/src/event.rs]
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::connection::Platform;
use crate::risk_assessment::OverallRisk;

/// A transient record pushed on the event bus. Not durably stored —
/// a reconnecting subscriber reconciles state via the repository
/// layer, not by replaying past events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum BusEvent {
    #[serde(rename = "connection:update")]
    ConnectionUpdate {
        connection_id: String,
        status: String,
        platform: Platform,
        at: DateTime<Utc>,
        error: Option<String>,
    },
    #[serde(rename = "discovery:progress")]
    DiscoveryProgress {
        connection_id: String,
        progress: u8,
        status: String,
        items_found: u32,
        stage: Option<String>,
        at: DateTime<Utc>,
    },
    #[serde(rename = "automation:discovered")]
    AutomationDiscovered {
        automation_id: String,
        name: String,
        platform: Platform,
        risk_level: OverallRisk,
        at: DateTime<Utc>,
        risk_score: Option<u8>,
        automation_type: Option<String>,
    },
    #[serde(rename = "system:notification")]
    SystemNotification {
        level: String,
        message: String,
        at: DateTime<Utc>,
        title: Option<String>,
        details: Option<serde_json::Value>,
    },
}

impl BusEvent {
    /// Used by the back-pressure coalescing rule: progress events
    /// coalesce to last-value-wins per (connection, kind); discovery
    /// events never do.
    pub fn is_coalescible(&self) -> bool {
        matches!(self, BusEvent::DiscoveryProgress { .. } | BusEvent::ConnectionUpdate { .. })
    }

    pub fn coalesce_key(&self) -> Option<(String, &'static str)> {
        match self {
            BusEvent::DiscoveryProgress { connection_id, .. } => {
                Some((connection_id.clone(), "discovery:progress"))
            }
            BusEvent::ConnectionUpdate { connection_id, .. } => {
                Some((connection_id.clone(), "connection:update"))
            }
            _ => None,
        }
    }
}
