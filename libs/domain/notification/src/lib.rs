//! Notification grammar carried by `system:notification` bus events and
//! persisted for on-call / dashboard review.

use aegis_domain_models::common::OrganizationId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum NotificationSeverity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemNotification {
    pub id: String,
    pub organization_id: OrganizationId,
    pub level: NotificationSeverity,
    pub title: Option<String>,
    pub message: String,
    pub details: Option<serde_json::Value>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl SystemNotification {
    pub fn new(organization_id: OrganizationId, level: NotificationSeverity, message: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            organization_id,
            level,
            title: None,
            message: message.into(),
            details: None,
            is_read: false,
            created_at: Utc::now(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_notification_starts_unread() {
        let notification = SystemNotification::new("org-1".to_string(), NotificationSeverity::Critical, "model degraded");
        assert!(!notification.is_read);
        assert_eq!(notification.level, NotificationSeverity::Critical);
    }
}
