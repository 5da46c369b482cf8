// [libs/infra/db/src/repositories/notifications.rs]
use aegis_domain_models::common::OrganizationId;
use aegis_domain_notification::{NotificationSeverity, SystemNotification};
use chrono::{DateTime, Utc};
use libsql::{params, Row};
use tracing::instrument;
use uuid::Uuid;

use crate::client::DbClient;
use crate::errors::DbError;

fn level_to_str(level: NotificationSeverity) -> &'static str {
    match level {
        NotificationSeverity::Info => "info",
        NotificationSeverity::Warning => "warning",
        NotificationSeverity::Critical => "critical",
    }
}

fn level_from_str(value: &str) -> Result<NotificationSeverity, DbError> {
    match value {
        "info" => Ok(NotificationSeverity::Info),
        "warning" => Ok(NotificationSeverity::Warning),
        "critical" => Ok(NotificationSeverity::Critical),
        other => Err(DbError::MappingError(format!("unknown notification severity [{other}]"))),
    }
}

const SELECT_COLUMNS: &str = "id, organization_id, level, title, message, details, is_read, created_at";

fn map_row(row: &Row) -> Result<SystemNotification, DbError> {
    let details_raw: Option<String> = row.get(5)?;
    Ok(SystemNotification {
        id: row.get(0)?,
        organization_id: row.get::<String>(1)?,
        level: level_from_str(&row.get::<String>(2)?)?,
        title: row.get(3)?,
        message: row.get(4)?,
        details: details_raw.map(|raw| serde_json::from_str(&raw)).transpose().map_err(|e| DbError::MappingError(e.to_string()))?,
        is_read: row.get::<i64>(6)? != 0,
        created_at: DateTime::parse_from_rfc3339(&row.get::<String>(7)?)
            .map_err(|e| DbError::MappingError(e.to_string()))?
            .with_timezone(&Utc),
    })
}

pub struct NotificationRepository {
    db: DbClient,
}

impl NotificationRepository {
    pub fn new(db: DbClient) -> Self {
        Self { db }
    }

    #[instrument(skip(self, notification))]
    pub async fn create(&self, notification: &SystemNotification) -> Result<SystemNotification, DbError> {
        let conn = self.db.get_connection()?;
        let id = if notification.id.is_empty() { Uuid::new_v4().to_string() } else { notification.id.clone() };
        let details_json = notification.details.as_ref().map(serde_json::to_string).transpose().map_err(|e| DbError::MappingError(e.to_string()))?;

        conn.execute(
            "INSERT INTO system_notifications (id, organization_id, level, title, message, details, is_read)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id.clone(),
                notification.organization_id.clone(),
                level_to_str(notification.level),
                notification.title.clone(),
                notification.message.clone(),
                details_json,
                notification.is_read as i64,
            ],
        )
        .await?;

        let sql = format!("SELECT {SELECT_COLUMNS} FROM system_notifications WHERE id = ?1");
        let mut rows = conn.query(&sql, params![id]).await?;
        map_row(&rows.next().await?.ok_or(DbError::NotFound)?)
    }

    pub async fn list(&self, organization_id: &OrganizationId, unread_only: bool) -> Result<Vec<SystemNotification>, DbError> {
        let conn = self.db.get_connection()?;
        let mut sql = format!("SELECT {SELECT_COLUMNS} FROM system_notifications WHERE organization_id = ?1");
        if unread_only {
            sql.push_str(" AND is_read = 0");
        }
        sql.push_str(" ORDER BY created_at DESC");

        let mut rows = conn.query(&sql, params![organization_id.clone()]).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(map_row(&row)?);
        }
        Ok(out)
    }

    pub async fn mark_read(&self, organization_id: &OrganizationId, notification_id: &str) -> Result<(), DbError> {
        let conn = self.db.get_connection()?;
        let changed = conn
            .execute(
                "UPDATE system_notifications SET is_read = 1 WHERE organization_id = ?1 AND id = ?2",
                params![organization_id.clone(), notification_id],
            )
            .await?;
        if changed == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }
}
