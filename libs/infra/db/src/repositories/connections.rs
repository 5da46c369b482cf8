// [libs/infra/db/src/repositories/connections.rs]
use aegis_domain_models::{ConnectionStatus, OrganizationId, Platform, PlatformConnection, SyncConfiguration};
use chrono::{DateTime, Utc};
use libsql::{params, Row};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::client::DbClient;
use crate::errors::DbError;

fn platform_to_str(platform: Platform) -> &'static str {
    match platform {
        Platform::Slack => "slack",
        Platform::Google => "google",
        Platform::Microsoft => "microsoft",
        Platform::Jira => "jira",
        Platform::Chatgpt => "chatgpt",
        Platform::Claude => "claude",
        Platform::Gemini => "gemini",
    }
}

fn platform_from_str(value: &str) -> Result<Platform, DbError> {
    match value {
        "slack" => Ok(Platform::Slack),
        "google" => Ok(Platform::Google),
        "microsoft" => Ok(Platform::Microsoft),
        "jira" => Ok(Platform::Jira),
        "chatgpt" => Ok(Platform::Chatgpt),
        "claude" => Ok(Platform::Claude),
        "gemini" => Ok(Platform::Gemini),
        other => Err(DbError::MappingError(format!("unknown platform [{other}]"))),
    }
}

fn status_to_str(status: ConnectionStatus) -> &'static str {
    match status {
        ConnectionStatus::Active => "active",
        ConnectionStatus::Pending => "pending",
        ConnectionStatus::Error => "error",
        ConnectionStatus::Expired => "expired",
        ConnectionStatus::Inactive => "inactive",
    }
}

fn status_from_str(value: &str) -> Result<ConnectionStatus, DbError> {
    match value {
        "active" => Ok(ConnectionStatus::Active),
        "pending" => Ok(ConnectionStatus::Pending),
        "error" => Ok(ConnectionStatus::Error),
        "expired" => Ok(ConnectionStatus::Expired),
        "inactive" => Ok(ConnectionStatus::Inactive),
        other => Err(DbError::MappingError(format!("unknown connection status [{other}]"))),
    }
}

fn map_row(row: &Row) -> Result<PlatformConnection, DbError> {
    let sync_config_raw: String = row.get(6)?;
    let last_sync_raw: Option<String> = row.get(7)?;

    Ok(PlatformConnection {
        id: row.get(0)?,
        organization_id: row.get::<String>(1)?,
        platform: platform_from_str(&row.get::<String>(2)?)?,
        display_name: row.get(3)?,
        status: status_from_str(&row.get::<String>(4)?)?,
        capabilities: row.get::<i64>(5)? as u32,
        sync_configuration: serde_json::from_str(&sync_config_raw)
            .map_err(|e| DbError::MappingError(format!("sync_config: {e}")))?,
        last_sync_at: last_sync_raw
            .map(|raw| DateTime::parse_from_rfc3339(&raw).map(|dt| dt.with_timezone(&Utc)))
            .transpose()
            .map_err(|e| DbError::MappingError(format!("last_sync_at: {e}")))?,
        last_error_message: row.get(8)?,
        created_at: DateTime::parse_from_rfc3339(&row.get::<String>(9)?)
            .map_err(|e| DbError::MappingError(format!("created_at: {e}")))?
            .with_timezone(&Utc),
        updated_at: DateTime::parse_from_rfc3339(&row.get::<String>(10)?)
            .map_err(|e| DbError::MappingError(format!("updated_at: {e}")))?
            .with_timezone(&Utc),
    })
}

const SELECT_COLUMNS: &str = "id, organization_id, platform, display_name, status, capabilities, \
    sync_config, last_sync_at, last_error, created_at, updated_at";

pub struct ConnectionRepository {
    db: DbClient,
}

impl ConnectionRepository {
    pub fn new(db: DbClient) -> Self {
        Self { db }
    }

    #[instrument(skip(self, sync_configuration))]
    pub async fn create(
        &self,
        organization_id: &OrganizationId,
        platform: Platform,
        display_name: &str,
        capabilities: u32,
        sync_configuration: &SyncConfiguration,
    ) -> Result<PlatformConnection, DbError> {
        let conn = self.db.get_connection()?;
        let id = Uuid::new_v4().to_string();
        let sync_config_json = serde_json::to_string(sync_configuration)
            .map_err(|e| DbError::MappingError(e.to_string()))?;

        conn.execute(
            "INSERT INTO connections (id, organization_id, platform, display_name, status, capabilities, sync_config)
             VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?6)",
            params![id.clone(), organization_id.clone(), platform_to_str(platform), display_name, capabilities as i64, sync_config_json],
        )
        .await
        .map_err(|e| {
            let message = e.to_string();
            if message.contains("UNIQUE") {
                DbError::UniqueViolation(format!("connection already active for platform {:?}", platform))
            } else {
                DbError::QueryError(e)
            }
        })?;

        info!("connection [{id}] registered for org [{organization_id}] on platform [{platform:?}]");
        self.get(organization_id, &id).await
    }

    pub async fn get(&self, organization_id: &OrganizationId, connection_id: &str) -> Result<PlatformConnection, DbError> {
        let conn = self.db.get_connection()?;
        let sql = format!("SELECT {SELECT_COLUMNS} FROM connections WHERE organization_id = ?1 AND id = ?2");
        let mut rows = conn.query(&sql, params![organization_id.clone(), connection_id]).await?;
        match rows.next().await? {
            Some(row) => map_row(&row),
            None => Err(DbError::NotFound),
        }
    }

    pub async fn list(&self, organization_id: &OrganizationId) -> Result<Vec<PlatformConnection>, DbError> {
        let conn = self.db.get_connection()?;
        let sql = format!("SELECT {SELECT_COLUMNS} FROM connections WHERE organization_id = ?1 ORDER BY created_at DESC");
        let mut rows = conn.query(&sql, params![organization_id.clone()]).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(map_row(&row)?);
        }
        Ok(out)
    }

    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        organization_id: &OrganizationId,
        connection_id: &str,
        status: ConnectionStatus,
        last_error_message: Option<&str>,
    ) -> Result<(), DbError> {
        let conn = self.db.get_connection()?;
        let changed = conn
            .execute(
                "UPDATE connections SET status = ?1, last_error = ?2, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ','now')
                 WHERE organization_id = ?3 AND id = ?4",
                params![status_to_str(status), last_error_message, organization_id.clone(), connection_id],
            )
            .await?;
        if changed == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    pub async fn record_sync(&self, organization_id: &OrganizationId, connection_id: &str, at: DateTime<Utc>) -> Result<(), DbError> {
        let conn = self.db.get_connection()?;
        let changed = conn
            .execute(
                "UPDATE connections SET last_sync_at = ?1, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ','now')
                 WHERE organization_id = ?2 AND id = ?3",
                params![at.to_rfc3339(), organization_id.clone(), connection_id],
            )
            .await?;
        if changed == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    /// Hard-delete cascade: removes the credential row and the connection
    /// itself. Discovered automations and their history are left intact —
    /// a disconnect is not a request to forget what was already found.
    #[instrument(skip(self))]
    pub async fn disconnect(&self, organization_id: &OrganizationId, connection_id: &str) -> Result<(), DbError> {
        let conn = self.db.get_connection()?;
        conn.execute(
            "DELETE FROM credentials WHERE connection_id IN (SELECT id FROM connections WHERE organization_id = ?1 AND id = ?2)",
            params![organization_id.clone(), connection_id],
        )
        .await?;
        let changed = conn
            .execute("DELETE FROM connections WHERE organization_id = ?1 AND id = ?2", params![organization_id.clone(), connection_id])
            .await?;
        if changed == 0 {
            return Err(DbError::NotFound);
        }
        info!("connection [{connection_id}] disconnected for org [{organization_id}]");
        Ok(())
    }
}
