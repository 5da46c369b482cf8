// [libs/infra/db/src/repositories/automations.rs]
use aegis_domain_models::automation::{AutomationStatus, AutomationType, DetectionMetadata, OwnerInfo};
use aegis_domain_models::{DiscoveredAutomation, OrganizationId};
use chrono::{DateTime, Utc};
use libsql::{params, Row};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::client::DbClient;
use crate::errors::DbError;

fn type_to_str(kind: AutomationType) -> &'static str {
    match kind {
        AutomationType::Bot => "bot",
        AutomationType::Workflow => "workflow",
        AutomationType::Integration => "integration",
        AutomationType::Webhook => "webhook",
        AutomationType::Script => "script",
        AutomationType::App => "app",
    }
}

fn type_from_str(value: &str) -> Result<AutomationType, DbError> {
    match value {
        "bot" => Ok(AutomationType::Bot),
        "workflow" => Ok(AutomationType::Workflow),
        "integration" => Ok(AutomationType::Integration),
        "webhook" => Ok(AutomationType::Webhook),
        "script" => Ok(AutomationType::Script),
        "app" => Ok(AutomationType::App),
        other => Err(DbError::MappingError(format!("unknown automation type [{other}]"))),
    }
}

fn status_to_str(status: AutomationStatus) -> &'static str {
    match status {
        AutomationStatus::Active => "active",
        AutomationStatus::Inactive => "inactive",
        AutomationStatus::Suspicious => "suspicious",
    }
}

fn status_from_str(value: &str) -> Result<AutomationStatus, DbError> {
    match value {
        "active" => Ok(AutomationStatus::Active),
        "inactive" => Ok(AutomationStatus::Inactive),
        "suspicious" => Ok(AutomationStatus::Suspicious),
        other => Err(DbError::MappingError(format!("unknown automation status [{other}]"))),
    }
}

const SELECT_COLUMNS: &str = "id, organization_id, connection_id, discovery_run_id, external_id, name, description, \
    automation_type, status, trigger_type, requested_permissions, data_access_patterns, owner_info, \
    platform_metadata, detection_metadata, first_discovered_at, last_seen_at, is_active, created_at, updated_at";

fn map_row(row: &Row) -> Result<DiscoveredAutomation, DbError> {
    let requested_permissions_raw: String = row.get(10)?;
    let data_access_patterns_raw: String = row.get(11)?;
    let owner_info_raw: String = row.get(12)?;
    let platform_metadata_raw: String = row.get(13)?;
    let detection_metadata_raw: String = row.get(14)?;

    Ok(DiscoveredAutomation {
        id: row.get(0)?,
        organization_id: row.get::<String>(1)?,
        connection_id: row.get(2)?,
        discovery_run_id: row.get(3)?,
        external_id: row.get(4)?,
        name: row.get(5)?,
        description: row.get(6)?,
        automation_type: type_from_str(&row.get::<String>(7)?)?,
        status: status_from_str(&row.get::<String>(8)?)?,
        trigger_type: row.get(9)?,
        requested_permissions: serde_json::from_str(&requested_permissions_raw).map_err(|e| DbError::MappingError(e.to_string()))?,
        data_access_patterns: serde_json::from_str(&data_access_patterns_raw).map_err(|e| DbError::MappingError(e.to_string()))?,
        owner_info: serde_json::from_str::<OwnerInfo>(&owner_info_raw).map_err(|e| DbError::MappingError(e.to_string()))?,
        platform_metadata: serde_json::from_str(&platform_metadata_raw).map_err(|e| DbError::MappingError(e.to_string()))?,
        detection_metadata: serde_json::from_str::<DetectionMetadata>(&detection_metadata_raw)
            .map_err(|e| DbError::MappingError(e.to_string()))?,
        first_discovered_at: DateTime::parse_from_rfc3339(&row.get::<String>(15)?)
            .map_err(|e| DbError::MappingError(e.to_string()))?
            .with_timezone(&Utc),
        last_seen_at: DateTime::parse_from_rfc3339(&row.get::<String>(16)?)
            .map_err(|e| DbError::MappingError(e.to_string()))?
            .with_timezone(&Utc),
        is_active: row.get::<i64>(17)? != 0,
        created_at: DateTime::parse_from_rfc3339(&row.get::<String>(18)?)
            .map_err(|e| DbError::MappingError(e.to_string()))?
            .with_timezone(&Utc),
        updated_at: DateTime::parse_from_rfc3339(&row.get::<String>(19)?)
            .map_err(|e| DbError::MappingError(e.to_string()))?
            .with_timezone(&Utc),
    })
}

pub struct AutomationRepository {
    db: DbClient,
}

impl AutomationRepository {
    pub fn new(db: DbClient) -> Self {
        Self { db }
    }

    /// Inserts a freshly discovered automation, or — keyed on
    /// `(organization_id, connection_id, external_id)` — refreshes an
    /// already-known one's `last_seen_at` and detection metadata without
    /// disturbing its id, its `first_discovered_at`, or any risk history
    /// rows that reference it. The returned `bool` is `true` only when no
    /// row existed yet, so a re-run that finds nothing new reports zero
    /// newly-found automations instead of re-counting every already-known
    /// one.
    #[instrument(skip(self, candidate))]
    pub async fn upsert_discovered(
        &self,
        organization_id: &OrganizationId,
        candidate: &DiscoveredAutomation,
    ) -> Result<(DiscoveredAutomation, bool), DbError> {
        let conn = self.db.get_connection()?;
        let id = Uuid::new_v4().to_string();

        let already_existed = {
            let mut rows = conn
                .query(
                    "SELECT 1 FROM automations WHERE organization_id = ?1 AND connection_id = ?2 AND external_id = ?3",
                    params![organization_id.clone(), candidate.connection_id.clone(), candidate.external_id.clone()],
                )
                .await?;
            rows.next().await?.is_some()
        };

        let requested_permissions_json =
            serde_json::to_string(&candidate.requested_permissions).map_err(|e| DbError::MappingError(e.to_string()))?;
        let data_access_patterns_json =
            serde_json::to_string(&candidate.data_access_patterns).map_err(|e| DbError::MappingError(e.to_string()))?;
        let owner_info_json = serde_json::to_string(&candidate.owner_info).map_err(|e| DbError::MappingError(e.to_string()))?;
        let platform_metadata_json =
            serde_json::to_string(&candidate.platform_metadata).map_err(|e| DbError::MappingError(e.to_string()))?;
        let detection_metadata_json =
            serde_json::to_string(&candidate.detection_metadata).map_err(|e| DbError::MappingError(e.to_string()))?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO automations (
                id, organization_id, connection_id, discovery_run_id, external_id, name, description,
                automation_type, status, trigger_type, requested_permissions, data_access_patterns,
                owner_info, platform_metadata, detection_metadata, first_discovered_at, last_seen_at, is_active
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?16, 1)
             ON CONFLICT(organization_id, connection_id, external_id) DO UPDATE SET
                discovery_run_id = excluded.discovery_run_id,
                name = excluded.name,
                description = excluded.description,
                status = excluded.status,
                requested_permissions = excluded.requested_permissions,
                data_access_patterns = excluded.data_access_patterns,
                owner_info = excluded.owner_info,
                platform_metadata = excluded.platform_metadata,
                detection_metadata = excluded.detection_metadata,
                last_seen_at = excluded.first_discovered_at,
                is_active = 1,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ','now')",
            params![
                id,
                organization_id.clone(),
                candidate.connection_id.clone(),
                candidate.discovery_run_id.clone(),
                candidate.external_id.clone(),
                candidate.name.clone(),
                candidate.description.clone(),
                type_to_str(candidate.automation_type),
                status_to_str(candidate.status),
                candidate.trigger_type.clone(),
                requested_permissions_json,
                data_access_patterns_json,
                owner_info_json,
                platform_metadata_json,
                detection_metadata_json,
                now,
            ],
        )
        .await?;

        let persisted = self.get_by_external_id(organization_id, &candidate.connection_id, &candidate.external_id).await?;
        Ok((persisted, !already_existed))
    }

    pub async fn get(&self, organization_id: &OrganizationId, automation_id: &str) -> Result<DiscoveredAutomation, DbError> {
        let conn = self.db.get_connection()?;
        let sql = format!("SELECT {SELECT_COLUMNS} FROM automations WHERE organization_id = ?1 AND id = ?2");
        let mut rows = conn.query(&sql, params![organization_id.clone(), automation_id]).await?;
        match rows.next().await? {
            Some(row) => map_row(&row),
            None => Err(DbError::NotFound),
        }
    }

    async fn get_by_external_id(
        &self,
        organization_id: &OrganizationId,
        connection_id: &str,
        external_id: &str,
    ) -> Result<DiscoveredAutomation, DbError> {
        let conn = self.db.get_connection()?;
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM automations WHERE organization_id = ?1 AND connection_id = ?2 AND external_id = ?3"
        );
        let mut rows = conn.query(&sql, params![organization_id.clone(), connection_id, external_id]).await?;
        match rows.next().await? {
            Some(row) => map_row(&row),
            None => Err(DbError::NotFound),
        }
    }

    pub async fn list(
        &self,
        organization_id: &OrganizationId,
        connection_id: Option<&str>,
        include_inactive: bool,
    ) -> Result<Vec<DiscoveredAutomation>, DbError> {
        let conn = self.db.get_connection()?;
        let mut sql = format!("SELECT {SELECT_COLUMNS} FROM automations WHERE organization_id = ?1");
        if connection_id.is_some() {
            sql.push_str(" AND connection_id = ?2");
        }
        if !include_inactive {
            sql.push_str(" AND is_active = 1");
        }
        sql.push_str(" ORDER BY last_seen_at DESC");

        let mut rows = match connection_id {
            Some(cid) => conn.query(&sql, params![organization_id.clone(), cid]).await?,
            None => conn.query(&sql, params![organization_id.clone()]).await?,
        };

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(map_row(&row)?);
        }
        Ok(out)
    }

    /// Soft-deletes every automation on `connection_id` that a just-finished
    /// run did not see — it stopped appearing in the upstream listing
    /// without the platform ever telling us why, so it is marked inactive
    /// rather than deleted.
    #[instrument(skip(self))]
    pub async fn mark_unseen_inactive(
        &self,
        organization_id: &OrganizationId,
        connection_id: &str,
        discovery_run_id: &str,
    ) -> Result<u64, DbError> {
        let conn = self.db.get_connection()?;
        let changed = conn
            .execute(
                "UPDATE automations SET is_active = 0, status = 'inactive', updated_at = strftime('%Y-%m-%dT%H:%M:%fZ','now')
                 WHERE organization_id = ?1 AND connection_id = ?2 AND discovery_run_id != ?3 AND is_active = 1",
                params![organization_id.clone(), connection_id, discovery_run_id],
            )
            .await?;
        Ok(changed)
    }

    pub async fn soft_delete(&self, organization_id: &OrganizationId, automation_id: &str) -> Result<(), DbError> {
        let conn = self.db.get_connection()?;
        let changed = conn
            .execute(
                "UPDATE automations SET is_active = 0, status = 'inactive', updated_at = strftime('%Y-%m-%dT%H:%M:%fZ','now')
                 WHERE organization_id = ?1 AND id = ?2",
                params![organization_id.clone(), automation_id],
            )
            .await?;
        if changed == 0 {
            return Err(DbError::NotFound);
        }
        info!("automation [{automation_id}] marked inactive for org [{organization_id}]");
        Ok(())
    }
}
