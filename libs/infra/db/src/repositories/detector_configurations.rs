// [libs/infra/db/src/repositories/detector_configurations.rs]
use aegis_domain_models::{detector_configuration::DetectorCode, DetectorConfiguration, OrganizationId};
use chrono::{DateTime, Utc};
use libsql::{params, Row};
use tracing::instrument;
use uuid::Uuid;

use crate::client::DbClient;
use crate::errors::DbError;

fn code_to_str(code: DetectorCode) -> &'static str {
    match code {
        DetectorCode::Velocity => "velocity",
        DetectorCode::OffHours => "off_hours",
        DetectorCode::Batch => "batch",
        DetectorCode::AiProvider => "ai_provider",
    }
}

fn code_from_str(value: &str) -> Result<DetectorCode, DbError> {
    match value {
        "velocity" => Ok(DetectorCode::Velocity),
        "off_hours" => Ok(DetectorCode::OffHours),
        "batch" => Ok(DetectorCode::Batch),
        "ai_provider" => Ok(DetectorCode::AiProvider),
        other => Err(DbError::MappingError(format!("unknown detector code [{other}]"))),
    }
}

const SELECT_COLUMNS: &str = "id, organization_id, version, detector_code, thresholds, enabled, created_at";

fn map_row(row: &Row) -> Result<DetectorConfiguration, DbError> {
    let thresholds_raw: String = row.get(4)?;
    Ok(DetectorConfiguration {
        id: row.get(0)?,
        organization_id: row.get::<String>(1)?,
        version: row.get::<i64>(2)? as u32,
        detector_code: code_from_str(&row.get::<String>(3)?)?,
        thresholds: serde_json::from_str(&thresholds_raw).map_err(|e| DbError::MappingError(e.to_string()))?,
        enabled: row.get::<i64>(5)? != 0,
        created_at: DateTime::parse_from_rfc3339(&row.get::<String>(6)?)
            .map_err(|e| DbError::MappingError(e.to_string()))?
            .with_timezone(&Utc),
    })
}

pub struct DetectorConfigurationRepository {
    db: DbClient,
}

impl DetectorConfigurationRepository {
    pub fn new(db: DbClient) -> Self {
        Self { db }
    }

    pub async fn get_active(&self, organization_id: &OrganizationId, detector_code: DetectorCode) -> Result<Option<DetectorConfiguration>, DbError> {
        let conn = self.db.get_connection()?;
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM detector_configurations WHERE organization_id = ?1 AND detector_code = ?2
             ORDER BY version DESC LIMIT 1"
        );
        let mut rows = conn.query(&sql, params![organization_id.clone(), code_to_str(detector_code)]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(map_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Inserts a new version rather than mutating one in place — the
    /// previous version stays queryable so the feedback loop can diff a
    /// proposal against the configuration it would replace.
    #[instrument(skip(self, thresholds))]
    pub async fn create_version(
        &self,
        organization_id: &OrganizationId,
        detector_code: DetectorCode,
        thresholds: &serde_json::Value,
        enabled: bool,
    ) -> Result<DetectorConfiguration, DbError> {
        let conn = self.db.get_connection()?;
        let current = self.get_active(organization_id, detector_code).await?;
        let next_version = current.map(|c| c.version + 1).unwrap_or(1);
        let id = Uuid::new_v4().to_string();
        let thresholds_json = serde_json::to_string(thresholds).map_err(|e| DbError::MappingError(e.to_string()))?;

        conn.execute(
            "INSERT INTO detector_configurations (id, organization_id, version, detector_code, thresholds, enabled)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id.clone(), organization_id.clone(), next_version as i64, code_to_str(detector_code), thresholds_json, enabled as i64],
        )
        .await?;

        let sql = format!("SELECT {SELECT_COLUMNS} FROM detector_configurations WHERE id = ?1");
        let mut rows = conn.query(&sql, params![id]).await?;
        map_row(&rows.next().await?.ok_or(DbError::NotFound)?)
    }

    pub async fn list_versions(&self, organization_id: &OrganizationId, detector_code: DetectorCode) -> Result<Vec<DetectorConfiguration>, DbError> {
        let conn = self.db.get_connection()?;
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM detector_configurations WHERE organization_id = ?1 AND detector_code = ?2 ORDER BY version DESC"
        );
        let mut rows = conn.query(&sql, params![organization_id.clone(), code_to_str(detector_code)]).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(map_row(&row)?);
        }
        Ok(out)
    }
}
