// [libs/infra/db/src/repositories/discovery_runs.rs]
use aegis_domain_models::{discovery_run::DiscoveryRunStats, DiscoveryRun, DiscoveryStage, OrganizationId, RunStatus};
use chrono::{DateTime, Utc};
use libsql::{params, Row};
use tracing::instrument;
use uuid::Uuid;

use crate::client::DbClient;
use crate::errors::DbError;

fn status_to_str(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Queued => "queued",
        RunStatus::Running => "running",
        RunStatus::Completed => "completed",
        RunStatus::Failed => "failed",
        RunStatus::Cancelled => "cancelled",
    }
}

fn status_from_str(value: &str) -> Result<RunStatus, DbError> {
    match value {
        "queued" => Ok(RunStatus::Queued),
        "running" => Ok(RunStatus::Running),
        "completed" => Ok(RunStatus::Completed),
        "failed" => Ok(RunStatus::Failed),
        "cancelled" => Ok(RunStatus::Cancelled),
        other => Err(DbError::MappingError(format!("unknown run status [{other}]"))),
    }
}

fn stage_to_str(stage: DiscoveryStage) -> &'static str {
    match stage {
        DiscoveryStage::Queued => "queued",
        DiscoveryStage::FetchingCredentials => "fetching_credentials",
        DiscoveryStage::Paginating => "paginating",
        DiscoveryStage::Normalizing => "normalizing",
        DiscoveryStage::Detecting => "detecting",
        DiscoveryStage::ScoringRisk => "scoring_risk",
        DiscoveryStage::Persisting => "persisting",
        DiscoveryStage::Done => "done",
    }
}

fn stage_from_str(value: &str) -> Result<DiscoveryStage, DbError> {
    match value {
        "queued" => Ok(DiscoveryStage::Queued),
        "fetching_credentials" => Ok(DiscoveryStage::FetchingCredentials),
        "paginating" => Ok(DiscoveryStage::Paginating),
        "normalizing" => Ok(DiscoveryStage::Normalizing),
        "detecting" => Ok(DiscoveryStage::Detecting),
        "scoring_risk" => Ok(DiscoveryStage::ScoringRisk),
        "persisting" => Ok(DiscoveryStage::Persisting),
        "done" => Ok(DiscoveryStage::Done),
        other => Err(DbError::MappingError(format!("unknown discovery stage [{other}]"))),
    }
}

const SELECT_COLUMNS: &str =
    "id, organization_id, connection_id, status, stage, started_at, completed_at, stats, algorithms_executed, cancel_requested";

fn map_row(row: &Row) -> Result<DiscoveryRun, DbError> {
    let completed_raw: Option<String> = row.get(6)?;
    let stats_raw: String = row.get(7)?;
    let algorithms_raw: String = row.get(8)?;

    Ok(DiscoveryRun {
        id: row.get(0)?,
        organization_id: row.get::<String>(1)?,
        connection_id: row.get(2)?,
        status: status_from_str(&row.get::<String>(3)?)?,
        stage: stage_from_str(&row.get::<String>(4)?)?,
        started_at: DateTime::parse_from_rfc3339(&row.get::<String>(5)?)
            .map_err(|e| DbError::MappingError(e.to_string()))?
            .with_timezone(&Utc),
        completed_at: completed_raw
            .map(|raw| DateTime::parse_from_rfc3339(&raw).map(|dt| dt.with_timezone(&Utc)))
            .transpose()
            .map_err(|e| DbError::MappingError(e.to_string()))?,
        stats: serde_json::from_str(&stats_raw).map_err(|e| DbError::MappingError(e.to_string()))?,
        algorithms_executed: serde_json::from_str(&algorithms_raw).map_err(|e| DbError::MappingError(e.to_string()))?,
        cancel_requested: row.get::<i64>(9)? != 0,
    })
}

pub struct DiscoveryRunRepository {
    db: DbClient,
}

impl DiscoveryRunRepository {
    pub fn new(db: DbClient) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn create(&self, organization_id: &OrganizationId, connection_id: &str) -> Result<DiscoveryRun, DbError> {
        let conn = self.db.get_connection()?;
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO discovery_runs (id, organization_id, connection_id, status, stage, started_at, stats, algorithms_executed)
             VALUES (?1, ?2, ?3, 'queued', 'queued', ?4, '{\"automations_found\":0,\"errors\":0}', '[]')",
            params![id.clone(), organization_id.clone(), connection_id, now],
        )
        .await?;
        self.get(organization_id, &id).await
    }

    pub async fn get(&self, organization_id: &OrganizationId, run_id: &str) -> Result<DiscoveryRun, DbError> {
        let conn = self.db.get_connection()?;
        let sql = format!("SELECT {SELECT_COLUMNS} FROM discovery_runs WHERE organization_id = ?1 AND id = ?2");
        let mut rows = conn.query(&sql, params![organization_id.clone(), run_id]).await?;
        match rows.next().await? {
            Some(row) => map_row(&row),
            None => Err(DbError::NotFound),
        }
    }

    pub async fn list_for_connection(
        &self,
        organization_id: &OrganizationId,
        connection_id: &str,
        limit: i64,
    ) -> Result<Vec<DiscoveryRun>, DbError> {
        let conn = self.db.get_connection()?;
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM discovery_runs WHERE organization_id = ?1 AND connection_id = ?2
             ORDER BY started_at DESC LIMIT ?3"
        );
        let mut rows = conn.query(&sql, params![organization_id.clone(), connection_id, limit]).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(map_row(&row)?);
        }
        Ok(out)
    }

    pub async fn advance_stage(
        &self,
        organization_id: &OrganizationId,
        run_id: &str,
        stage: DiscoveryStage,
    ) -> Result<(), DbError> {
        let conn = self.db.get_connection()?;
        let changed = conn
            .execute(
                "UPDATE discovery_runs SET stage = ?1, status = 'running' WHERE organization_id = ?2 AND id = ?3",
                params![stage_to_str(stage), organization_id.clone(), run_id],
            )
            .await?;
        if changed == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    /// Flags every non-terminal run on `connection_id` for cooperative
    /// cancellation. The worker only ever learns of this by polling —
    /// `apps/api` and `apps/worker` are separate processes, so there is no
    /// in-memory signal that could reach an in-flight run directly.
    #[instrument(skip(self))]
    pub async fn request_cancellation_for_connection(&self, organization_id: &OrganizationId, connection_id: &str) -> Result<u64, DbError> {
        let conn = self.db.get_connection()?;
        let changed = conn
            .execute(
                "UPDATE discovery_runs SET cancel_requested = 1
                 WHERE organization_id = ?1 AND connection_id = ?2 AND status IN ('queued', 'running')",
                params![organization_id.clone(), connection_id],
            )
            .await?;
        Ok(changed)
    }

    /// Cheap poll a pagination loop can afford to call between pages.
    pub async fn is_cancellation_requested(&self, organization_id: &OrganizationId, run_id: &str) -> Result<bool, DbError> {
        let conn = self.db.get_connection()?;
        let mut rows = conn
            .query(
                "SELECT cancel_requested FROM discovery_runs WHERE organization_id = ?1 AND id = ?2",
                params![organization_id.clone(), run_id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)? != 0),
            None => Err(DbError::NotFound),
        }
    }

    #[instrument(skip(self, algorithms_executed))]
    pub async fn complete(
        &self,
        organization_id: &OrganizationId,
        run_id: &str,
        status: RunStatus,
        stats: DiscoveryRunStats,
        algorithms_executed: &[String],
    ) -> Result<(), DbError> {
        let conn = self.db.get_connection()?;
        let stats_json = serde_json::to_string(&stats).map_err(|e| DbError::MappingError(e.to_string()))?;
        let algorithms_json = serde_json::to_string(algorithms_executed).map_err(|e| DbError::MappingError(e.to_string()))?;
        let changed = conn
            .execute(
                "UPDATE discovery_runs SET status = ?1, stage = 'done', completed_at = ?2, stats = ?3, algorithms_executed = ?4
                 WHERE organization_id = ?5 AND id = ?6",
                params![status_to_str(status), Utc::now().to_rfc3339(), stats_json, algorithms_json, organization_id.clone(), run_id],
            )
            .await?;
        if changed == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }
}
