// [libs/infra/db/src/repositories/risk_assessments.rs]
use aegis_domain_models::{risk_assessment::RiskHistoryPoint, OrganizationId, OverallRisk, RiskAssessment, RiskFactor};
use chrono::{DateTime, Utc};
use libsql::{params, Row};
use tracing::instrument;
use uuid::Uuid;

use crate::client::DbClient;
use crate::errors::DbError;

fn risk_to_str(risk: OverallRisk) -> &'static str {
    match risk {
        OverallRisk::Low => "low",
        OverallRisk::Medium => "medium",
        OverallRisk::High => "high",
        OverallRisk::Critical => "critical",
    }
}

fn risk_from_str(value: &str) -> Result<OverallRisk, DbError> {
    match value {
        "low" => Ok(OverallRisk::Low),
        "medium" => Ok(OverallRisk::Medium),
        "high" => Ok(OverallRisk::High),
        "critical" => Ok(OverallRisk::Critical),
        other => Err(DbError::MappingError(format!("unknown risk level [{other}]"))),
    }
}

const SELECT_COLUMNS: &str = "id, automation_id, organization_id, overall_risk, risk_score, risk_factors, assessed_at, assessor_version";

fn map_row(row: &Row) -> Result<RiskAssessment, DbError> {
    let factors_raw: String = row.get(5)?;
    Ok(RiskAssessment {
        id: row.get(0)?,
        automation_id: row.get(1)?,
        organization_id: row.get::<String>(2)?,
        overall_risk: risk_from_str(&row.get::<String>(3)?)?,
        risk_score: row.get::<i64>(4)? as u8,
        risk_factors: serde_json::from_str::<Vec<RiskFactor>>(&factors_raw).map_err(|e| DbError::MappingError(e.to_string()))?,
        assessed_at: DateTime::parse_from_rfc3339(&row.get::<String>(6)?)
            .map_err(|e| DbError::MappingError(e.to_string()))?
            .with_timezone(&Utc),
        assessor_version: row.get(7)?,
    })
}

pub struct RiskAssessmentRepository {
    db: DbClient,
}

impl RiskAssessmentRepository {
    pub fn new(db: DbClient) -> Self {
        Self { db }
    }

    /// Appends a new assessment row — history is append-only so trend
    /// queries over 7/30/90/365-day windows have a real timeline to read,
    /// not just the latest snapshot.
    #[instrument(skip(self, risk_factors))]
    pub async fn create(
        &self,
        organization_id: &OrganizationId,
        automation_id: &str,
        overall_risk: OverallRisk,
        risk_score: u8,
        risk_factors: &[RiskFactor],
        assessor_version: &str,
    ) -> Result<RiskAssessment, DbError> {
        let conn = self.db.get_connection()?;
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let factors_json = serde_json::to_string(risk_factors).map_err(|e| DbError::MappingError(e.to_string()))?;

        conn.execute(
            "INSERT INTO risk_assessments (id, automation_id, organization_id, overall_risk, risk_score, risk_factors, assessed_at, assessor_version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![id.clone(), automation_id, organization_id.clone(), risk_to_str(overall_risk), risk_score as i64, factors_json, now, assessor_version],
        )
        .await?;

        let sql = format!("SELECT {SELECT_COLUMNS} FROM risk_assessments WHERE id = ?1");
        let mut rows = conn.query(&sql, params![id]).await?;
        map_row(&rows.next().await?.ok_or(DbError::NotFound)?)
    }

    pub async fn latest_for_automation(&self, organization_id: &OrganizationId, automation_id: &str) -> Result<RiskAssessment, DbError> {
        let conn = self.db.get_connection()?;
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM risk_assessments WHERE organization_id = ?1 AND automation_id = ?2
             ORDER BY assessed_at DESC LIMIT 1"
        );
        let mut rows = conn.query(&sql, params![organization_id.clone(), automation_id]).await?;
        match rows.next().await? {
            Some(row) => map_row(&row),
            None => Err(DbError::NotFound),
        }
    }

    pub async fn history(
        &self,
        organization_id: &OrganizationId,
        automation_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<RiskHistoryPoint>, DbError> {
        let conn = self.db.get_connection()?;
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM risk_assessments WHERE organization_id = ?1 AND automation_id = ?2 AND assessed_at >= ?3
             ORDER BY assessed_at ASC"
        );
        let mut rows = conn.query(&sql, params![organization_id.clone(), automation_id, since.to_rfc3339()]).await?;

        let mut out = Vec::new();
        let mut previous_factors: Option<Vec<String>> = None;
        while let Some(row) = rows.next().await? {
            let assessment = map_row(&row)?;
            let current_codes: Vec<String> = assessment.risk_factors.iter().map(|f| f.code.clone()).collect();
            let changes = match &previous_factors {
                Some(prev) => current_codes.iter().filter(|c| !prev.contains(c)).cloned().collect(),
                None => Vec::new(),
            };
            out.push(RiskHistoryPoint {
                automation_id: assessment.automation_id.clone(),
                at: assessment.assessed_at,
                score: assessment.risk_score,
                overall_risk: assessment.overall_risk,
                changes,
            });
            previous_factors = Some(current_codes);
        }
        Ok(out)
    }
}
