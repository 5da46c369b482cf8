// [libs/infra/db/src/repositories/feedback.rs]
use aegis_domain_models::{Feedback, FeedbackSentiment, FeedbackStatus, FeedbackType, OrganizationId};
use chrono::{DateTime, Utc};
use libsql::{params, Row};
use tracing::instrument;
use uuid::Uuid;

use crate::client::DbClient;
use crate::errors::DbError;

fn type_to_str(kind: FeedbackType) -> &'static str {
    match kind {
        FeedbackType::CorrectDetection => "correct_detection",
        FeedbackType::FalsePositive => "false_positive",
        FeedbackType::FalseNegative => "false_negative",
        FeedbackType::IncorrectClassification => "incorrect_classification",
        FeedbackType::IncorrectRiskScore => "incorrect_risk_score",
        FeedbackType::IncorrectAiProvider => "incorrect_ai_provider",
    }
}

fn type_from_str(value: &str) -> Result<FeedbackType, DbError> {
    match value {
        "correct_detection" => Ok(FeedbackType::CorrectDetection),
        "false_positive" => Ok(FeedbackType::FalsePositive),
        "false_negative" => Ok(FeedbackType::FalseNegative),
        "incorrect_classification" => Ok(FeedbackType::IncorrectClassification),
        "incorrect_risk_score" => Ok(FeedbackType::IncorrectRiskScore),
        "incorrect_ai_provider" => Ok(FeedbackType::IncorrectAiProvider),
        other => Err(DbError::MappingError(format!("unknown feedback type [{other}]"))),
    }
}

fn sentiment_to_str(sentiment: FeedbackSentiment) -> &'static str {
    match sentiment {
        FeedbackSentiment::Positive => "positive",
        FeedbackSentiment::Negative => "negative",
        FeedbackSentiment::Neutral => "neutral",
    }
}

fn sentiment_from_str(value: &str) -> Result<FeedbackSentiment, DbError> {
    match value {
        "positive" => Ok(FeedbackSentiment::Positive),
        "negative" => Ok(FeedbackSentiment::Negative),
        "neutral" => Ok(FeedbackSentiment::Neutral),
        other => Err(DbError::MappingError(format!("unknown feedback sentiment [{other}]"))),
    }
}

fn status_to_str(status: FeedbackStatus) -> &'static str {
    match status {
        FeedbackStatus::Pending => "pending",
        FeedbackStatus::Acknowledged => "acknowledged",
        FeedbackStatus::Resolved => "resolved",
        FeedbackStatus::Archived => "archived",
    }
}

fn status_from_str(value: &str) -> Result<FeedbackStatus, DbError> {
    match value {
        "pending" => Ok(FeedbackStatus::Pending),
        "acknowledged" => Ok(FeedbackStatus::Acknowledged),
        "resolved" => Ok(FeedbackStatus::Resolved),
        "archived" => Ok(FeedbackStatus::Archived),
        other => Err(DbError::MappingError(format!("unknown feedback status [{other}]"))),
    }
}

const SELECT_COLUMNS: &str = "id, organization_id, automation_id, user_id, user_email, feedback_type, sentiment, \
    comment, suggested_corrections, status, ml_metadata, created_at, updated_at";

fn map_row(row: &Row) -> Result<Feedback, DbError> {
    let corrections_raw: String = row.get(8)?;
    let ml_metadata_raw: String = row.get(10)?;

    Ok(Feedback {
        id: row.get(0)?,
        organization_id: row.get::<String>(1)?,
        automation_id: row.get(2)?,
        user_id: row.get(3)?,
        user_email: row.get(4)?,
        feedback_type: type_from_str(&row.get::<String>(5)?)?,
        sentiment: sentiment_from_str(&row.get::<String>(6)?)?,
        comment: row.get(7)?,
        suggested_corrections: serde_json::from_str(&corrections_raw).map_err(|e| DbError::MappingError(e.to_string()))?,
        status: status_from_str(&row.get::<String>(9)?)?,
        ml_metadata: serde_json::from_str(&ml_metadata_raw).map_err(|e| DbError::MappingError(e.to_string()))?,
        created_at: DateTime::parse_from_rfc3339(&row.get::<String>(11)?)
            .map_err(|e| DbError::MappingError(e.to_string()))?
            .with_timezone(&Utc),
        updated_at: DateTime::parse_from_rfc3339(&row.get::<String>(12)?)
            .map_err(|e| DbError::MappingError(e.to_string()))?
            .with_timezone(&Utc),
    })
}

pub struct FeedbackRepository {
    db: DbClient,
}

impl FeedbackRepository {
    pub fn new(db: DbClient) -> Self {
        Self { db }
    }

    #[instrument(skip(self, suggested_corrections, ml_metadata))]
    pub async fn create(
        &self,
        organization_id: &OrganizationId,
        automation_id: &str,
        user_id: &str,
        user_email: &str,
        feedback_type: FeedbackType,
        sentiment: FeedbackSentiment,
        comment: Option<&str>,
        suggested_corrections: &serde_json::Value,
        ml_metadata: &serde_json::Value,
    ) -> Result<Feedback, DbError> {
        let conn = self.db.get_connection()?;
        let id = Uuid::new_v4().to_string();
        let corrections_json = serde_json::to_string(suggested_corrections).map_err(|e| DbError::MappingError(e.to_string()))?;
        let ml_metadata_json = serde_json::to_string(ml_metadata).map_err(|e| DbError::MappingError(e.to_string()))?;

        conn.execute(
            "INSERT INTO feedback (id, organization_id, automation_id, user_id, user_email, feedback_type, sentiment, comment, suggested_corrections, ml_metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                id.clone(),
                organization_id.clone(),
                automation_id,
                user_id,
                user_email,
                type_to_str(feedback_type),
                sentiment_to_str(sentiment),
                comment,
                corrections_json,
                ml_metadata_json,
            ],
        )
        .await?;

        self.get(organization_id, &id).await
    }

    pub async fn get(&self, organization_id: &OrganizationId, feedback_id: &str) -> Result<Feedback, DbError> {
        let conn = self.db.get_connection()?;
        let sql = format!("SELECT {SELECT_COLUMNS} FROM feedback WHERE organization_id = ?1 AND id = ?2");
        let mut rows = conn.query(&sql, params![organization_id.clone(), feedback_id]).await?;
        match rows.next().await? {
            Some(row) => map_row(&row),
            None => Err(DbError::NotFound),
        }
    }

    pub async fn list_for_automation(&self, organization_id: &OrganizationId, automation_id: &str) -> Result<Vec<Feedback>, DbError> {
        let conn = self.db.get_connection()?;
        let sql = format!("SELECT {SELECT_COLUMNS} FROM feedback WHERE organization_id = ?1 AND automation_id = ?2 ORDER BY created_at DESC");
        let mut rows = conn.query(&sql, params![organization_id.clone(), automation_id]).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(map_row(&row)?);
        }
        Ok(out)
    }

    /// Most-recent-first page, bounded by `limit` — backs the ML training
    /// batch export, which is capped at 100 rows per request.
    pub async fn list_recent(&self, organization_id: &OrganizationId, limit: u32) -> Result<Vec<Feedback>, DbError> {
        let conn = self.db.get_connection()?;
        let sql = format!("SELECT {SELECT_COLUMNS} FROM feedback WHERE organization_id = ?1 ORDER BY created_at DESC LIMIT ?2");
        let mut rows = conn.query(&sql, params![organization_id.clone(), limit as i64]).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(map_row(&row)?);
        }
        Ok(out)
    }

    /// Every row in `[since, until)`, tenant-wide — the feedback/RL loop's
    /// input for crystallizing one window's `FeedbackMetricsSnapshot`.
    pub async fn list_in_window(&self, organization_id: &OrganizationId, since: DateTime<Utc>, until: DateTime<Utc>) -> Result<Vec<Feedback>, DbError> {
        let conn = self.db.get_connection()?;
        let sql = format!("SELECT {SELECT_COLUMNS} FROM feedback WHERE organization_id = ?1 AND created_at >= ?2 AND created_at < ?3 ORDER BY created_at ASC");
        let mut rows = conn.query(&sql, params![organization_id.clone(), since.to_rfc3339(), until.to_rfc3339()]).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(map_row(&row)?);
        }
        Ok(out)
    }

    pub async fn list_pending(&self, organization_id: &OrganizationId) -> Result<Vec<Feedback>, DbError> {
        let conn = self.db.get_connection()?;
        let sql = format!("SELECT {SELECT_COLUMNS} FROM feedback WHERE organization_id = ?1 AND status = 'pending' ORDER BY created_at ASC");
        let mut rows = conn.query(&sql, params![organization_id.clone()]).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(map_row(&row)?);
        }
        Ok(out)
    }

    pub async fn update_status(&self, organization_id: &OrganizationId, feedback_id: &str, status: FeedbackStatus) -> Result<(), DbError> {
        let conn = self.db.get_connection()?;
        let changed = conn
            .execute(
                "UPDATE feedback SET status = ?1, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ','now') WHERE organization_id = ?2 AND id = ?3",
                params![status_to_str(status), organization_id.clone(), feedback_id],
            )
            .await?;
        if changed == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }
}
