// [libs/infra/jobs/src/repository.rs]
use aegis_domain_models::job::{Job, JobStatus, QueueName};
use aegis_domain_models::common::OrganizationId;
use aegis_infra_db::{DbClient, DbError};
use chrono::{DateTime, Duration, Utc};
use libsql::{params, Row};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::backoff::compute_backoff;

fn queue_to_str(queue: QueueName) -> &'static str {
    queue.as_str()
}

fn queue_from_str(value: &str) -> Result<QueueName, DbError> {
    QueueName::parse(value).ok_or_else(|| DbError::MappingError(format!("unknown queue name [{value}]")))
}

fn status_to_str(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Queued => "queued",
        JobStatus::Active => "active",
        JobStatus::Completed => "completed",
        JobStatus::Failed => "failed",
    }
}

fn status_from_str(value: &str) -> Result<JobStatus, DbError> {
    match value {
        "queued" => Ok(JobStatus::Queued),
        "active" => Ok(JobStatus::Active),
        "completed" => Ok(JobStatus::Completed),
        "failed" => Ok(JobStatus::Failed),
        other => Err(DbError::MappingError(format!("unknown job status [{other}]"))),
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc)).map_err(|e| DbError::MappingError(e.to_string()))
}

const SELECT_COLUMNS: &str = "id, queue_name, organization_id, payload, priority, attempts, max_attempts, status, \
     scheduled_at, started_at, stalled_count, heartbeat_at, result, error, created_at, updated_at";

fn map_row(row: &Row) -> Result<Job, DbError> {
    let payload_raw: String = row.get(3)?;
    let started_raw: Option<String> = row.get(9)?;
    let heartbeat_raw: Option<String> = row.get(11)?;
    let result_raw: Option<String> = row.get(12)?;

    Ok(Job {
        id: row.get(0)?,
        queue_name: queue_from_str(&row.get::<String>(1)?)?,
        organization_id: row.get::<String>(2)?,
        payload: serde_json::from_str(&payload_raw).map_err(|e| DbError::MappingError(e.to_string()))?,
        priority: row.get(4)?,
        attempts: row.get::<i64>(5)? as u32,
        max_attempts: row.get::<i64>(6)? as u32,
        status: status_from_str(&row.get::<String>(7)?)?,
        scheduled_at: parse_timestamp(&row.get::<String>(8)?)?,
        started_at: started_raw.map(|raw| parse_timestamp(&raw)).transpose()?,
        stalled_count: row.get::<i64>(10)? as u32,
        heartbeat_at: heartbeat_raw.map(|raw| parse_timestamp(&raw)).transpose()?,
        result: result_raw.map(|raw| serde_json::from_str(&raw).map_err(|e| DbError::MappingError(e.to_string()))).transpose()?,
        error: row.get(13)?,
        created_at: parse_timestamp(&row.get::<String>(14)?)?,
        updated_at: parse_timestamp(&row.get::<String>(15)?)?,
    })
}

pub struct JobRepository {
    db: DbClient,
}

impl JobRepository {
    pub fn new(db: DbClient) -> Self {
        Self { db }
    }

    /// Inserts a job. If `deterministic_id` already exists and is still
    /// queued or active, this is a no-op (supports idempotent repeatable
    /// job re-registration).
    #[instrument(skip(self, payload))]
    pub async fn enqueue(
        &self,
        id: Option<String>,
        queue: QueueName,
        organization_id: &OrganizationId,
        payload: serde_json::Value,
        priority: i32,
        max_attempts: u32,
        delay: Option<Duration>,
    ) -> Result<Job, DbError> {
        let conn = self.db.get_connection()?;
        let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let scheduled_at = Utc::now() + delay.unwrap_or_else(Duration::zero);
        let payload_json = serde_json::to_string(&payload).map_err(|e| DbError::MappingError(e.to_string()))?;

        conn.execute(
            "INSERT INTO jobs (id, queue_name, organization_id, payload, priority, max_attempts, status, scheduled_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'queued', ?7)
             ON CONFLICT(id) DO NOTHING",
            params![id.clone(), queue_to_str(queue), organization_id.clone(), payload_json, priority, max_attempts, scheduled_at.to_rfc3339()],
        )
        .await?;

        self.get(&id).await
    }

    pub async fn get(&self, id: &str) -> Result<Job, DbError> {
        let conn = self.db.get_connection()?;
        let sql = format!("SELECT {SELECT_COLUMNS} FROM jobs WHERE id = ?1");
        let mut rows = conn.query(&sql, params![id]).await?;
        match rows.next().await? {
            Some(row) => map_row(&row),
            None => Err(DbError::NotFound),
        }
    }

    /// Atomically claims the highest-priority, earliest-scheduled queued
    /// job on `queue`, marking it active in the same statement.
    #[instrument(skip(self))]
    pub async fn claim_next(&self, queue: QueueName) -> Result<Option<Job>, DbError> {
        let conn = self.db.get_connection()?;
        let sql = format!(
            "UPDATE jobs SET status = 'active', attempts = attempts + 1, started_at = ?1, heartbeat_at = ?1, updated_at = ?1
             WHERE id = (
                 SELECT id FROM jobs
                 WHERE queue_name = ?2 AND status = 'queued' AND scheduled_at <= ?1
                 ORDER BY priority DESC, scheduled_at ASC
                 LIMIT 1
             )
             RETURNING {SELECT_COLUMNS}"
        );
        let now = Utc::now().to_rfc3339();
        let mut rows = conn.query(&sql, params![now, queue_to_str(queue)]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(map_row(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn heartbeat(&self, id: &str) -> Result<(), DbError> {
        let conn = self.db.get_connection()?;
        let changed = conn
            .execute(
                "UPDATE jobs SET heartbeat_at = ?1, updated_at = ?1 WHERE id = ?2 AND status = 'active'",
                params![Utc::now().to_rfc3339(), id],
            )
            .await?;
        if changed == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    pub async fn complete(&self, id: &str, result: serde_json::Value) -> Result<(), DbError> {
        let conn = self.db.get_connection()?;
        let result_json = serde_json::to_string(&result).map_err(|e| DbError::MappingError(e.to_string()))?;
        let changed = conn
            .execute(
                "UPDATE jobs SET status = 'completed', result = ?1, updated_at = ?2 WHERE id = ?3 AND status = 'active'",
                params![result_json, Utc::now().to_rfc3339(), id],
            )
            .await?;
        if changed == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    /// Reschedules with backoff if `attempts < max_attempts`, else marks
    /// terminally failed.
    #[instrument(skip(self))]
    pub async fn fail(&self, id: &str, error: &str) -> Result<JobStatus, DbError> {
        let job = self.get(id).await?;
        let conn = self.db.get_connection()?;
        let now = Utc::now();

        if job.attempts < job.max_attempts {
            let delay = compute_backoff(job.attempts);
            let changed = conn
                .execute(
                    "UPDATE jobs SET status = 'queued', scheduled_at = ?1, started_at = NULL, heartbeat_at = NULL, error = ?2, updated_at = ?3
                     WHERE id = ?4 AND status = 'active'",
                    params![(now + delay).to_rfc3339(), error, now.to_rfc3339(), id],
                )
                .await?;
            if changed == 0 {
                return Err(DbError::NotFound);
            }
            Ok(JobStatus::Queued)
        } else {
            let changed = conn
                .execute(
                    "UPDATE jobs SET status = 'failed', error = ?1, updated_at = ?2 WHERE id = ?3 AND status = 'active'",
                    params![error, now.to_rfc3339(), id],
                )
                .await?;
            if changed == 0 {
                return Err(DbError::NotFound);
            }
            Ok(JobStatus::Failed)
        }
    }

    /// Reschedules an active job at an explicit delay, leaving `attempts`
    /// untouched — a rate-limit pause is not a failed attempt. `payload`,
    /// when given, replaces the stored payload so a paginating job can
    /// persist its resume cursor before giving up the connector slot.
    #[instrument(skip(self, payload))]
    pub async fn reschedule(&self, id: &str, delay: Duration, payload: Option<serde_json::Value>) -> Result<(), DbError> {
        let conn = self.db.get_connection()?;
        let now = Utc::now();
        let scheduled_at = (now + delay).to_rfc3339();

        let changed = match payload {
            Some(payload) => {
                let payload_json = serde_json::to_string(&payload).map_err(|e| DbError::MappingError(e.to_string()))?;
                conn.execute(
                    "UPDATE jobs SET status = 'queued', scheduled_at = ?1, started_at = NULL, heartbeat_at = NULL, payload = ?2, updated_at = ?3
                     WHERE id = ?4 AND status = 'active'",
                    params![scheduled_at, payload_json, now.to_rfc3339(), id],
                )
                .await?
            }
            None => {
                conn.execute(
                    "UPDATE jobs SET status = 'queued', scheduled_at = ?1, started_at = NULL, heartbeat_at = NULL, updated_at = ?2
                     WHERE id = ?3 AND status = 'active'",
                    params![scheduled_at, now.to_rfc3339(), id],
                )
                .await?
            }
        };

        if changed == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    /// Requeues jobs active with a stale heartbeat. Returns the ids
    /// requeued so the caller can log/emit events for each.
    #[instrument(skip(self))]
    pub async fn requeue_stalled(&self, stalled_interval: Duration, max_stalled_count: u32) -> Result<Vec<String>, DbError> {
        let conn = self.db.get_connection()?;
        let threshold = (Utc::now() - stalled_interval).to_rfc3339();

        let mut rows = conn
            .query(
                "SELECT id, stalled_count FROM jobs WHERE status = 'active' AND (heartbeat_at IS NULL OR heartbeat_at < ?1)",
                params![threshold.clone()],
            )
            .await?;

        let mut stalled = Vec::new();
        while let Some(row) = rows.next().await? {
            let id: String = row.get(0)?;
            let stalled_count: i64 = row.get(1)?;
            stalled.push((id, stalled_count as u32));
        }

        let mut requeued = Vec::new();
        for (id, stalled_count) in stalled {
            if stalled_count + 1 >= max_stalled_count {
                conn.execute(
                    "UPDATE jobs SET status = 'failed', error = 'stalled past max_stalled_count', stalled_count = stalled_count + 1, updated_at = ?1
                     WHERE id = ?2 AND status = 'active'",
                    params![Utc::now().to_rfc3339(), id.clone()],
                )
                .await?;
                warn!("job [{id}] exceeded max stalled count, marked failed");
            } else {
                conn.execute(
                    "UPDATE jobs SET status = 'queued', stalled_count = stalled_count + 1, started_at = NULL, heartbeat_at = NULL, updated_at = ?1
                     WHERE id = ?2 AND status = 'active'",
                    params![Utc::now().to_rfc3339(), id.clone()],
                )
                .await?;
                requeued.push(id);
            }
        }

        Ok(requeued)
    }

    /// Trims completed/failed jobs per queue beyond the retention window,
    /// keeping the most recently updated rows.
    #[instrument(skip(self))]
    pub async fn trim_retention(&self, retention_completed: i64, retention_failed: i64) -> Result<(), DbError> {
        let conn = self.db.get_connection()?;
        for queue in [QueueName::Discovery, QueueName::RiskAssessment, QueueName::Notifications] {
            conn.execute(
                "DELETE FROM jobs WHERE queue_name = ?1 AND status = 'completed' AND id NOT IN (
                    SELECT id FROM jobs WHERE queue_name = ?1 AND status = 'completed' ORDER BY updated_at DESC LIMIT ?2
                )",
                params![queue_to_str(queue), retention_completed],
            )
            .await?;
            conn.execute(
                "DELETE FROM jobs WHERE queue_name = ?1 AND status = 'failed' AND id NOT IN (
                    SELECT id FROM jobs WHERE queue_name = ?1 AND status = 'failed' ORDER BY updated_at DESC LIMIT ?2
                )",
                params![queue_to_str(queue), retention_failed],
            )
            .await?;
        }
        Ok(())
    }

    /// Cancels every still-queued job for a connection (payload carries
    /// `connectionId`); active jobs are left for the worker's own
    /// suspension-point check.
    pub async fn cancel_queued_for_connection(&self, connection_id: &str) -> Result<u64, DbError> {
        let conn = self.db.get_connection()?;
        let changed = conn
            .execute(
                "UPDATE jobs SET status = 'failed', error = 'cancelled: connection removed', updated_at = ?1
                 WHERE status = 'queued' AND json_extract(payload, '$.connectionId') = ?2",
                params![Utc::now().to_rfc3339(), connection_id],
            )
            .await?;
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn repo() -> JobRepository {
        let db = DbClient::connect(":memory:", None).await.expect("connect");
        JobRepository::new(db)
    }

    #[tokio::test]
    async fn enqueue_and_claim_round_trips() {
        let repo = repo().await;
        repo.enqueue(None, QueueName::Discovery, &"org-1".to_string(), serde_json::json!({"connectionId": "c1"}), 0, 5, None)
            .await
            .expect("enqueue");

        let claimed = repo.claim_next(QueueName::Discovery).await.expect("claim").expect("a job");
        assert_eq!(claimed.status, JobStatus::Active);
        assert_eq!(claimed.attempts, 1);
    }

    #[tokio::test]
    async fn claim_returns_none_when_empty() {
        let repo = repo().await;
        assert!(repo.claim_next(QueueName::Discovery).await.expect("claim").is_none());
    }

    #[tokio::test]
    async fn repeatable_job_registration_is_idempotent() {
        let repo = repo().await;
        let id = "discovery:conn-1".to_string();
        repo.enqueue(Some(id.clone()), QueueName::Discovery, &"org-1".to_string(), serde_json::json!({}), 0, 5, None).await.expect("first");
        repo.enqueue(Some(id.clone()), QueueName::Discovery, &"org-1".to_string(), serde_json::json!({}), 0, 5, None).await.expect("second");

        let claimed_first = repo.claim_next(QueueName::Discovery).await.expect("claim").expect("a job");
        assert_eq!(claimed_first.id, id);
        assert!(repo.claim_next(QueueName::Discovery).await.expect("claim").is_none());
    }

    #[tokio::test]
    async fn fail_reschedules_until_max_attempts_then_terminates() {
        let repo = repo().await;
        let job = repo.enqueue(None, QueueName::Discovery, &"org-1".to_string(), serde_json::json!({}), 0, 1, None).await.expect("enqueue");

        repo.claim_next(QueueName::Discovery).await.expect("claim").expect("a job");
        let status = repo.fail(&job.id, "boom").await.expect("fail");
        assert_eq!(status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn reschedule_does_not_consume_an_attempt() {
        let repo = repo().await;
        let job = repo
            .enqueue(None, QueueName::Discovery, &"org-1".to_string(), serde_json::json!({"connectionId": "c1"}), 0, 5, None)
            .await
            .expect("enqueue");
        repo.claim_next(QueueName::Discovery).await.expect("claim");

        repo.reschedule(&job.id, Duration::seconds(60), Some(serde_json::json!({"connectionId": "c1", "cursor": "page-2"})))
            .await
            .expect("reschedule");

        let reloaded = repo.get(&job.id).await.expect("get");
        assert_eq!(reloaded.status, JobStatus::Queued);
        assert_eq!(reloaded.attempts, 1);
        assert_eq!(reloaded.payload["cursor"], "page-2");
    }

    #[tokio::test]
    async fn stalled_active_job_is_requeued() {
        let repo = repo().await;
        let job = repo.enqueue(None, QueueName::Discovery, &"org-1".to_string(), serde_json::json!({}), 0, 5, None).await.expect("enqueue");
        repo.claim_next(QueueName::Discovery).await.expect("claim");

        let conn = repo.db.get_connection().expect("conn");
        conn.execute(
            "UPDATE jobs SET heartbeat_at = ?1 WHERE id = ?2",
            params![(Utc::now() - Duration::seconds(120)).to_rfc3339(), job.id.clone()],
        )
        .await
        .expect("backdate heartbeat");

        let requeued = repo.requeue_stalled(Duration::seconds(30), 3).await.expect("requeue");
        assert_eq!(requeued, vec![job.id.clone()]);

        let reloaded = repo.get(&job.id).await.expect("get");
        assert_eq!(reloaded.status, JobStatus::Queued);
    }
}
