// [libs/infra/jobs/src/broker.rs]
use aegis_domain_models::common::OrganizationId;
use aegis_domain_models::job::{deterministic_job_id, Job, QueueName};
use aegis_infra_db::{DbClient, DbError};
use chrono::Duration;
use tracing::instrument;

use crate::repository::JobRepository;

const CRITICAL_NOTIFICATION_PRIORITY: i32 = 100;
const DEFAULT_NOTIFICATION_PRIORITY: i32 = 0;
const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Front door for the three-queue system: callers enqueue by intent
/// (discovery run, risk assessment, notification, repeatable discovery)
/// rather than poking the repository directly.
pub struct JobBroker {
    repository: JobRepository,
}

impl JobBroker {
    pub fn new(db: DbClient) -> Self {
        Self { repository: JobRepository::new(db) }
    }

    pub fn repository(&self) -> &JobRepository {
        &self.repository
    }

    #[instrument(skip(self))]
    pub async fn enqueue_discovery(&self, organization_id: &OrganizationId, connection_id: &str, priority: i32) -> Result<Job, DbError> {
        self.repository
            .enqueue(
                None,
                QueueName::Discovery,
                organization_id,
                serde_json::json!({ "connectionId": connection_id }),
                priority,
                DEFAULT_MAX_ATTEMPTS,
                None,
            )
            .await
    }

    /// Registers (or no-ops, if already registered) a periodic discovery
    /// job for a tenant-connection using a deterministic jobId so
    /// re-registration never double-schedules.
    #[instrument(skip(self))]
    pub async fn register_repeatable_discovery(&self, organization_id: &OrganizationId, connection_id: &str, cadence: Duration) -> Result<Job, DbError> {
        let id = deterministic_job_id(QueueName::Discovery, connection_id);
        self.repository
            .enqueue(
                Some(id),
                QueueName::Discovery,
                organization_id,
                serde_json::json!({ "connectionId": connection_id, "repeatable": true, "cadenceSeconds": cadence.num_seconds() }),
                DEFAULT_NOTIFICATION_PRIORITY,
                DEFAULT_MAX_ATTEMPTS,
                Some(cadence),
            )
            .await
    }

    /// Registers (or no-ops) the periodic feedback-review tick for a
    /// tenant on the notifications queue — there is no dedicated queue
    /// for the feedback/RL loop, so it rides alongside ordinary
    /// notification-creation jobs, distinguished by `payload.kind`.
    #[instrument(skip(self))]
    pub async fn register_repeatable_feedback_review(&self, organization_id: &OrganizationId, cadence: Duration) -> Result<Job, DbError> {
        let id = deterministic_job_id(QueueName::Notifications, &format!("feedback-review:{organization_id}"));
        self.repository
            .enqueue(
                Some(id),
                QueueName::Notifications,
                organization_id,
                serde_json::json!({ "kind": "feedback_review", "repeatable": true, "cadenceSeconds": cadence.num_seconds() }),
                DEFAULT_NOTIFICATION_PRIORITY,
                DEFAULT_MAX_ATTEMPTS,
                Some(cadence),
            )
            .await
    }

    /// Cross-queue chaining: a completed discovery job enqueues a
    /// risk-assessment job carrying `discoveryRunId` for lineage.
    #[instrument(skip(self))]
    pub async fn chain_risk_assessment(&self, organization_id: &OrganizationId, discovery_run_id: &str, automation_id: &str) -> Result<Job, DbError> {
        self.repository
            .enqueue(
                None,
                QueueName::RiskAssessment,
                organization_id,
                serde_json::json!({ "discoveryRunId": discovery_run_id, "automationId": automation_id }),
                DEFAULT_NOTIFICATION_PRIORITY,
                DEFAULT_MAX_ATTEMPTS,
                None,
            )
            .await
    }

    #[instrument(skip(self))]
    pub async fn enqueue_notification(
        &self,
        organization_id: &OrganizationId,
        discovery_run_id: &str,
        payload: serde_json::Value,
        critical: bool,
    ) -> Result<Job, DbError> {
        let mut body = payload;
        if let serde_json::Value::Object(ref mut map) = body {
            map.insert("discoveryRunId".to_string(), serde_json::Value::String(discovery_run_id.to_string()));
        }
        let priority = if critical { CRITICAL_NOTIFICATION_PRIORITY } else { DEFAULT_NOTIFICATION_PRIORITY };
        self.repository.enqueue(None, QueueName::Notifications, organization_id, body, priority, DEFAULT_MAX_ATTEMPTS, None).await
    }

    pub async fn claim_next(&self, queue: QueueName) -> Result<Option<Job>, DbError> {
        self.repository.claim_next(queue).await
    }

    pub async fn heartbeat(&self, id: &str) -> Result<(), DbError> {
        self.repository.heartbeat(id).await
    }

    pub async fn complete(&self, id: &str, result: serde_json::Value) -> Result<(), DbError> {
        self.repository.complete(id, result).await
    }

    pub async fn fail(&self, id: &str, error: &str) -> Result<aegis_domain_models::job::JobStatus, DbError> {
        self.repository.fail(id, error).await
    }

    /// Reschedules an active job at an explicit delay without consuming
    /// an attempt — used when a connector reports a rate limit with a
    /// known reset time rather than an ordinary transient failure, and
    /// optionally rewrites its payload (a paginating discovery job
    /// resumes from the cursor it had reached rather than restarting).
    pub async fn reschedule(&self, id: &str, delay: Duration, payload: Option<serde_json::Value>) -> Result<(), DbError> {
        self.repository.reschedule(id, delay, payload).await
    }

    pub async fn cancel_connection_jobs(&self, connection_id: &str) -> Result<u64, DbError> {
        self.repository.cancel_queued_for_connection(connection_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn broker() -> JobBroker {
        let db = DbClient::connect(":memory:", None).await.expect("connect");
        JobBroker::new(db)
    }

    #[tokio::test]
    async fn register_repeatable_discovery_is_idempotent_across_calls() {
        let broker = broker().await;
        let first = broker.register_repeatable_discovery(&"org-1".to_string(), "conn-1", Duration::hours(24)).await.expect("first");
        let second = broker.register_repeatable_discovery(&"org-1".to_string(), "conn-1", Duration::hours(24)).await.expect("second");
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn critical_notification_outranks_default_priority() {
        let broker = broker().await;
        broker.enqueue_notification(&"org-1".to_string(), "run-1", serde_json::json!({"msg": "low"}), false).await.expect("low");
        broker.enqueue_notification(&"org-1".to_string(), "run-1", serde_json::json!({"msg": "high"}), true).await.expect("high");

        let claimed = broker.claim_next(QueueName::Notifications).await.expect("claim").expect("a job");
        assert_eq!(claimed.payload["msg"], "high");
    }
}
