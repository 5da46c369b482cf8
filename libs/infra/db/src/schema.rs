// [libs/infra/db/src/schema.rs]
/*!
 * Idempotent schema bootstrap: every statement is `CREATE TABLE IF NOT
 * EXISTS` / `CREATE INDEX IF NOT EXISTS`, so repeated calls (every test,
 * every process start against a durable store) are no-ops past the
 * first.
 */

use anyhow::{Context, Result};
use libsql::Connection;
use tracing::{debug, info, instrument};

const TABLES: &[(&str, &str)] = &[
    ("connections", r#"
        CREATE TABLE IF NOT EXISTS connections (
            id TEXT PRIMARY KEY,
            organization_id TEXT NOT NULL,
            platform TEXT NOT NULL,
            display_name TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            capabilities INTEGER NOT NULL DEFAULT 0,
            sync_config TEXT NOT NULL DEFAULT '{}',
            last_sync_at TEXT,
            last_error TEXT,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
        );
    "#),
    ("connections_unique_active_platform", r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_connections_active_platform
        ON connections(organization_id, platform) WHERE status = 'active';
    "#),
    ("credentials", r#"
        CREATE TABLE IF NOT EXISTS credentials (
            connection_id TEXT PRIMARY KEY,
            organization_id TEXT NOT NULL,
            ciphertext_access TEXT NOT NULL,
            ciphertext_refresh TEXT,
            metadata TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
        );
    "#),
    ("discovery_runs", r#"
        CREATE TABLE IF NOT EXISTS discovery_runs (
            id TEXT PRIMARY KEY,
            organization_id TEXT NOT NULL,
            connection_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'queued',
            stage TEXT NOT NULL DEFAULT 'queued',
            started_at TEXT NOT NULL,
            completed_at TEXT,
            stats TEXT NOT NULL DEFAULT '{}',
            algorithms_executed TEXT NOT NULL DEFAULT '[]',
            cancel_requested INTEGER NOT NULL DEFAULT 0
        );
    "#),
    ("automations", r#"
        CREATE TABLE IF NOT EXISTS automations (
            id TEXT PRIMARY KEY,
            organization_id TEXT NOT NULL,
            connection_id TEXT NOT NULL,
            discovery_run_id TEXT NOT NULL,
            external_id TEXT NOT NULL,
            name TEXT NOT NULL,
            description TEXT,
            automation_type TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'active',
            trigger_type TEXT,
            requested_permissions TEXT NOT NULL DEFAULT '[]',
            data_access_patterns TEXT NOT NULL DEFAULT '[]',
            owner_info TEXT NOT NULL DEFAULT '{}',
            platform_metadata TEXT NOT NULL DEFAULT '{}',
            detection_metadata TEXT NOT NULL DEFAULT '{}',
            first_discovered_at TEXT NOT NULL,
            last_seen_at TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
            UNIQUE(organization_id, connection_id, external_id)
        );
    "#),
    ("risk_assessments", r#"
        CREATE TABLE IF NOT EXISTS risk_assessments (
            id TEXT PRIMARY KEY,
            automation_id TEXT NOT NULL,
            organization_id TEXT NOT NULL,
            overall_risk TEXT NOT NULL,
            risk_score INTEGER NOT NULL,
            risk_factors TEXT NOT NULL DEFAULT '[]',
            assessed_at TEXT NOT NULL,
            assessor_version TEXT NOT NULL
        );
    "#),
    ("feedback", r#"
        CREATE TABLE IF NOT EXISTS feedback (
            id TEXT PRIMARY KEY,
            organization_id TEXT NOT NULL,
            automation_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            user_email TEXT NOT NULL,
            feedback_type TEXT NOT NULL,
            sentiment TEXT NOT NULL,
            comment TEXT,
            suggested_corrections TEXT NOT NULL DEFAULT '{}',
            status TEXT NOT NULL DEFAULT 'pending',
            ml_metadata TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
        );
    "#),
    ("detector_configurations", r#"
        CREATE TABLE IF NOT EXISTS detector_configurations (
            id TEXT PRIMARY KEY,
            organization_id TEXT NOT NULL,
            version INTEGER NOT NULL,
            detector_code TEXT NOT NULL,
            thresholds TEXT NOT NULL DEFAULT '{}',
            enabled INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
        );
    "#),
    ("jobs", r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id TEXT PRIMARY KEY,
            queue_name TEXT NOT NULL,
            organization_id TEXT NOT NULL,
            payload TEXT NOT NULL,
            priority INTEGER NOT NULL DEFAULT 0,
            attempts INTEGER NOT NULL DEFAULT 0,
            max_attempts INTEGER NOT NULL DEFAULT 5,
            status TEXT NOT NULL DEFAULT 'queued',
            scheduled_at TEXT NOT NULL,
            started_at TEXT,
            stalled_count INTEGER NOT NULL DEFAULT 0,
            heartbeat_at TEXT,
            result TEXT,
            error TEXT,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now')),
            updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
        );
    "#),
    ("system_notifications", r#"
        CREATE TABLE IF NOT EXISTS system_notifications (
            id TEXT PRIMARY KEY,
            organization_id TEXT NOT NULL,
            level TEXT NOT NULL,
            title TEXT,
            message TEXT NOT NULL,
            details TEXT,
            is_read INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
        );
    "#),
];

const INDEXES: &[(&str, &str)] = &[
    ("idx_automations_org_connection", "CREATE INDEX IF NOT EXISTS idx_automations_org_connection ON automations(organization_id, connection_id);"),
    ("idx_automations_last_seen", "CREATE INDEX IF NOT EXISTS idx_automations_last_seen ON automations(organization_id, last_seen_at);"),
    ("idx_risk_assessments_automation", "CREATE INDEX IF NOT EXISTS idx_risk_assessments_automation ON risk_assessments(automation_id, assessed_at);"),
    ("idx_feedback_org", "CREATE INDEX IF NOT EXISTS idx_feedback_org ON feedback(organization_id, automation_id);"),
    ("idx_jobs_claim", "CREATE INDEX IF NOT EXISTS idx_jobs_claim ON jobs(queue_name, status, priority, scheduled_at);"),
    ("idx_jobs_org", "CREATE INDEX IF NOT EXISTS idx_jobs_org ON jobs(organization_id);"),
    ("idx_detector_config_org", "CREATE INDEX IF NOT EXISTS idx_detector_config_org ON detector_configurations(organization_id, detector_code, version);"),
    ("idx_system_notifications_org", "CREATE INDEX IF NOT EXISTS idx_system_notifications_org ON system_notifications(organization_id, created_at);"),
];

#[instrument(skip(conn))]
pub async fn apply_schema(conn: &Connection) -> Result<()> {
    info!("applying persistence schema");
    for (name, sql) in TABLES {
        debug!("  creating table: {name}");
        conn.execute(sql, ()).await.with_context(|| format!("failed creating {name}"))?;
    }
    for (name, sql) in INDEXES {
        debug!("  creating index: {name}");
        conn.execute(sql, ()).await.with_context(|| format!("failed creating {name}"))?;
    }
    info!("schema applied");
    Ok(())
}
