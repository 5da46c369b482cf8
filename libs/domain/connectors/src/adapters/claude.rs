// [libs/domain/connectors/src/adapters/claude.rs]
use aegis_domain_models::{DecryptedCredential, Platform};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use serde::Deserialize;
use tracing::instrument;

use crate::connector_trait::Connector;
use crate::errors::ConnectorError;
use crate::http::bearer_client;
use crate::types::{AuditQuery, CredentialValidation, NormalizedAuditEvent, Page, RawAutomation};

const USER_AGENT: &str = "Aegis-Connector-Claude/1.0";
const MAX_EXPORT_RANGE_DAYS: i64 = 180;
const PENDING_CURSOR_PREFIX: &str = "export:";

/// Claude Enterprise has no live audit feed: a range is requested as an
/// export job, polled until it materializes, then downloaded as one batch.
/// `get_audit_logs` still honors the same signature every other adapter
/// does — the export id rides inside `next_cursor` so a caller's normal
/// cursor-resume loop doubles as the poll loop, with each retry spaced out
/// by the job orchestrator's own backoff rather than this call blocking.
pub struct ClaudeConnector {
    api_base: String,
}

impl ClaudeConnector {
    pub fn new() -> Self {
        Self { api_base: "https://api.anthropic.com/v1/organizations/audit_log_exports".to_string() }
    }
}

impl Default for ClaudeConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl ClaudeConnector {
    pub fn with_base(api_base: String) -> Self {
        Self { api_base }
    }
}

#[derive(Deserialize)]
struct MembershipResponse {
    role: Option<String>,
}

#[derive(Deserialize)]
struct WorkspaceMembersResponse {
    data: Vec<WorkspaceMember>,
    has_more: bool,
    last_id: Option<String>,
}

#[derive(Deserialize)]
struct WorkspaceMember {
    workspace_id: String,
    workspace_name: Option<String>,
}

#[derive(Deserialize)]
struct CreateExportResponse {
    id: String,
    status: String,
}

#[derive(Deserialize)]
struct ExportStatusResponse {
    status: String,
    download_url: Option<String>,
}

#[derive(Deserialize)]
struct AuditLogEntry {
    id: String,
    actor_email: Option<String>,
    event_type: String,
    created_at: String,
}

#[async_trait]
impl Connector for ClaudeConnector {
    fn platform(&self) -> Platform {
        Platform::Claude
    }

    #[instrument(skip(self, credential))]
    async fn validate_credentials(&self, credential: &DecryptedCredential) -> Result<CredentialValidation, ConnectorError> {
        let client = bearer_client(credential, USER_AGENT)?;
        let response = client.get("https://api.anthropic.com/v1/organizations/me").send().await?;

        if !response.status().is_success() {
            return Ok(CredentialValidation { valid: false, ..Default::default() });
        }
        let _: MembershipResponse = response.json().await?;
        Ok(CredentialValidation { valid: true, expires_at: None, missing_permissions: Vec::new(), rate_limit_remaining: None })
    }

    #[instrument(skip(self, credential))]
    async fn discover_automations(
        &self,
        credential: &DecryptedCredential,
        cursor: Option<String>,
    ) -> Result<Page<RawAutomation>, ConnectorError> {
        let client = bearer_client(credential, USER_AGENT)?;
        let mut request = client.get("https://api.anthropic.com/v1/organizations/workspaces").query(&[("limit", "100")]);
        if let Some(cursor) = &cursor {
            request = request.query(&[("after_id", cursor.as_str())]);
        }

        let response = request.send().await?;
        let parsed: WorkspaceMembersResponse = response.json().await?;

        let items = parsed
            .data
            .into_iter()
            .map(|ws| RawAutomation {
                external_id: ws.workspace_id.clone(),
                name: ws.workspace_name.unwrap_or_else(|| ws.workspace_id.clone()),
                description: None,
                owner_email: None,
                owner_name: None,
                scopes: Vec::new(),
                created_at: None,
                last_triggered_at: None,
                trigger_type: Some("workspace".to_string()),
                client_id: Some(ws.workspace_id),
                user_agent: None,
                raw: serde_json::Value::Null,
            })
            .collect();

        Ok(Page { items, next_cursor: if parsed.has_more { parsed.last_id } else { None } })
    }

    #[instrument(skip(self, credential))]
    async fn get_audit_logs(&self, credential: &DecryptedCredential, query: AuditQuery) -> Result<Page<NormalizedAuditEvent>, ConnectorError> {
        if query.until - query.since > ChronoDuration::days(MAX_EXPORT_RANGE_DAYS) {
            return Err(ConnectorError::InvariantViolation(format!(
                "claude audit export range exceeds {MAX_EXPORT_RANGE_DAYS} days"
            )));
        }

        let client = bearer_client(credential, USER_AGENT)?;

        let export_id = match query.cursor.as_deref().and_then(|c| c.strip_prefix(PENDING_CURSOR_PREFIX)) {
            Some(existing) => existing.to_string(),
            None => {
                let response = client
                    .post(&self.api_base)
                    .json(&serde_json::json!({
                        "start_time": query.since.to_rfc3339(),
                        "end_time": query.until.to_rfc3339(),
                    }))
                    .send()
                    .await?;
                let created: CreateExportResponse = response.json().await?;
                if created.status == "failed" {
                    return Err(ConnectorError::TransientPlatformError("claude export creation failed".into(), Some(60)));
                }
                created.id
            }
        };

        let status_response = client.get(format!("{}/{}", self.api_base, export_id)).send().await?;
        let status: ExportStatusResponse = status_response.json().await?;

        match status.status.as_str() {
            "pending" | "in_progress" => Ok(Page { items: Vec::new(), next_cursor: Some(format!("{PENDING_CURSOR_PREFIX}{export_id}")) }),
            "failed" => Err(ConnectorError::TransientPlatformError("claude export failed".into(), Some(60))),
            _ => {
                let download_url = status
                    .download_url
                    .ok_or_else(|| ConnectorError::InvariantViolation("claude export ready with no download_url".into()))?;
                let body = client.get(&download_url).send().await?;
                let entries: Vec<AuditLogEntry> = body.json().await?;

                let items = entries
                    .into_iter()
                    .filter_map(|entry| {
                        Some(NormalizedAuditEvent {
                            external_id: entry.id,
                            actor_email: entry.actor_email,
                            action: entry.event_type,
                            occurred_at: chrono::DateTime::parse_from_rfc3339(&entry.created_at).ok()?.with_timezone(&Utc),
                            target_count: 1,
                            data_access_patterns: Vec::new(),
                        })
                    })
                    .collect();

                Ok(Page { items, next_cursor: None })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credential() -> DecryptedCredential {
        DecryptedCredential {
            connection_id: "conn-1".to_string(),
            platform: Platform::Claude,
            access_token: "test-token".to_string(),
            refresh_token: None,
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn get_audit_logs_rejects_ranges_over_180_days() {
        let connector = ClaudeConnector::with_base("http://localhost:0".to_string());
        let query = AuditQuery { since: Utc::now() - ChronoDuration::days(200), until: Utc::now(), cursor: None };

        let result = connector.get_audit_logs(&credential(), query).await;
        assert!(matches!(result, Err(ConnectorError::InvariantViolation(_))));
    }

    #[tokio::test]
    async fn get_audit_logs_creates_export_then_returns_pending_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"^/$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "export-1", "status": "pending"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/export-1$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "pending", "download_url": null})))
            .mount(&server)
            .await;

        let connector = ClaudeConnector::with_base(server.uri());
        let query = AuditQuery { since: Utc::now() - ChronoDuration::days(1), until: Utc::now(), cursor: None };
        let page = connector.get_audit_logs(&credential(), query).await.unwrap();

        assert!(page.items.is_empty());
        assert_eq!(page.next_cursor.as_deref(), Some("export:export-1"));
    }

    #[tokio::test]
    async fn get_audit_logs_resumes_pending_export_and_downloads_when_ready() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/export-1$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "ready",
                "download_url": format!("{}/download/export-1", server.uri()),
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/download/export-1$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
                "id": "evt-1",
                "actor_email": "user@corp.com",
                "event_type": "message_sent",
                "created_at": "2026-01-01T00:00:00Z",
            }])))
            .mount(&server)
            .await;

        let connector = ClaudeConnector::with_base(server.uri());
        let query = AuditQuery {
            since: Utc::now() - ChronoDuration::days(1),
            until: Utc::now(),
            cursor: Some("export:export-1".to_string()),
        };
        let page = connector.get_audit_logs(&credential(), query).await.unwrap();

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].actor_email.as_deref(), Some("user@corp.com"));
        assert!(page.next_cursor.is_none());
    }
}
