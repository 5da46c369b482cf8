// [libs/domain/connectors/src/adapters/slack.rs]
use aegis_domain_models::{DecryptedCredential, Platform};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::{instrument, warn};

use crate::connector_trait::Connector;
use crate::errors::ConnectorError;
use crate::http::bearer_client;
use crate::types::{AuditQuery, CredentialValidation, NormalizedAuditEvent, Page, RawAutomation};

const USER_AGENT: &str = "Aegis-Connector-Slack/1.0";

/// Slack bot tokens are non-refreshable — this is the one adapter whose
/// `refresh_credentials` is never called; `Platform::supports_refresh`
/// reflects that at the vault boundary.
pub struct SlackConnector {
    api_base: String,
}

impl SlackConnector {
    pub fn new() -> Self {
        Self { api_base: "https://slack.com/api".to_string() }
    }

    #[cfg(test)]
    pub fn with_base(api_base: String) -> Self {
        Self { api_base }
    }
}

impl Default for SlackConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct AuthTestResponse {
    ok: bool,
    error: Option<String>,
}

#[derive(Deserialize)]
struct AppsApprovedResponse {
    ok: bool,
    approved: Option<Vec<SlackApprovedApp>>,
    response_metadata: Option<SlackResponseMetadata>,
}

#[derive(Deserialize)]
struct SlackResponseMetadata {
    next_cursor: Option<String>,
}

#[derive(Deserialize)]
struct SlackApprovedApp {
    app_id: String,
    app_name: String,
    description: Option<String>,
    scopes: Option<Vec<SlackScope>>,
    date_updated: Option<i64>,
    user: Option<SlackAppUser>,
}

#[derive(Deserialize)]
struct SlackScope {
    name: String,
}

#[derive(Deserialize)]
struct SlackAppUser {
    email: Option<String>,
    name: Option<String>,
}

#[async_trait]
impl Connector for SlackConnector {
    fn platform(&self) -> Platform {
        Platform::Slack
    }

    #[instrument(skip(self, credential))]
    async fn validate_credentials(&self, credential: &DecryptedCredential) -> Result<CredentialValidation, ConnectorError> {
        let client = bearer_client(credential, USER_AGENT)?;
        let response = client.post(format!("{}/auth.test", self.api_base)).send().await?;
        let parsed: AuthTestResponse = response.json().await?;

        if !parsed.ok {
            warn!("slack auth.test rejected: {:?}", parsed.error);
            return Ok(CredentialValidation { valid: false, ..Default::default() });
        }

        Ok(CredentialValidation { valid: true, expires_at: None, missing_permissions: Vec::new(), rate_limit_remaining: None })
    }

    #[instrument(skip(self, credential))]
    async fn discover_automations(
        &self,
        credential: &DecryptedCredential,
        cursor: Option<String>,
    ) -> Result<Page<RawAutomation>, ConnectorError> {
        let client = bearer_client(credential, USER_AGENT)?;
        let mut request = client.get(format!("{}/admin.apps.approved.list", self.api_base)).query(&[("limit", "200")]);
        if let Some(cursor) = &cursor {
            request = request.query(&[("cursor", cursor.as_str())]);
        }

        let response = request.send().await?;
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return Err(ConnectorError::TransientPlatformError("rate limited by slack".into(), retry_after));
        }

        let parsed: AppsApprovedResponse = response.json().await?;
        if !parsed.ok {
            return Err(ConnectorError::InvariantViolation("admin.apps.approved.list returned ok=false".into()));
        }

        let items = parsed
            .approved
            .unwrap_or_default()
            .into_iter()
            .map(|app| RawAutomation {
                external_id: app.app_id,
                name: app.app_name,
                description: app.description,
                owner_email: app.user.as_ref().and_then(|u| u.email.clone()),
                owner_name: app.user.as_ref().and_then(|u| u.name.clone()),
                scopes: app.scopes.unwrap_or_default().into_iter().map(|s| s.name).collect(),
                created_at: None,
                last_triggered_at: app.date_updated.and_then(|ts| chrono::DateTime::from_timestamp(ts, 0)),
                trigger_type: Some("oauth_app".to_string()),
                client_id: None,
                user_agent: None,
                raw: serde_json::Value::Null,
            })
            .collect();

        Ok(Page { items, next_cursor: parsed.response_metadata.and_then(|m| m.next_cursor).filter(|c| !c.is_empty()) })
    }

    /// Slack's Enterprise audit log is a live, cursor-paginated feed — no
    /// export step. `query.since`/`query.until` map directly to the
    /// `oldest`/`latest` query params.
    #[instrument(skip(self, credential))]
    async fn get_audit_logs(&self, credential: &DecryptedCredential, query: AuditQuery) -> Result<Page<NormalizedAuditEvent>, ConnectorError> {
        let client = bearer_client(credential, USER_AGENT)?;
        let mut request = client
            .get("https://api.slack.com/audit/v1/logs")
            .query(&[("oldest", query.since.timestamp().to_string()), ("latest", query.until.timestamp().to_string())]);
        if let Some(cursor) = &query.cursor {
            request = request.query(&[("cursor", cursor.as_str())]);
        }

        let response = request.send().await?;
        let body: serde_json::Value = response.json().await?;

        let entries = body.get("entries").and_then(|v| v.as_array()).cloned().unwrap_or_default();
        let items = entries
            .into_iter()
            .filter_map(|entry| {
                let action = entry.get("action")?.as_str()?.to_string();
                let occurred_at = entry.get("date_create")?.as_i64()?;
                Some(NormalizedAuditEvent {
                    external_id: entry.get("id").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                    actor_email: entry.pointer("/actor/user/email").and_then(|v| v.as_str()).map(String::from),
                    action,
                    occurred_at: chrono::DateTime::from_timestamp(occurred_at, 0).unwrap_or_else(Utc::now),
                    target_count: 1,
                    data_access_patterns: Vec::new(),
                })
            })
            .collect();

        let next_cursor = body.pointer("/response_metadata/next_cursor").and_then(|v| v.as_str()).filter(|c| !c.is_empty()).map(String::from);
        Ok(Page { items, next_cursor })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credential() -> DecryptedCredential {
        DecryptedCredential {
            connection_id: "conn-1".to_string(),
            platform: Platform::Slack,
            access_token: "xoxb-test".to_string(),
            refresh_token: None,
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn validate_credentials_rejects_auth_test_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth.test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": false, "error": "invalid_auth"})))
            .mount(&server)
            .await;

        let connector = SlackConnector::with_base(server.uri());
        let result = connector.validate_credentials(&credential()).await.unwrap();

        assert!(!result.valid);
    }

    #[tokio::test]
    async fn discover_automations_surfaces_rate_limit_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin.apps.approved.list"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "12"))
            .mount(&server)
            .await;

        let connector = SlackConnector::with_base(server.uri());
        let result = connector.discover_automations(&credential(), None).await;

        match result {
            Err(ConnectorError::TransientPlatformError(_, retry_after)) => assert_eq!(retry_after, Some(12)),
            other => panic!("expected transient rate-limit error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn discover_automations_maps_approved_apps() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/admin.apps.approved.list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "approved": [{
                    "app_id": "A123",
                    "app_name": "Otter.ai",
                    "description": "meeting transcription",
                    "scopes": [{"name": "channels:history"}],
                    "date_updated": 1_700_000_000,
                    "user": {"email": "owner@corp.com", "name": "Owner"},
                }],
                "response_metadata": {"next_cursor": ""},
            })))
            .mount(&server)
            .await;

        let connector = SlackConnector::with_base(server.uri());
        let page = connector.discover_automations(&credential(), None).await.unwrap();

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].name, "Otter.ai");
        assert_eq!(page.items[0].owner_email.as_deref(), Some("owner@corp.com"));
        assert!(page.next_cursor.is_none());
    }
}
