// [libs/domain/connectors/src/adapters/chatgpt.rs]
use aegis_domain_models::{DecryptedCredential, Platform};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::instrument;

use crate::connector_trait::Connector;
use crate::errors::ConnectorError;
use crate::http::bearer_client;
use crate::types::{AuditQuery, CredentialValidation, NormalizedAuditEvent, Page, RawAutomation};

const USER_AGENT: &str = "Aegis-Connector-ChatGPT/1.0";

/// ChatGPT Enterprise/Team workspaces expose a Compliance API keyed by
/// workspace id. Like Slack, the API key is long-lived and non-refreshable,
/// so this adapter relies on the trait default for `refresh_credentials`.
pub struct ChatGptConnector {
    api_base: String,
}

impl ChatGptConnector {
    pub fn new() -> Self {
        Self { api_base: "https://api.chatgpt.com/v1/compliance".to_string() }
    }
}

impl Default for ChatGptConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct WorkspaceMembersResponse {
    object: String,
}

#[derive(Deserialize)]
struct GptsListResponse {
    data: Vec<WorkspaceGpt>,
    has_more: bool,
    last_id: Option<String>,
}

#[derive(Deserialize)]
struct WorkspaceGpt {
    id: String,
    name: String,
    description: Option<String>,
    created_at: Option<i64>,
    owner_email: Option<String>,
}

#[derive(Deserialize)]
struct ConversationsListResponse {
    data: Vec<ConversationEvent>,
    has_more: bool,
    last_id: Option<String>,
}

#[derive(Deserialize)]
struct ConversationEvent {
    id: String,
    user_email: Option<String>,
    title: Option<String>,
    create_time: f64,
}

#[async_trait]
impl Connector for ChatGptConnector {
    fn platform(&self) -> Platform {
        Platform::Chatgpt
    }

    #[instrument(skip(self, credential))]
    async fn validate_credentials(&self, credential: &DecryptedCredential) -> Result<CredentialValidation, ConnectorError> {
        let client = bearer_client(credential, USER_AGENT)?;
        let response = client.get(format!("{}/workspace", self.api_base)).send().await?;

        if !response.status().is_success() {
            return Ok(CredentialValidation { valid: false, ..Default::default() });
        }
        let _: WorkspaceMembersResponse = response.json().await?;
        Ok(CredentialValidation { valid: true, expires_at: None, missing_permissions: Vec::new(), rate_limit_remaining: None })
    }

    #[instrument(skip(self, credential))]
    async fn discover_automations(
        &self,
        credential: &DecryptedCredential,
        cursor: Option<String>,
    ) -> Result<Page<RawAutomation>, ConnectorError> {
        let client = bearer_client(credential, USER_AGENT)?;
        let mut request = client.get(format!("{}/gpts", self.api_base)).query(&[("limit", "100")]);
        if let Some(cursor) = &cursor {
            request = request.query(&[("after", cursor.as_str())]);
        }

        let response = request.send().await?;
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ConnectorError::TransientPlatformError("rate limited by chatgpt compliance api".into(), Some(20)));
        }
        let parsed: GptsListResponse = response.json().await?;

        let items = parsed
            .data
            .into_iter()
            .map(|gpt| RawAutomation {
                external_id: gpt.id.clone(),
                name: gpt.name,
                description: gpt.description,
                owner_email: gpt.owner_email,
                owner_name: None,
                scopes: Vec::new(),
                created_at: gpt.created_at.and_then(|ts| chrono::DateTime::from_timestamp(ts, 0)),
                last_triggered_at: None,
                trigger_type: Some("custom_gpt".to_string()),
                client_id: Some(gpt.id),
                user_agent: None,
                raw: serde_json::Value::Null,
            })
            .collect();

        Ok(Page { items, next_cursor: if parsed.has_more { parsed.last_id } else { None } })
    }

    #[instrument(skip(self, credential))]
    async fn get_audit_logs(&self, credential: &DecryptedCredential, query: AuditQuery) -> Result<Page<NormalizedAuditEvent>, ConnectorError> {
        let client = bearer_client(credential, USER_AGENT)?;
        let mut request = client
            .get(format!("{}/conversations", self.api_base))
            .query(&[("since_timestamp", query.since.timestamp().to_string()), ("until_timestamp", query.until.timestamp().to_string())]);
        if let Some(cursor) = &query.cursor {
            request = request.query(&[("after", cursor.as_str())]);
        }

        let response = request.send().await?;
        let parsed: ConversationsListResponse = response.json().await?;

        let items = parsed
            .data
            .into_iter()
            .map(|event| NormalizedAuditEvent {
                external_id: event.id,
                actor_email: event.user_email,
                action: event.title.unwrap_or_else(|| "conversation".to_string()),
                occurred_at: chrono::DateTime::from_timestamp(event.create_time as i64, 0).unwrap_or_else(Utc::now),
                target_count: 1,
                data_access_patterns: Vec::new(),
            })
            .collect();

        Ok(Page { items, next_cursor: if parsed.has_more { parsed.last_id } else { None } })
    }
}
