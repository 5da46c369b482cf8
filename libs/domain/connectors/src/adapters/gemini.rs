// [libs/domain/connectors/src/adapters/gemini.rs]
use aegis_domain_models::{DecryptedCredential, Platform};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::instrument;

use crate::connector_trait::Connector;
use crate::errors::ConnectorError;
use crate::http::bearer_client;
use crate::types::{AuditQuery, CredentialValidation, NormalizedAuditEvent, Page, RawAutomation, RefreshedCredential};

const USER_AGENT: &str = "Aegis-Connector-Gemini/1.0";

/// Gemini for Workspace / Vertex AI apps, distinct from the core Google
/// Workspace admin surface the `google` adapter covers: this one walks the
/// Cloud Resource Manager service-account inventory and Cloud Audit Logs,
/// scoped to the Gemini/Vertex AI API surfaces.
pub struct GeminiConnector {
    service_usage_base: String,
    logging_base: String,
    token_endpoint: String,
}

impl GeminiConnector {
    pub fn new() -> Self {
        Self {
            service_usage_base: "https://iam.googleapis.com/v1".to_string(),
            logging_base: "https://logging.googleapis.com/v2".to_string(),
            token_endpoint: "https://oauth2.googleapis.com/token".to_string(),
        }
    }
}

impl Default for GeminiConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct ServiceAccountsListResponse {
    accounts: Option<Vec<ServiceAccount>>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct ServiceAccount {
    #[serde(rename = "uniqueId")]
    unique_id: String,
    #[serde(rename = "displayName")]
    display_name: Option<String>,
    email: String,
    description: Option<String>,
}

#[derive(Deserialize)]
struct LogEntriesListResponse {
    entries: Option<Vec<LogEntry>>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct LogEntry {
    #[serde(rename = "insertId")]
    insert_id: String,
    timestamp: String,
    #[serde(rename = "protoPayload")]
    proto_payload: Option<ProtoPayload>,
}

#[derive(Deserialize)]
struct ProtoPayload {
    #[serde(rename = "methodName")]
    method_name: Option<String>,
    #[serde(rename = "authenticationInfo")]
    authentication_info: Option<AuthenticationInfo>,
}

#[derive(Deserialize)]
struct AuthenticationInfo {
    #[serde(rename = "principalEmail")]
    principal_email: Option<String>,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
    expires_in: Option<i64>,
}

#[async_trait]
impl Connector for GeminiConnector {
    fn platform(&self) -> Platform {
        Platform::Gemini
    }

    #[instrument(skip(self, credential))]
    async fn validate_credentials(&self, credential: &DecryptedCredential) -> Result<CredentialValidation, ConnectorError> {
        let client = bearer_client(credential, USER_AGENT)?;
        let response = client
            .get(format!("{}/projects/-/serviceAccounts", self.service_usage_base))
            .query(&[("pageSize", "1")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Ok(CredentialValidation { valid: false, ..Default::default() });
        }

        Ok(CredentialValidation { valid: true, expires_at: credential.expires_at, missing_permissions: Vec::new(), rate_limit_remaining: None })
    }

    #[instrument(skip(self, credential))]
    async fn discover_automations(
        &self,
        credential: &DecryptedCredential,
        cursor: Option<String>,
    ) -> Result<Page<RawAutomation>, ConnectorError> {
        let client = bearer_client(credential, USER_AGENT)?;
        let mut request = client.get(format!("{}/projects/-/serviceAccounts", self.service_usage_base)).query(&[("pageSize", "100")]);
        if let Some(cursor) = &cursor {
            request = request.query(&[("pageToken", cursor.as_str())]);
        }

        let response = request.send().await?;
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ConnectorError::TransientPlatformError("rate limited by iam api".into(), Some(30)));
        }
        let parsed: ServiceAccountsListResponse = response.json().await?;

        let items = parsed
            .accounts
            .unwrap_or_default()
            .into_iter()
            .map(|account| RawAutomation {
                external_id: account.unique_id.clone(),
                name: account.display_name.unwrap_or_else(|| account.email.clone()),
                description: account.description,
                owner_email: Some(account.email.clone()),
                owner_name: None,
                scopes: Vec::new(),
                created_at: None,
                last_triggered_at: None,
                trigger_type: Some("service_account".to_string()),
                client_id: Some(account.unique_id),
                user_agent: None,
                raw: serde_json::Value::Null,
            })
            .collect();

        Ok(Page { items, next_cursor: parsed.next_page_token })
    }

    #[instrument(skip(self, credential))]
    async fn get_audit_logs(&self, credential: &DecryptedCredential, query: AuditQuery) -> Result<Page<NormalizedAuditEvent>, ConnectorError> {
        let client = bearer_client(credential, USER_AGENT)?;
        let filter = format!(
            "protoPayload.serviceName=\"aiplatform.googleapis.com\" AND timestamp>=\"{}\" AND timestamp<=\"{}\"",
            query.since.to_rfc3339(),
            query.until.to_rfc3339()
        );
        let mut body = serde_json::json!({ "filter": filter, "pageSize": 200, "resourceNames": ["organizations/-"] });
        if let Some(cursor) = &query.cursor {
            body["pageToken"] = serde_json::Value::String(cursor.clone());
        }

        let response = client.post(format!("{}/entries:list", self.logging_base)).json(&body).send().await?;
        let parsed: LogEntriesListResponse = response.json().await?;

        let items = parsed
            .entries
            .unwrap_or_default()
            .into_iter()
            .filter_map(|entry| {
                Some(NormalizedAuditEvent {
                    external_id: entry.insert_id,
                    actor_email: entry.proto_payload.as_ref().and_then(|p| p.authentication_info.as_ref()).and_then(|a| a.principal_email.clone()),
                    action: entry.proto_payload.and_then(|p| p.method_name).unwrap_or_else(|| "aiplatform_call".to_string()),
                    occurred_at: chrono::DateTime::parse_from_rfc3339(&entry.timestamp).ok()?.with_timezone(&Utc),
                    target_count: 1,
                    data_access_patterns: Vec::new(),
                })
            })
            .collect();

        Ok(Page { items, next_cursor: parsed.next_page_token })
    }

    #[instrument(skip(self, credential))]
    async fn refresh_credentials(&self, credential: &DecryptedCredential) -> Result<RefreshedCredential, ConnectorError> {
        let refresh_token = credential
            .refresh_token
            .clone()
            .ok_or_else(|| ConnectorError::InvariantViolation("gemini credential has no refresh token".into()))?;

        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        let response = client
            .post(&self.token_endpoint)
            .form(&[("grant_type", "refresh_token"), ("refresh_token", refresh_token.as_str())])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ConnectorError::PermanentAuthFailure);
        }

        let parsed: RefreshResponse = response.json().await?;
        Ok(RefreshedCredential {
            access_token: parsed.access_token,
            refresh_token: Some(refresh_token),
            expires_at: parsed.expires_in.map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
        })
    }
}
