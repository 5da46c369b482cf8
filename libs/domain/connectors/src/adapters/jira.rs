// [libs/domain/connectors/src/adapters/jira.rs]
use aegis_domain_models::{DecryptedCredential, Platform};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::instrument;

use crate::connector_trait::Connector;
use crate::errors::ConnectorError;
use crate::http::bearer_client;
use crate::types::{AuditQuery, CredentialValidation, NormalizedAuditEvent, Page, RawAutomation, RefreshedCredential};

const USER_AGENT: &str = "Aegis-Connector-Jira/1.0";

pub struct JiraConnector {
    api_base: String,
    token_endpoint: String,
}

impl JiraConnector {
    pub fn new() -> Self {
        Self {
            api_base: "https://api.atlassian.com".to_string(),
            token_endpoint: "https://auth.atlassian.com/oauth/token".to_string(),
        }
    }
}

impl Default for JiraConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl JiraConnector {
    pub fn with_base(api_base: String, token_endpoint: String) -> Self {
        Self { api_base, token_endpoint }
    }
}

#[derive(Deserialize)]
struct AccessibleResource {
    id: String,
}

#[derive(Deserialize)]
struct InstalledAppsResponse {
    values: Vec<ConnectApp>,
    #[serde(rename = "isLast")]
    is_last: bool,
    #[serde(rename = "nextCursor")]
    next_cursor: Option<String>,
}

#[derive(Deserialize)]
struct ConnectApp {
    key: String,
    #[serde(rename = "appName")]
    app_name: String,
    #[serde(rename = "appKey")]
    app_key: Option<String>,
}

#[derive(Deserialize)]
struct AuditRecordsResponse {
    records: Vec<AuditRecord>,
    #[serde(rename = "_links")]
    links: Option<AuditLinks>,
}

#[derive(Deserialize)]
struct AuditLinks {
    next: Option<String>,
}

#[derive(Deserialize)]
struct AuditRecord {
    #[serde(rename = "guid")]
    guid: String,
    summary: String,
    created: String,
    author: Option<AuditAuthor>,
}

#[derive(Deserialize)]
struct AuditAuthor {
    email: Option<String>,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

#[async_trait]
impl Connector for JiraConnector {
    fn platform(&self) -> Platform {
        Platform::Jira
    }

    #[instrument(skip(self, credential))]
    async fn validate_credentials(&self, credential: &DecryptedCredential) -> Result<CredentialValidation, ConnectorError> {
        let client = bearer_client(credential, USER_AGENT)?;
        let response = client.get(format!("{}/oauth/token/accessible-resources", self.api_base)).send().await?;

        if !response.status().is_success() {
            return Ok(CredentialValidation { valid: false, ..Default::default() });
        }
        let resources: Vec<AccessibleResource> = response.json().await?;
        if resources.is_empty() {
            return Ok(CredentialValidation {
                valid: true,
                expires_at: credential.expires_at,
                missing_permissions: vec!["accessible-resources".to_string()],
                rate_limit_remaining: None,
            });
        }

        Ok(CredentialValidation { valid: true, expires_at: credential.expires_at, missing_permissions: Vec::new(), rate_limit_remaining: None })
    }

    #[instrument(skip(self, credential))]
    async fn discover_automations(
        &self,
        credential: &DecryptedCredential,
        cursor: Option<String>,
    ) -> Result<Page<RawAutomation>, ConnectorError> {
        let cloud_id = cloud_id_for(credential)?;
        let client = bearer_client(credential, USER_AGENT)?;
        let mut request = client.get(format!("{}/ex/jira/{}/rest/atlassian-connect/1/app/module/jiraProjectPage", self.api_base, cloud_id));
        if let Some(cursor) = &cursor {
            request = request.query(&[("cursor", cursor.as_str())]);
        }

        let response = request.send().await?;
        let parsed: InstalledAppsResponse = response.json().await?;

        let items = parsed
            .values
            .into_iter()
            .map(|app| RawAutomation {
                external_id: app.app_key.clone().unwrap_or_else(|| app.key.clone()),
                name: app.app_name,
                description: None,
                owner_email: None,
                owner_name: None,
                scopes: Vec::new(),
                created_at: None,
                last_triggered_at: None,
                trigger_type: Some("connect_app".to_string()),
                client_id: app.app_key,
                user_agent: None,
                raw: serde_json::Value::Null,
            })
            .collect();

        Ok(Page { items, next_cursor: if parsed.is_last { None } else { parsed.next_cursor } })
    }

    #[instrument(skip(self, credential))]
    async fn get_audit_logs(&self, credential: &DecryptedCredential, query: AuditQuery) -> Result<Page<NormalizedAuditEvent>, ConnectorError> {
        let cloud_id = cloud_id_for(credential)?;
        let client = bearer_client(credential, USER_AGENT)?;
        let mut request = client
            .get(format!("{}/ex/jira/{}/rest/api/3/auditing/record", self.api_base, cloud_id))
            .query(&[("from", query.since.to_rfc3339()), ("to", query.until.to_rfc3339())]);
        if let Some(cursor) = &query.cursor {
            request = request.query(&[("offset", cursor.as_str())]);
        }

        let response = request.send().await?;
        let parsed: AuditRecordsResponse = response.json().await?;

        let items = parsed
            .records
            .into_iter()
            .filter_map(|record| {
                Some(NormalizedAuditEvent {
                    external_id: record.guid,
                    actor_email: record.author.and_then(|a| a.email),
                    action: record.summary,
                    occurred_at: chrono::DateTime::parse_from_rfc3339(&record.created).ok()?.with_timezone(&Utc),
                    target_count: 1,
                    data_access_patterns: Vec::new(),
                })
            })
            .collect();

        Ok(Page { items, next_cursor: parsed.links.and_then(|l| l.next) })
    }

    #[instrument(skip(self, credential))]
    async fn refresh_credentials(&self, credential: &DecryptedCredential) -> Result<RefreshedCredential, ConnectorError> {
        let refresh_token = credential
            .refresh_token
            .clone()
            .ok_or_else(|| ConnectorError::InvariantViolation("jira credential has no refresh token".into()))?;

        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        let response = client
            .post(&self.token_endpoint)
            .json(&serde_json::json!({ "grant_type": "refresh_token", "refresh_token": refresh_token }))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ConnectorError::PermanentAuthFailure);
        }

        let parsed: RefreshResponse = response.json().await?;
        Ok(RefreshedCredential {
            access_token: parsed.access_token,
            refresh_token: parsed.refresh_token.or(Some(refresh_token)),
            expires_at: parsed.expires_in.map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
        })
    }
}

/// Jira's cloud id isn't a first-class `DecryptedCredential` field; it
/// travels as the connection id the same way Slack's team id does.
fn cloud_id_for(credential: &DecryptedCredential) -> Result<String, ConnectorError> {
    if credential.connection_id.is_empty() {
        return Err(ConnectorError::InvariantViolation("credential missing connection id".into()));
    }
    Ok(credential.connection_id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credential(connection_id: &str) -> DecryptedCredential {
        DecryptedCredential {
            connection_id: connection_id.to_string(),
            platform: Platform::Jira,
            access_token: "test-token".to_string(),
            refresh_token: Some("test-refresh".to_string()),
            expires_at: None,
        }
    }

    #[test]
    fn cloud_id_for_rejects_empty_connection_id() {
        assert!(cloud_id_for(&credential("")).is_err());
        assert_eq!(cloud_id_for(&credential("cloud-1")).unwrap(), "cloud-1");
    }

    #[tokio::test]
    async fn discover_automations_maps_connect_apps() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/ex/jira/.*/rest/atlassian-connect/1/app/module/jiraProjectPage$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "values": [{"key": "com.example.app", "appName": "Time Tracker", "appKey": "com.example.app"}],
                "isLast": true,
                "nextCursor": null,
            })))
            .mount(&server)
            .await;

        let connector = JiraConnector::with_base(server.uri(), format!("{}/oauth/token", server.uri()));
        let page = connector.discover_automations(&credential("cloud-1"), None).await.unwrap();

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].name, "Time Tracker");
        assert!(page.next_cursor.is_none());
    }
}
