// [libs/domain/connectors/src/adapters/google.rs]
use aegis_domain_models::{DecryptedCredential, Platform};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::instrument;

use crate::connector_trait::Connector;
use crate::errors::ConnectorError;
use crate::http::bearer_client;
use crate::types::{AuditQuery, CredentialValidation, NormalizedAuditEvent, Page, RawAutomation, RefreshedCredential};

const USER_AGENT: &str = "Aegis-Connector-Google/1.0";

pub struct GoogleConnector {
    tokeninfo_base: String,
    directory_base: String,
    reports_base: String,
    token_endpoint: String,
}

impl GoogleConnector {
    pub fn new() -> Self {
        Self {
            tokeninfo_base: "https://oauth2.googleapis.com/tokeninfo".to_string(),
            directory_base: "https://admin.googleapis.com/admin/directory/v1".to_string(),
            reports_base: "https://admin.googleapis.com/admin/reports/v1".to_string(),
            token_endpoint: "https://oauth2.googleapis.com/token".to_string(),
        }
    }
}

impl Default for GoogleConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl GoogleConnector {
    pub fn with_base(base: String) -> Self {
        Self {
            tokeninfo_base: format!("{base}/tokeninfo"),
            directory_base: base.clone(),
            reports_base: base.clone(),
            token_endpoint: format!("{base}/token"),
        }
    }
}

#[derive(Deserialize)]
struct TokenListResponse {
    items: Option<Vec<GoogleOAuthToken>>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct GoogleOAuthToken {
    #[serde(rename = "clientId")]
    client_id: String,
    #[serde(rename = "displayText")]
    display_text: Option<String>,
    scopes: Option<Vec<String>>,
    #[serde(rename = "userKey")]
    user_key: Option<String>,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
    expires_in: Option<i64>,
}

#[async_trait]
impl Connector for GoogleConnector {
    fn platform(&self) -> Platform {
        Platform::Google
    }

    #[instrument(skip(self, credential))]
    async fn validate_credentials(&self, credential: &DecryptedCredential) -> Result<CredentialValidation, ConnectorError> {
        let client = bearer_client(credential, USER_AGENT)?;
        let response = client.get(&self.tokeninfo_base).query(&[("access_token", credential.access_token.as_str())]).send().await?;

        if !response.status().is_success() {
            return Ok(CredentialValidation { valid: false, ..Default::default() });
        }

        #[derive(Deserialize)]
        struct TokenInfo {
            expires_in: Option<String>,
            scope: Option<String>,
        }
        let info: TokenInfo = response.json().await?;
        let expires_at = info
            .expires_in
            .and_then(|s| s.parse::<i64>().ok())
            .map(|secs| Utc::now() + chrono::Duration::seconds(secs));

        let mut missing_permissions = Vec::new();
        if info_has_narrow_scope(&info.scope) {
            missing_permissions.push("admin.directory.user.security.readonly".to_string());
        }

        Ok(CredentialValidation { valid: true, expires_at, missing_permissions, rate_limit_remaining: None })
    }

    #[instrument(skip(self, credential))]
    async fn discover_automations(
        &self,
        credential: &DecryptedCredential,
        cursor: Option<String>,
    ) -> Result<Page<RawAutomation>, ConnectorError> {
        let client = bearer_client(credential, USER_AGENT)?;
        let mut request = client.get(format!("{}/customer/my_customer/tokens", self.directory_base));
        if let Some(cursor) = &cursor {
            request = request.query(&[("pageToken", cursor.as_str())]);
        }

        let response = request.send().await?;
        if response.status() == reqwest::StatusCode::FORBIDDEN {
            return Err(ConnectorError::MissingPermissions(vec!["admin.directory.user.security.readonly".to_string()]));
        }
        let parsed: TokenListResponse = response.json().await?;

        let items = parsed
            .items
            .unwrap_or_default()
            .into_iter()
            .map(|token| RawAutomation {
                external_id: token.client_id.clone(),
                name: token.display_text.unwrap_or(token.client_id.clone()),
                description: None,
                owner_email: token.user_key.clone(),
                owner_name: None,
                scopes: token.scopes.unwrap_or_default(),
                created_at: None,
                last_triggered_at: None,
                trigger_type: Some("oauth_grant".to_string()),
                client_id: Some(token.client_id),
                user_agent: None,
                raw: serde_json::Value::Null,
            })
            .collect();

        Ok(Page { items, next_cursor: parsed.next_page_token })
    }

    #[instrument(skip(self, credential))]
    async fn get_audit_logs(&self, credential: &DecryptedCredential, query: AuditQuery) -> Result<Page<NormalizedAuditEvent>, ConnectorError> {
        let client = bearer_client(credential, USER_AGENT)?;
        let mut request = client
            .get(format!("{}/activity/users/all/applications/token", self.reports_base))
            .query(&[("startTime", query.since.to_rfc3339()), ("endTime", query.until.to_rfc3339())]);
        if let Some(cursor) = &query.cursor {
            request = request.query(&[("pageToken", cursor.as_str())]);
        }

        let response = request.send().await?;
        let body: serde_json::Value = response.json().await?;

        let items = body
            .get("items")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter_map(|activity| {
                let id = activity.get("id")?;
                let time = id.get("time")?.as_str()?;
                let actor_email = id.pointer("/actor/email").and_then(|v| v.as_str()).map(String::from);
                let unique_id = id.get("uniqueQualifier").and_then(|v| v.as_str()).unwrap_or_default().to_string();
                Some(NormalizedAuditEvent {
                    external_id: unique_id,
                    actor_email,
                    action: "token_authorized".to_string(),
                    occurred_at: chrono::DateTime::parse_from_rfc3339(time).ok()?.with_timezone(&Utc),
                    target_count: 1,
                    data_access_patterns: Vec::new(),
                })
            })
            .collect();

        let next_cursor = body.get("nextPageToken").and_then(|v| v.as_str()).map(String::from);
        Ok(Page { items, next_cursor })
    }

    #[instrument(skip(self, credential))]
    async fn refresh_credentials(&self, credential: &DecryptedCredential) -> Result<RefreshedCredential, ConnectorError> {
        let refresh_token = credential
            .refresh_token
            .clone()
            .ok_or_else(|| ConnectorError::InvariantViolation("google credential has no refresh token".into()))?;

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

fn info_has_narrow_scope(scope: &Option<String>) -> bool {
    match scope {
        Some(scope) => !scope.contains("admin.directory.user.security.readonly"),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credential(connection_id: &str) -> DecryptedCredential {
        DecryptedCredential {
            connection_id: connection_id.to_string(),
            platform: Platform::Google,
            access_token: "test-token".to_string(),
            refresh_token: Some("test-refresh".to_string()),
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn discover_automations_maps_tokens_to_raw_automations() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/customer/my_customer/tokens"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [{"clientId": "abc123", "displayText": "Zapier", "scopes": ["drive.readonly"], "userKey": "ana@corp.com"}],
                "nextPageToken": null,
            })))
            .mount(&server)
            .await;

        let connector = GoogleConnector::with_base(server.uri());
        let page = connector.discover_automations(&credential("conn-1"), None).await.unwrap();

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].external_id, "abc123");
        assert_eq!(page.items[0].owner_email.as_deref(), Some("ana@corp.com"));
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn discover_automations_surfaces_missing_permissions_on_403() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).and(path("/customer/my_customer/tokens")).respond_with(ResponseTemplate::new(403)).mount(&server).await;

        let connector = GoogleConnector::with_base(server.uri());
        let result = connector.discover_automations(&credential("conn-1"), None).await;

        assert!(matches!(result, Err(ConnectorError::MissingPermissions(_))));
    }

    #[test]
    fn info_has_narrow_scope_flags_missing_security_scope() {
        assert!(info_has_narrow_scope(&Some("drive.readonly".to_string())));
        assert!(!info_has_narrow_scope(&Some("admin.directory.user.security.readonly".to_string())));
        assert!(info_has_narrow_scope(&None));
    }
}
