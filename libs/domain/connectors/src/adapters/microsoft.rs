// [libs/domain/connectors/src/adapters/microsoft.rs]
use aegis_domain_models::{DecryptedCredential, Platform};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::instrument;

use crate::connector_trait::Connector;
use crate::errors::ConnectorError;
use crate::http::bearer_client;
use crate::types::{AuditQuery, CredentialValidation, NormalizedAuditEvent, Page, RawAutomation, RefreshedCredential};

const USER_AGENT: &str = "Aegis-Connector-Microsoft/1.0";

pub struct MicrosoftConnector {
    graph_base: String,
    token_endpoint: String,
}

impl MicrosoftConnector {
    pub fn new() -> Self {
        Self {
            graph_base: "https://graph.microsoft.com/v1.0".to_string(),
            token_endpoint: "https://login.microsoftonline.com/common/oauth2/v2.0/token".to_string(),
        }
    }
}

impl Default for MicrosoftConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct ServicePrincipalListResponse {
    value: Vec<ServicePrincipal>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Deserialize)]
struct ServicePrincipal {
    #[serde(rename = "appId")]
    app_id: String,
    #[serde(rename = "displayName")]
    display_name: String,
    tags: Option<Vec<String>>,
    #[serde(rename = "oauth2PermissionScopes")]
    oauth2_permission_scopes: Option<Vec<MicrosoftScope>>,
}

#[derive(Deserialize)]
struct MicrosoftScope {
    value: String,
}

#[derive(Deserialize)]
struct SignInListResponse {
    value: Vec<SignInActivity>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Deserialize)]
struct SignInActivity {
    id: String,
    #[serde(rename = "createdDateTime")]
    created_date_time: String,
    #[serde(rename = "userPrincipalName")]
    user_principal_name: Option<String>,
    #[serde(rename = "appDisplayName")]
    app_display_name: Option<String>,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

#[async_trait]
impl Connector for MicrosoftConnector {
    fn platform(&self) -> Platform {
        Platform::Microsoft
    }

    #[instrument(skip(self, credential))]
    async fn validate_credentials(&self, credential: &DecryptedCredential) -> Result<CredentialValidation, ConnectorError> {
        let client = bearer_client(credential, USER_AGENT)?;
        let response = client.get(format!("{}/me", self.graph_base)).send().await?;

        match response.status() {
            reqwest::StatusCode::OK => Ok(CredentialValidation {
                valid: true,
                expires_at: credential.expires_at,
                missing_permissions: Vec::new(),
                rate_limit_remaining: None,
            }),
            reqwest::StatusCode::FORBIDDEN => Ok(CredentialValidation {
                valid: true,
                expires_at: credential.expires_at,
                missing_permissions: vec!["AuditLog.Read.All".to_string()],
                rate_limit_remaining: None,
            }),
            _ => Ok(CredentialValidation { valid: false, ..Default::default() }),
        }
    }

    #[instrument(skip(self, credential))]
    async fn discover_automations(
        &self,
        credential: &DecryptedCredential,
        cursor: Option<String>,
    ) -> Result<Page<RawAutomation>, ConnectorError> {
        let client = bearer_client(credential, USER_AGENT)?;
        let url = cursor.unwrap_or_else(|| {
            format!(
                "{}/servicePrincipals?$filter=tags/any(t:t eq 'WindowsAzureActiveDirectoryIntegratedApp')&$top=100",
                self.graph_base
            )
        });

        let response = client.get(&url).send().await?;
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ConnectorError::TransientPlatformError("graph throttled the request".into(), Some(30)));
        }
        let parsed: ServicePrincipalListResponse = response.json().await?;

        let items = parsed
            .value
            .into_iter()
            .map(|sp| RawAutomation {
                external_id: sp.app_id.clone(),
                name: sp.display_name,
                description: None,
                owner_email: None,
                owner_name: None,
                scopes: sp.oauth2_permission_scopes.unwrap_or_default().into_iter().map(|s| s.value).collect(),
                created_at: None,
                last_triggered_at: None,
                trigger_type: Some("service_principal".to_string()),
                client_id: Some(sp.app_id),
                user_agent: None,
                raw: serde_json::Value::Null,
            })
            .collect();

        Ok(Page { items, next_cursor: parsed.next_link })
    }

    #[instrument(skip(self, credential))]
    async fn get_audit_logs(&self, credential: &DecryptedCredential, query: AuditQuery) -> Result<Page<NormalizedAuditEvent>, ConnectorError> {
        let client = bearer_client(credential, USER_AGENT)?;
        let url = query.cursor.unwrap_or_else(|| {
            format!(
                "{}/auditLogs/signIns?$filter=createdDateTime ge {} and createdDateTime le {}",
                self.graph_base,
                query.since.to_rfc3339(),
                query.until.to_rfc3339()
            )
        });

        let response = client.get(&url).send().await?;
        let parsed: SignInListResponse = response.json().await?;

        let items = parsed
            .value
            .into_iter()
            .filter_map(|entry| {
                Some(NormalizedAuditEvent {
                    external_id: entry.id,
                    actor_email: entry.user_principal_name,
                    action: entry.app_display_name.unwrap_or_else(|| "sign_in".to_string()),
                    occurred_at: chrono::DateTime::parse_from_rfc3339(&entry.created_date_time).ok()?.with_timezone(&Utc),
                    target_count: 1,
                    data_access_patterns: Vec::new(),
                })
            })
            .collect();

        Ok(Page { items, next_cursor: parsed.next_link })
    }

    #[instrument(skip(self, credential))]
    async fn refresh_credentials(&self, credential: &DecryptedCredential) -> Result<RefreshedCredential, ConnectorError> {
        let refresh_token = credential
            .refresh_token
            .clone()
            .ok_or_else(|| ConnectorError::InvariantViolation("microsoft credential has no refresh token".into()))?;

        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
        let response = client
            .post(&self.token_endpoint)
            .form(&[("grant_type", "refresh_token"), ("refresh_token", refresh_token.as_str())])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::BAD_REQUEST {
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
