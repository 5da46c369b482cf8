// [libs/domain/connectors/src/oauth.rs]
//! Authorization-code OAuth2 for the four platforms that use it
//! (Slack, Google, Microsoft, Jira). ChatGPT/Claude/Gemini authenticate
//! with a static API key handed to the connector directly and never go
//! through this module.

use chrono::Utc;
use serde::Deserialize;

use crate::errors::ConnectorError;
use crate::types::RefreshedCredential;
use aegis_domain_models::Platform;

struct OAuthEndpoints {
    authorize_url: &'static str,
    token_url: &'static str,
    scopes: &'static str,
}

fn endpoints(platform: Platform) -> Result<OAuthEndpoints, ConnectorError> {
    match platform {
        Platform::Slack => Ok(OAuthEndpoints {
            authorize_url: "https://slack.com/oauth/v2/authorize",
            token_url: "https://slack.com/api/oauth.v2.access",
            scopes: "apps:read,team:read",
        }),
        Platform::Google => Ok(OAuthEndpoints {
            authorize_url: "https://accounts.google.com/o/oauth2/v2/auth",
            token_url: "https://oauth2.googleapis.com/token",
            scopes: "https://www.googleapis.com/auth/admin.reports.audit.readonly",
        }),
        Platform::Microsoft => Ok(OAuthEndpoints {
            authorize_url: "https://login.microsoftonline.com/common/oauth2/v2.0/authorize",
            token_url: "https://login.microsoftonline.com/common/oauth2/v2.0/token",
            scopes: "AuditLog.Read.All offline_access",
        }),
        Platform::Jira => Ok(OAuthEndpoints {
            authorize_url: "https://auth.atlassian.com/authorize",
            token_url: "https://auth.atlassian.com/oauth/token",
            scopes: "read:audit-log:jira offline_access",
        }),
        other => Err(ConnectorError::InvariantViolation(format!("{other:?} does not authenticate via OAuth2"))),
    }
}

/// Builds the authorization-code redirect URL a tenant's browser should
/// be sent to. `state` is the opaque, caller-generated CSRF token the
/// callback handler will verify.
pub fn authorize_url(platform: Platform, client_id: &str, redirect_uri: &str, state: &str) -> Result<String, ConnectorError> {
    let endpoints = endpoints(platform)?;
    Ok(format!(
        "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
        endpoints.authorize_url,
        urlencode(client_id),
        urlencode(redirect_uri),
        urlencode(endpoints.scopes),
        urlencode(state),
    ))
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

/// Exchanges an authorization code for tokens. One POST, no retry —
/// a failed exchange means the code was already consumed or expired and
/// the tenant must restart the authorization flow.
pub async fn exchange_code(
    platform: Platform,
    client_id: &str,
    client_secret: &str,
    code: &str,
    redirect_uri: &str,
) -> Result<RefreshedCredential, ConnectorError> {
    let endpoints = endpoints(platform)?;
    let client = reqwest::Client::builder().timeout(std::time::Duration::from_secs(30)).build()?;

    let response = client
        .post(endpoints.token_url)
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ])
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(ConnectorError::TransientPlatformError(format!("token exchange returned {}", response.status()), None));
    }

    let parsed: TokenResponse = response.json().await?;
    let expires_at = parsed.expires_in.map(|seconds| Utc::now() + chrono::Duration::seconds(seconds));

    Ok(RefreshedCredential { access_token: parsed.access_token, refresh_token: parsed.refresh_token, expires_at })
}

fn urlencode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(byte as char),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorize_url_embeds_state_and_client_id() {
        let url = authorize_url(Platform::Google, "client-123", "https://app.example.com/callback", "state-abc").unwrap();
        assert!(url.contains("client_id=client-123"));
        assert!(url.contains("state=state-abc"));
    }

    #[test]
    fn authorize_url_rejects_non_oauth_platforms() {
        assert!(authorize_url(Platform::Chatgpt, "x", "y", "z").is_err());
    }
}
