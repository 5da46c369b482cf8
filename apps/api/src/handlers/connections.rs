// [apps/api/src/handlers/connections.rs]
//! Connection lifecycle: OAuth initiate/callback, disconnect, and
//! on-demand discovery enqueue. `:platform` routes precede a
//! `PlatformConnection`'s existence (the row is only created once the
//! handshake completes); `:id` routes operate on an already-connected
//! platform.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use aegis_core_vault::VaultCryptoEngine;
use aegis_domain_connectors::oauth;
use aegis_domain_models::connection::{Capabilities, ConnectionStatus, Platform, PlatformConnection, SyncConfiguration};
use aegis_domain_models::credential::{CredentialStatus, EncryptedCredential};

use crate::errors::{db_not_found, ApiError};
use crate::middleware::TenantIdentity;
use crate::oauth_state::{self, OAuthStatePayload};
use crate::state::AppState;

fn parse_platform(raw: &str) -> Result<Platform, ApiError> {
    match raw.to_ascii_lowercase().as_str() {
        "slack" => Ok(Platform::Slack),
        "google" => Ok(Platform::Google),
        "microsoft" => Ok(Platform::Microsoft),
        "jira" => Ok(Platform::Jira),
        "chatgpt" => Ok(Platform::Chatgpt),
        "claude" => Ok(Platform::Claude),
        "gemini" => Ok(Platform::Gemini),
        _ => Err(ApiError::validation("unknown platform", serde_json::json!({ "platform": raw }))),
    }
}

/// Default capability bitmask per platform. Claude's audit trail is
/// satisfied entirely through export-and-poll, not a live stream.
fn default_capabilities(platform: Platform) -> u32 {
    let base = Capabilities::AUTH | Capabilities::LIST;
    let retrieval = if matches!(platform, Platform::Claude) { Capabilities::EXPORT } else { Capabilities::AUDIT_STREAM };
    (base | retrieval).0
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateRequest {
    pub redirect_uri: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateResponse {
    pub authorization_url: String,
    pub state: String,
}

/// `POST /connections/:platform` — builds the authorization redirect and
/// an opaque, tamper-evident `state` token the tenant's browser carries
/// through the identity provider and back to `callback`.
pub async fn initiate(
    State(state): State<AppState>,
    Extension(identity): Extension<TenantIdentity>,
    Path(platform_raw): Path<String>,
    Json(body): Json<InitiateRequest>,
) -> Result<Json<InitiateResponse>, ApiError> {
    let platform = parse_platform(&platform_raw)?;

    let oauth_client = state
        .settings
        .oauth_clients
        .get(&platform)
        .filter(|client| !client.client_id.is_empty())
        .ok_or_else(|| ApiError::validation("platform has no OAuth client configured", serde_json::json!({ "platform": platform_raw })))?;

    let payload = OAuthStatePayload {
        organization_id: identity.organization_id.clone(),
        platform: platform_raw.to_ascii_lowercase(),
        redirect_uri: body.redirect_uri.clone(),
        nonce: Uuid::new_v4().to_string(),
    };
    let state_token = oauth_state::encode(&payload, &state.settings.vault_master_key);

    let authorization_url = oauth::authorize_url(platform, &oauth_client.client_id, &body.redirect_uri, &state_token)
        .map_err(ApiError::from)?;

    Ok(Json(InitiateResponse { authorization_url, state: state_token }))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: String,
    pub state: String,
}

/// `GET /connections/:platform/callback` — the one place an authorization
/// code ever touches this process. Verifies `state`, exchanges the code,
/// seals the resulting tokens, then creates the connection row last so a
/// failed exchange never leaves a connection with no credential behind it.
pub async fn callback(
    State(state): State<AppState>,
    Path(platform_raw): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<PlatformConnection>, ApiError> {
    let platform = parse_platform(&platform_raw)?;

    let payload = oauth_state::decode(&query.state, &state.settings.vault_master_key)
        .map_err(|_| ApiError::unauthorized("OAuth state token failed verification"))?;
    if payload.platform != platform_raw.to_ascii_lowercase() {
        return Err(ApiError::unauthorized("OAuth state token does not match callback platform"));
    }

    let oauth_client = state
        .settings
        .oauth_clients
        .get(&platform)
        .ok_or_else(|| ApiError::internal("platform has no OAuth client configured"))?;

    let refreshed = oauth::exchange_code(platform, &oauth_client.client_id, &oauth_client.client_secret, &query.code, &payload.redirect_uri)
        .await
        .map_err(ApiError::from)?;

    let access_record = VaultCryptoEngine::encrypt(&refreshed.access_token, &state.settings.vault_master_key, state.settings.vault_key_version)?;
    let refresh_record = refreshed
        .refresh_token
        .as_deref()
        .map(|token| VaultCryptoEngine::encrypt(token, &state.settings.vault_master_key, state.settings.vault_key_version))
        .transpose()?;

    let display_name = format!("{platform_raw} connection");
    let connection = state
        .connections
        .create(&payload.organization_id, platform, &display_name, default_capabilities(platform), &SyncConfiguration::default())
        .await?;

    let credential_metadata = EncryptedCredential {
        connection_id: connection.id.clone(),
        token_type: "bearer".to_string(),
        scopes: Vec::new(),
        issued_at: Utc::now(),
        expires_at: refreshed.expires_at,
        platform_user_id: None,
        platform_workspace_id: None,
        status: CredentialStatus::Active,
        usage_count: 0,
        last_used_at: None,
        encryption_key_version: state.settings.vault_key_version,
    };
    state.credentials.upsert(&payload.organization_id, &connection.id, &credential_metadata, &access_record, refresh_record.as_ref()).await?;
    state.connections.update_status(&payload.organization_id, &connection.id, ConnectionStatus::Active, None).await?;

    state
        .job_broker
        .register_repeatable_discovery(&payload.organization_id, &connection.id, chrono::Duration::hours(state.settings.discovery_interval_hours as i64))
        .await?;
    state
        .job_broker
        .register_repeatable_feedback_review(&payload.organization_id, chrono::Duration::hours(state.settings.feedback_review_interval_hours as i64))
        .await?;

    Ok(Json(PlatformConnection { status: ConnectionStatus::Active, ..connection }))
}

/// `DELETE /connections/:id` — cascades to the credential row; discovered
/// automations survive a disconnect.
pub async fn disconnect(
    State(state): State<AppState>,
    Extension(identity): Extension<TenantIdentity>,
    Path(connection_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.connections.disconnect(&identity.organization_id, &connection_id).await.map_err(|error| db_not_found(error, "connection"))?;
    state.job_broker.cancel_connection_jobs(&connection_id).await?;
    state.discovery_runs.request_cancellation_for_connection(&identity.organization_id, &connection_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverResponse {
    pub job_id: String,
}

/// `POST /connections/:id/discover` — enqueues an on-demand discovery run
/// at higher-than-scheduled priority and hands back the jobId so the
/// caller can correlate it with the `discovery:progress` stream.
pub async fn discover(
    State(state): State<AppState>,
    Extension(identity): Extension<TenantIdentity>,
    Path(connection_id): Path<String>,
) -> Result<Json<DiscoverResponse>, ApiError> {
    state.connections.get(&identity.organization_id, &connection_id).await.map_err(|error| db_not_found(error, "connection"))?;
    let job = state.job_broker.enqueue_discovery(&identity.organization_id, &connection_id, 10).await?;
    Ok(Json(DiscoverResponse { job_id: job.id }))
}

pub async fn list(State(state): State<AppState>, Extension(identity): Extension<TenantIdentity>) -> Result<Json<Vec<PlatformConnection>>, ApiError> {
    let connections = state.connections.list(&identity.organization_id).await?;
    Ok(Json(connections))
}
