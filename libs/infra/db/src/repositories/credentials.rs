// [libs/infra/db/src/repositories/credentials.rs]
use aegis_core_vault::EncryptedRecord;
use aegis_domain_models::{credential::CredentialStatus, EncryptedCredential, OrganizationId};
use chrono::Utc;
use libsql::params;
use tracing::instrument;

use crate::client::DbClient;
use crate::errors::DbError;

/// Plaintext sidecar persisted alongside the vault ciphertext. Every
/// field of `EncryptedCredential` except `connection_id` (the row key)
/// round-trips through this blob.
#[derive(serde::Serialize, serde::Deserialize)]
struct CredentialMetadata {
    token_type: String,
    scopes: Vec<String>,
    issued_at: chrono::DateTime<Utc>,
    expires_at: Option<chrono::DateTime<Utc>>,
    platform_user_id: Option<String>,
    platform_workspace_id: Option<String>,
    status: CredentialStatus,
    usage_count: u64,
    last_used_at: Option<chrono::DateTime<Utc>>,
    encryption_key_version: u32,
}

pub struct CredentialRepository {
    db: DbClient,
}

impl CredentialRepository {
    pub fn new(db: DbClient) -> Self {
        Self { db }
    }

    #[instrument(skip(self, access_record, refresh_record, metadata))]
    pub async fn upsert(
        &self,
        organization_id: &OrganizationId,
        connection_id: &str,
        metadata: &EncryptedCredential,
        access_record: &EncryptedRecord,
        refresh_record: Option<&EncryptedRecord>,
    ) -> Result<(), DbError> {
        let conn = self.db.get_connection()?;

        let meta = CredentialMetadata {
            token_type: metadata.token_type.clone(),
            scopes: metadata.scopes.clone(),
            issued_at: metadata.issued_at,
            expires_at: metadata.expires_at,
            platform_user_id: metadata.platform_user_id.clone(),
            platform_workspace_id: metadata.platform_workspace_id.clone(),
            status: metadata.status,
            usage_count: metadata.usage_count,
            last_used_at: metadata.last_used_at,
            encryption_key_version: metadata.encryption_key_version,
        };

        let metadata_json = serde_json::to_string(&meta).map_err(|e| DbError::MappingError(e.to_string()))?;
        let access_json = serde_json::to_string(access_record).map_err(|e| DbError::MappingError(e.to_string()))?;
        let refresh_json = refresh_record
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| DbError::MappingError(e.to_string()))?;

        conn.execute(
            "INSERT INTO credentials (connection_id, organization_id, ciphertext_access, ciphertext_refresh, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(connection_id) DO UPDATE SET
                ciphertext_access = excluded.ciphertext_access,
                ciphertext_refresh = excluded.ciphertext_refresh,
                metadata = excluded.metadata,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ','now')",
            params![connection_id, organization_id.clone(), access_json, refresh_json, metadata_json],
        )
        .await?;
        Ok(())
    }

    pub async fn get(
        &self,
        organization_id: &OrganizationId,
        connection_id: &str,
    ) -> Result<(EncryptedCredential, EncryptedRecord, Option<EncryptedRecord>), DbError> {
        let conn = self.db.get_connection()?;
        let mut rows = conn
            .query(
                "SELECT ciphertext_access, ciphertext_refresh, metadata FROM credentials
                 WHERE organization_id = ?1 AND connection_id = ?2",
                params![organization_id.clone(), connection_id],
            )
            .await?;

        let row = rows.next().await?.ok_or(DbError::NotFound)?;
        let access_raw: String = row.get(0)?;
        let refresh_raw: Option<String> = row.get(1)?;
        let metadata_raw: String = row.get(2)?;

        let access_record: EncryptedRecord =
            serde_json::from_str(&access_raw).map_err(|e| DbError::MappingError(e.to_string()))?;
        let refresh_record: Option<EncryptedRecord> = refresh_raw
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(|e| DbError::MappingError(e.to_string()))?;
        let meta: CredentialMetadata =
            serde_json::from_str(&metadata_raw).map_err(|e| DbError::MappingError(e.to_string()))?;

        let metadata = EncryptedCredential {
            connection_id: connection_id.to_string(),
            token_type: meta.token_type,
            scopes: meta.scopes,
            issued_at: meta.issued_at,
            expires_at: meta.expires_at,
            platform_user_id: meta.platform_user_id,
            platform_workspace_id: meta.platform_workspace_id,
            status: meta.status,
            usage_count: meta.usage_count,
            last_used_at: meta.last_used_at,
            encryption_key_version: meta.encryption_key_version,
        };

        Ok((metadata, access_record, refresh_record))
    }

    pub async fn mark_status(&self, organization_id: &OrganizationId, connection_id: &str, status: CredentialStatus) -> Result<(), DbError> {
        let (mut metadata, access, refresh) = self.get(organization_id, connection_id).await?;
        metadata.status = status;
        self.upsert(organization_id, connection_id, &metadata, &access, refresh.as_ref()).await
    }

    /// Bumps `usage_count` and `last_used_at` without re-encrypting — only
    /// the plaintext sidecar changes, the ciphertext stays bit-for-bit.
    pub async fn record_usage(&self, organization_id: &OrganizationId, connection_id: &str) -> Result<(), DbError> {
        let (mut metadata, access, refresh) = self.get(organization_id, connection_id).await?;
        metadata.usage_count += 1;
        metadata.last_used_at = Some(Utc::now());
        self.upsert(organization_id, connection_id, &metadata, &access, refresh.as_ref()).await
    }
}
