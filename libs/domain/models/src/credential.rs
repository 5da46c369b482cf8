// [libs/domain/models/src/credential.rs]
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::connection::Platform;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CredentialStatus {
    Active,
    Expired,
    Quarantined,
    Revoked,
}

/// Plaintext metadata persisted alongside the vault's encrypted ciphertext.
/// Never includes the access/refresh token themselves — those only ever
/// exist as `EncryptedRecord` (see `aegis-core-vault`) or, transiently,
/// inside a `DecryptedCredential` handed to a connector for one call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedCredential {
    pub connection_id: String,
    pub token_type: String,
    pub scopes: Vec<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub platform_user_id: Option<String>,
    pub platform_workspace_id: Option<String>,
    pub status: CredentialStatus,
    pub usage_count: u64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub encryption_key_version: u32,
}

impl EncryptedCredential {
    /// An `expiresAt` equal to exactly `now` is treated as expired, not as
    /// "expires this instant but still valid" — the boundary is inclusive.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= now,
            None => false,
        }
    }

    pub fn needs_refresh(&self, now: DateTime<Utc>, buffer_seconds: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => (expires_at - now).num_seconds() < buffer_seconds,
            None => false,
        }
    }
}

/// A decrypted credential handed to exactly one connector call. Callers
/// must not persist this or retain it across an `.await` suspension point.
#[derive(Debug, Clone)]
pub struct DecryptedCredential {
    pub connection_id: String,
    pub platform: Platform,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}
