// [libs/domain/connectors/src/errors.rs]
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("[CONNECTOR_TRANSIENT]: platform call failed, retryable -> {0}")]
    TransientPlatformError(String, Option<u64>),

    #[error("[CONNECTOR_AUTH_EXPIRED]: credential expired, refresh required")]
    ExpiredCredentials,

    #[error("[CONNECTOR_AUTH_DEAD]: refresh failed, connection must be re-authorized")]
    PermanentAuthFailure,

    #[error("[CONNECTOR_RATE_LIMITED]: platform rate limit hit, reset at {0}")]
    RateLimited(DateTime<Utc>),

    #[error("[CONNECTOR_SCOPE_GAP]: missing permissions {0:?}")]
    MissingPermissions(Vec<String>),

    #[error("[CONNECTOR_INVARIANT]: {0}")]
    InvariantViolation(String),

    #[error("[CONNECTOR_HTTP]: {0}")]
    Http(#[from] reqwest::Error),

    #[error("[CONNECTOR_DECODE]: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ConnectorError {
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            ConnectorError::TransientPlatformError(_, retry_after) => *retry_after,
            _ => None,
        }
    }
}
