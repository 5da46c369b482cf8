// [apps/api/src/errors.rs]
//! The one error type that reaches the wire. Every lower-level error
//! collapses into this shape; internal detail never leaks past it.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use aegis_core_vault::VaultError;
use aegis_domain_connectors::ConnectorError;
use aegis_infra_db::DbError;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(rename = "statusCode")]
    #[serde(skip_serializing)]
    pub status_code: StatusCode,
    pub severity: ErrorSeverity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "fieldErrors")]
    pub field_errors: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
}

impl ApiError {
    pub fn new(status_code: StatusCode, code: impl Into<String>, message: impl Into<String>, severity: ErrorSeverity) -> Self {
        Self { code: code.into(), message: message.into(), status_code, severity, details: None, field_errors: None, suggestions: None }
    }

    /// 404s across connections/automations/feedback carry a
    /// resource-specific code (`"{RESOURCE}_NOT_FOUND"`) while still
    /// leaking no tenant detail in the message.
    pub fn not_found(resource: &str) -> Self {
        let upper = resource.to_uppercase();
        Self::new(StatusCode::NOT_FOUND, format!("{upper}_NOT_FOUND"), format!("{resource} not found"), ErrorSeverity::Warning)
    }

    pub fn validation(message: impl Into<String>, field_errors: serde_json::Value) -> Self {
        let mut error = Self::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", message, ErrorSeverity::Warning);
        error.field_errors = Some(field_errors);
        error
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message, ErrorSeverity::Warning)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_FAULT", message, ErrorSeverity::Critical)
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code;
        (status, Json(self)).into_response()
    }
}

/// Handlers call this instead of a blanket `?` when a `DbError::NotFound`
/// should surface with a resource-specific code — `ApiError::not_found`
/// can't infer the resource name from `DbError` alone.
pub fn db_not_found(error: DbError, resource: &str) -> ApiError {
    match error {
        DbError::NotFound => ApiError::not_found(resource),
        other => other.into(),
    }
}

impl From<DbError> for ApiError {
    fn from(error: DbError) -> Self {
        match error {
            DbError::NotFound => ApiError::not_found("resource"),
            DbError::UniqueViolation(detail) => {
                ApiError::new(StatusCode::CONFLICT, "ALREADY_EXISTS", "a conflicting resource already exists", ErrorSeverity::Warning)
                    .with_details(serde_json::json!({ "detail": detail }))
            }
            DbError::OptimisticConcurrencyConflict => {
                ApiError::new(StatusCode::CONFLICT, "CONCURRENT_UPDATE", "the resource changed underneath this write, retry", ErrorSeverity::Warning)
            }
            other => {
                tracing::error!("persistence failure: {other}");
                ApiError::internal("a persistence error occurred")
            }
        }
    }
}

impl From<ConnectorError> for ApiError {
    fn from(error: ConnectorError) -> Self {
        match error {
            ConnectorError::ExpiredCredentials => {
                ApiError::new(StatusCode::UNAUTHORIZED, "CREDENTIALS_EXPIRED", "this connection's credentials have expired", ErrorSeverity::Warning)
            }
            ConnectorError::PermanentAuthFailure => {
                ApiError::new(StatusCode::UNAUTHORIZED, "REAUTHORIZATION_REQUIRED", "this connection must be re-authorized", ErrorSeverity::Error)
            }
            ConnectorError::MissingPermissions(scopes) => {
                ApiError::new(StatusCode::FORBIDDEN, "MISSING_PERMISSIONS", "the connected account is missing required permissions", ErrorSeverity::Warning)
                    .with_details(serde_json::json!({ "missingScopes": scopes }))
            }
            ConnectorError::RateLimited(reset_at) => {
                ApiError::new(StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED", "the platform rate-limited this request", ErrorSeverity::Warning)
                    .with_details(serde_json::json!({ "resetAt": reset_at }))
            }
            other => {
                tracing::warn!("connector failure: {other}");
                ApiError::new(StatusCode::BAD_GATEWAY, "PLATFORM_ERROR", "the upstream platform call failed", ErrorSeverity::Error)
            }
        }
    }
}

impl From<VaultError> for ApiError {
    fn from(error: VaultError) -> Self {
        match error {
            VaultError::IntegrityFailure => {
                tracing::error!("credential integrity failure, record quarantined");
                ApiError::internal("this credential failed an integrity check and has been quarantined")
            }
            other => {
                tracing::error!("vault failure: {other}");
                ApiError::internal("a credential processing error occurred")
            }
        }
    }
}
