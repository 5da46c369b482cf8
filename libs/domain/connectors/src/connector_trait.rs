// [libs/domain/connectors/src/connector_trait.rs]
use aegis_domain_models::{DecryptedCredential, Platform};
use async_trait::async_trait;

use crate::errors::ConnectorError;
use crate::types::{AuditQuery, CredentialValidation, Page, RawAutomation, RefreshedCredential};

/// The uniform capability set every platform adapter satisfies. Retrieval
/// style (live pagination vs. export-and-poll) is internal to
/// `get_audit_logs`'s implementation — callers never branch on it.
#[async_trait]
pub trait Connector: Send + Sync {
    fn platform(&self) -> Platform;

    async fn validate_credentials(&self, credential: &DecryptedCredential) -> Result<CredentialValidation, ConnectorError>;

    async fn discover_automations(
        &self,
        credential: &DecryptedCredential,
        cursor: Option<String>,
    ) -> Result<Page<RawAutomation>, ConnectorError>;

    async fn get_audit_logs(
        &self,
        credential: &DecryptedCredential,
        query: AuditQuery,
    ) -> Result<Page<crate::types::NormalizedAuditEvent>, ConnectorError>;

    async fn refresh_credentials(&self, credential: &DecryptedCredential) -> Result<RefreshedCredential, ConnectorError> {
        let _ = credential;
        Err(ConnectorError::InvariantViolation(format!("{:?} credentials are not refreshable", self.platform())))
    }
}
