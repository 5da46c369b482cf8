//! libsql-backed, tenant-scoped persistence layer. Every repository method
//! takes `organization_id` as its first parameter — there is no method
//! that can address a row without naming the tenant it must belong to.

pub mod client;
pub mod errors;
pub mod repositories;
pub mod schema;

pub use client::DbClient;
pub use errors::DbError;
pub use repositories::{
    AutomationRepository, ConnectionRepository, CredentialRepository,
    DetectorConfigurationRepository, DiscoveryRunRepository, FeedbackRepository,
    NotificationRepository, RiskAssessmentRepository,
};
