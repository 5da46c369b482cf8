// [libs/domain/models/src/lib.rs]
//! Single source of truth for the entities described in the discovery
//! pipeline's data model: connections, credentials, discovery runs,
//! discovered automations, risk assessments, feedback, detector
//! configuration, jobs, and bus events.

pub mod automation;
pub mod common;
pub mod connection;
pub mod credential;
pub mod detector_configuration;
pub mod discovery_run;
pub mod event;
pub mod feedback;
pub mod job;
pub mod risk_assessment;

pub use automation::{AutomationType, DetectionMetadata, DiscoveredAutomation};
pub use common::{OrganizationId, TimestampOrString};
pub use connection::{ConnectionStatus, Platform, PlatformConnection, SyncConfiguration};
pub use credential::EncryptedCredential;
pub use detector_configuration::DetectorConfiguration;
pub use discovery_run::{DiscoveryRun, DiscoveryStage, RunStatus};
pub use event::BusEvent;
pub use feedback::{Feedback, FeedbackSentiment, FeedbackStatus, FeedbackType};
pub use job::{Job, JobStatus, QueueName};
pub use risk_assessment::{OverallRisk, RiskAssessment, RiskFactor};
