// [libs/infra/db/src/repositories/mod.rs]
pub mod automations;
pub mod connections;
pub mod credentials;
pub mod detector_configurations;
pub mod discovery_runs;
pub mod feedback;
pub mod notifications;
pub mod risk_assessments;

pub use automations::AutomationRepository;
pub use connections::ConnectionRepository;
pub use credentials::CredentialRepository;
pub use detector_configurations::DetectorConfigurationRepository;
pub use discovery_runs::DiscoveryRunRepository;
pub use feedback::FeedbackRepository;
pub use notifications::NotificationRepository;
pub use risk_assessments::RiskAssessmentRepository;
