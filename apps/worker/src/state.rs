// [apps/worker/src/state.rs]
//! Composition root, mirroring `apps/api`'s `AppState` — every repository
//! plus the job broker and event bus behind one cheap-`Clone` handle,
//! threaded into each executor instead of axum's `State` extractor.

use std::sync::Arc;

use aegis_infra_db::{
    AutomationRepository, ConnectionRepository, CredentialRepository, DbClient,
    DetectorConfigurationRepository, DiscoveryRunRepository, FeedbackRepository,
    NotificationRepository, RiskAssessmentRepository,
};
use aegis_infra_eventbus::EventBus;
use aegis_infra_jobs::JobBroker;

use crate::config::Settings;

#[derive(Clone)]
pub struct WorkerState {
    pub settings: Arc<Settings>,
    pub event_bus: EventBus,
    pub job_broker: Arc<JobBroker>,
    pub connections: Arc<ConnectionRepository>,
    pub credentials: Arc<CredentialRepository>,
    pub discovery_runs: Arc<DiscoveryRunRepository>,
    pub automations: Arc<AutomationRepository>,
    pub risk_assessments: Arc<RiskAssessmentRepository>,
    pub feedback: Arc<FeedbackRepository>,
    pub detector_configurations: Arc<DetectorConfigurationRepository>,
    pub notifications: Arc<NotificationRepository>,
}

impl WorkerState {
    pub fn new(settings: Settings, db: DbClient) -> Self {
        Self {
            settings: Arc::new(settings),
            event_bus: EventBus::new(),
            job_broker: Arc::new(JobBroker::new(db.clone())),
            connections: Arc::new(ConnectionRepository::new(db.clone())),
            credentials: Arc::new(CredentialRepository::new(db.clone())),
            discovery_runs: Arc::new(DiscoveryRunRepository::new(db.clone())),
            automations: Arc::new(AutomationRepository::new(db.clone())),
            risk_assessments: Arc::new(RiskAssessmentRepository::new(db.clone())),
            feedback: Arc::new(FeedbackRepository::new(db.clone())),
            detector_configurations: Arc::new(DetectorConfigurationRepository::new(db.clone())),
            notifications: Arc::new(NotificationRepository::new(db)),
        }
    }
}
