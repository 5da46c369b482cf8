//! Turns the lazy RawAutomation/NormalizedAuditEvent stream a connector
//! produces into `DiscoveredAutomation` rows with `detectionMetadata`
//! populated: AI-provider recognition, behavioral detectors (velocity,
//! batch, off-hours), normalization, and cross-platform correlation.

pub mod batch;
pub mod config;
pub mod correlator;
pub mod engine;
pub mod normalizer;
pub mod off_hours;
pub mod pattern_table;
pub mod types;
pub mod vendor;
pub mod velocity;

pub use config::DetectionConfig;
pub use correlator::Correlator;
pub use engine::DetectionEngine;
pub use normalizer::normalize;
pub use pattern_table::AiProviderRecognizer;
pub use types::{AiProviderMatch, CorrelationGroup, DetectorFinding};
