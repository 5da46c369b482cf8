//! Crystallizes raw feedback rows into metrics snapshots, proposes
//! detector-configuration drift corrections, and raises a notification on
//! sustained precision degradation.

pub mod advisor;
pub mod degradation;
pub mod snapshot;

pub use advisor::{ConfigurationAdvisor, ConfigurationProposal, DriftThresholds};
pub use degradation::DegradationDetector;
pub use snapshot::{FeedbackAggregator, FeedbackMetricsSnapshot};
