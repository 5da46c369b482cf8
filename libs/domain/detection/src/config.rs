// [libs/domain/detection/src/config.rs]
use serde::{Deserialize, Serialize};

/// Per-tenant thresholds the behavioral detectors evaluate against.
/// Assembled by the caller from the active `DetectorConfiguration` row
/// per `DetectorCode`, falling back to these defaults when a tenant has
/// never overridden one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    pub velocity_threshold_events: u32,
    pub velocity_window_seconds: i64,
    pub batch_size_threshold: u32,
    pub batch_window_seconds: i64,
    pub business_hours_start_utc: u32,
    pub business_hours_end_utc: u32,
    pub business_days: Vec<chrono::Weekday>,
    /// Confidence an `AiProviderMatch` must clear for
    /// `detectionMetadata.isAIPlatform` to flip true. Tenant-overridable so
    /// the feedback loop's `confidence_floor_delta` proposal has something
    /// to act on instead of a hardcoded constant.
    pub ai_provider_confidence_threshold: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            velocity_threshold_events: 20,
            velocity_window_seconds: 60,
            batch_size_threshold: 50,
            batch_window_seconds: 30,
            business_hours_start_utc: 9,
            business_hours_end_utc: 18,
            business_days: vec![
                chrono::Weekday::Mon,
                chrono::Weekday::Tue,
                chrono::Weekday::Wed,
                chrono::Weekday::Thu,
                chrono::Weekday::Fri,
            ],
            ai_provider_confidence_threshold: 0.8,
        }
    }
}
