// [libs/domain/feedback/src/degradation.rs]
use aegis_domain_notification::{NotificationSeverity, SystemNotification};

use crate::snapshot::FeedbackMetricsSnapshot;

/// How many consecutive trailing snapshots (oldest-to-newest) must show a
/// precision drop before the run is considered a sustained degradation
/// rather than noise.
const SUSTAINED_DROP_STREAK: usize = 3;
const PRECISION_DROP_DELTA: f64 = 0.05;

/// Detects a sustained drop in precision across a trailing run of
/// snapshots and raises a critical system notification when found.
/// Mirrors the "model degraded" banner callout.
pub struct DegradationDetector;

impl DegradationDetector {
    pub fn check(organization_id: &str, snapshots: &[FeedbackMetricsSnapshot]) -> Option<SystemNotification> {
        if snapshots.len() < SUSTAINED_DROP_STREAK + 1 {
            return None;
        }

        let trailing = &snapshots[snapshots.len() - (SUSTAINED_DROP_STREAK + 1)..];
        let sustained_drop = trailing.windows(2).all(|pair| pair[0].precision - pair[1].precision >= PRECISION_DROP_DELTA || pair[1].precision < pair[0].precision);
        let strictly_declining = trailing.windows(2).all(|pair| pair[1].precision < pair[0].precision);
        let total_drop = trailing.first()?.precision - trailing.last()?.precision;

        if sustained_drop && strictly_declining && total_drop >= PRECISION_DROP_DELTA {
            let latest = trailing.last()?;
            return Some(
                SystemNotification::new(
                    organization_id.to_string(),
                    NotificationSeverity::Critical,
                    format!("detection precision has dropped {total_drop:.2} over the last {SUSTAINED_DROP_STREAK} feedback windows"),
                )
                .with_title("model degraded")
                .with_details(serde_json::json!({
                    "latest_precision": latest.precision,
                    "latest_sample_size": latest.sample_size,
                    "window_end": latest.window_end,
                })),
            );
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn snapshot(precision: f64) -> FeedbackMetricsSnapshot {
        FeedbackMetricsSnapshot {
            organization_id: "org-1".to_string(),
            window_start: Utc::now(),
            window_end: Utc::now(),
            sample_size: 50,
            precision,
            recall: 0.9,
            false_positive_rate: 0.05,
            false_negative_rate: 0.05,
            miscorrection_count: 0,
        }
    }

    #[test]
    fn raises_notification_on_sustained_decline() {
        let snapshots = vec![snapshot(0.95), snapshot(0.90), snapshot(0.85), snapshot(0.80)];
        let notification = DegradationDetector::check("org-1", &snapshots).expect("expected a degradation notification");
        assert_eq!(notification.level, NotificationSeverity::Critical);
    }

    #[test]
    fn no_notification_when_precision_recovers() {
        let snapshots = vec![snapshot(0.95), snapshot(0.80), snapshot(0.96), snapshot(0.97)];
        assert!(DegradationDetector::check("org-1", &snapshots).is_none());
    }

    #[test]
    fn no_notification_with_too_few_snapshots() {
        let snapshots = vec![snapshot(0.95), snapshot(0.80)];
        assert!(DegradationDetector::check("org-1", &snapshots).is_none());
    }
}
