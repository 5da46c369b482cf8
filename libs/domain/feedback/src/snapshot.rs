// [libs/domain/feedback/src/snapshot.rs]
use aegis_domain_models::common::OrganizationId;
use aegis_domain_models::feedback::{Feedback, FeedbackType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A crystallized metrics view over a rolling feedback window. Only
/// `CorrectDetection` / `FalsePositive` / `FalseNegative` feed the core
/// ratios; the remaining feedback types (`IncorrectClassification`,
/// `IncorrectRiskScore`, `IncorrectAiProvider`) are tallied separately as
/// miscorrections since they judge a different axis than detection
/// presence/absence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackMetricsSnapshot {
    pub organization_id: OrganizationId,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub sample_size: u32,
    pub precision: f64,
    pub recall: f64,
    pub false_positive_rate: f64,
    pub false_negative_rate: f64,
    pub miscorrection_count: u32,
}

/// Mirrors `TelemetryObserver::crystallize_snapshot` — raw rows in, one
/// immutable snapshot out.
pub struct FeedbackAggregator;

impl FeedbackAggregator {
    pub fn crystallize_snapshot(organization_id: &OrganizationId, feedback: &[Feedback], window_start: DateTime<Utc>, window_end: DateTime<Utc>) -> FeedbackMetricsSnapshot {
        let in_window: Vec<&Feedback> = feedback.iter().filter(|f| f.created_at >= window_start && f.created_at < window_end).collect();

        let true_positives = count_of(&in_window, FeedbackType::CorrectDetection);
        let false_positives = count_of(&in_window, FeedbackType::FalsePositive);
        let false_negatives = count_of(&in_window, FeedbackType::FalseNegative);
        let miscorrection_count = in_window.len() as u32 - true_positives - false_positives - false_negatives;

        let precision = ratio(true_positives, true_positives + false_positives);
        let recall = ratio(true_positives, true_positives + false_negatives);
        let total = in_window.len().max(1) as f64;
        let false_positive_rate = false_positives as f64 / total;
        let false_negative_rate = false_negatives as f64 / total;

        FeedbackMetricsSnapshot {
            organization_id: organization_id.clone(),
            window_start,
            window_end,
            sample_size: in_window.len() as u32,
            precision,
            recall,
            false_positive_rate,
            false_negative_rate,
            miscorrection_count,
        }
    }
}

fn count_of(feedback: &[&Feedback], kind: FeedbackType) -> u32 {
    feedback.iter().filter(|f| f.feedback_type == kind).count() as u32
}

fn ratio(numerator: u32, denominator: u32) -> f64 {
    if denominator == 0 {
        1.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn feedback(kind: FeedbackType, created_at: DateTime<Utc>) -> Feedback {
        Feedback {
            id: "fb-1".to_string(),
            organization_id: "org-1".to_string(),
            automation_id: "auto-1".to_string(),
            user_id: "user-1".to_string(),
            user_email: "user@corp.com".to_string(),
            feedback_type: kind,
            sentiment: aegis_domain_models::feedback::FeedbackSentiment::Neutral,
            comment: None,
            suggested_corrections: serde_json::json!({}),
            status: aegis_domain_models::feedback::FeedbackStatus::Pending,
            ml_metadata: serde_json::json!({}),
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn crystallize_snapshot_computes_precision_and_recall() {
        let now = Utc::now();
        let rows = vec![
            feedback(FeedbackType::CorrectDetection, now),
            feedback(FeedbackType::CorrectDetection, now),
            feedback(FeedbackType::FalsePositive, now),
            feedback(FeedbackType::FalseNegative, now),
        ];

        let snapshot = FeedbackAggregator::crystallize_snapshot(&"org-1".to_string(), &rows, now - Duration::days(30), now + Duration::seconds(1));

        assert_eq!(snapshot.sample_size, 4);
        assert!((snapshot.precision - (2.0 / 3.0)).abs() < 1e-9);
        assert!((snapshot.recall - (2.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn crystallize_snapshot_excludes_rows_outside_window() {
        let now = Utc::now();
        let rows = vec![feedback(FeedbackType::CorrectDetection, now - Duration::days(60))];

        let snapshot = FeedbackAggregator::crystallize_snapshot(&"org-1".to_string(), &rows, now - Duration::days(30), now);
        assert_eq!(snapshot.sample_size, 0);
    }

    #[test]
    fn no_feedback_yields_perfect_ratios_by_convention() {
        let now = Utc::now();
        let snapshot = FeedbackAggregator::crystallize_snapshot(&"org-1".to_string(), &[], now - Duration::days(30), now);
        assert_eq!(snapshot.precision, 1.0);
        assert_eq!(snapshot.recall, 1.0);
    }
}
