// [libs/domain/feedback/src/advisor.rs]
use aegis_domain_models::detector_configuration::DetectorCode;

use crate::snapshot::FeedbackMetricsSnapshot;

/// Deltas beyond which a metric drift is worth proposing a new
/// `DetectorConfiguration` version for.
#[derive(Debug, Clone)]
pub struct DriftThresholds {
    pub precision_drop_delta: f64,
    pub recall_drop_delta: f64,
}

impl Default for DriftThresholds {
    fn default() -> Self {
        Self { precision_drop_delta: 0.1, recall_drop_delta: 0.1 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationProposal {
    pub detector_code: DetectorCode,
    pub proposed_thresholds: serde_json::Value,
    pub reason: String,
}

/// Mirrors `OptimizationController::generate_directive` — a verdict in,
/// an optional concrete directive out. Here the verdict is a drift
/// comparison between two consecutive feedback snapshots.
pub struct ConfigurationAdvisor;

impl ConfigurationAdvisor {
    pub fn propose(previous: &FeedbackMetricsSnapshot, current: &FeedbackMetricsSnapshot, thresholds: &DriftThresholds) -> Option<ConfigurationProposal> {
        let precision_drop = previous.precision - current.precision;
        let recall_drop = previous.recall - current.recall;

        if precision_drop >= thresholds.precision_drop_delta && current.false_positive_rate > previous.false_positive_rate {
            return Some(ConfigurationProposal {
                detector_code: DetectorCode::AiProvider,
                proposed_thresholds: serde_json::json!({ "confidence_floor_delta": 0.1 }),
                reason: format!("precision dropped by {precision_drop:.2} while false-positive rate rose; raising the AI-provider confidence floor"),
            });
        }

        if recall_drop >= thresholds.recall_drop_delta && current.false_negative_rate > previous.false_negative_rate {
            return Some(ConfigurationProposal {
                detector_code: DetectorCode::Velocity,
                proposed_thresholds: serde_json::json!({ "velocity_threshold_events_delta": -5 }),
                reason: format!("recall dropped by {recall_drop:.2} while false-negative rate rose; loosening the velocity detector's threshold"),
            });
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn snapshot(precision: f64, recall: f64, fp_rate: f64, fn_rate: f64) -> FeedbackMetricsSnapshot {
        FeedbackMetricsSnapshot {
            organization_id: "org-1".to_string(),
            window_start: Utc::now(),
            window_end: Utc::now(),
            sample_size: 100,
            precision,
            recall,
            false_positive_rate: fp_rate,
            false_negative_rate: fn_rate,
            miscorrection_count: 0,
        }
    }

    #[test]
    fn proposes_ai_provider_tightening_on_precision_drift() {
        let previous = snapshot(0.9, 0.9, 0.05, 0.05);
        let current = snapshot(0.75, 0.9, 0.2, 0.05);

        let proposal = ConfigurationAdvisor::propose(&previous, &current, &DriftThresholds::default()).expect("expected a proposal");
        assert_eq!(proposal.detector_code, DetectorCode::AiProvider);
    }

    #[test]
    fn proposes_velocity_loosening_on_recall_drift() {
        let previous = snapshot(0.9, 0.9, 0.05, 0.05);
        let current = snapshot(0.9, 0.75, 0.05, 0.2);

        let proposal = ConfigurationAdvisor::propose(&previous, &current, &DriftThresholds::default()).expect("expected a proposal");
        assert_eq!(proposal.detector_code, DetectorCode::Velocity);
    }

    #[test]
    fn no_proposal_when_metrics_are_stable() {
        let previous = snapshot(0.9, 0.9, 0.05, 0.05);
        let current = snapshot(0.89, 0.88, 0.05, 0.06);

        assert!(ConfigurationAdvisor::propose(&previous, &current, &DriftThresholds::default()).is_none());
    }
}
