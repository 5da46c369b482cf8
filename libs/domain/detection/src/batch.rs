// [libs/domain/detection/src/batch.rs]
use aegis_domain_connectors::types::NormalizedAuditEvent;
use aegis_domain_models::detector_configuration::DetectorCode;
use chrono::Duration;

use crate::config::DetectionConfig;
use crate::types::DetectorFinding;

/// Flags operations whose cumulative cardinality within a short window
/// exceeds a threshold (e.g. 50 files touched in 30 seconds), summing
/// each event's `target_count` rather than just counting events.
pub struct BatchDetector;

impl BatchDetector {
    pub fn evaluate(events: &[NormalizedAuditEvent], config: &DetectionConfig) -> Option<DetectorFinding> {
        if events.is_empty() {
            return None;
        }

        let mut sorted: Vec<&NormalizedAuditEvent> = events.iter().collect();
        sorted.sort_by_key(|e| e.occurred_at);

        let window = Duration::seconds(config.batch_window_seconds);
        let mut window_start = 0usize;
        let mut running_total = 0u32;
        let mut peak_total = 0u32;

        for window_end in 0..sorted.len() {
            running_total += sorted[window_end].target_count;
            while sorted[window_end].occurred_at - sorted[window_start].occurred_at > window {
                running_total -= sorted[window_start].target_count;
                window_start += 1;
            }
            peak_total = peak_total.max(running_total);
        }

        if peak_total < config.batch_size_threshold {
            return None;
        }

        Some(DetectorFinding {
            code: DetectorCode::Batch,
            description: format!(
                "{} targets touched within a {}s window (threshold {})",
                peak_total, config.batch_window_seconds, config.batch_size_threshold
            ),
            weight: 1.0,
            evidence: vec![format!("peak cardinality of {peak_total} targets")],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn event(offset_seconds: i64, target_count: u32) -> NormalizedAuditEvent {
        NormalizedAuditEvent {
            external_id: "evt".to_string(),
            actor_email: None,
            action: "bulk_export".to_string(),
            occurred_at: Utc::now() + Duration::seconds(offset_seconds),
            target_count,
            data_access_patterns: Vec::new(),
        }
    }

    #[test]
    fn flags_high_cardinality_batch() {
        let config = DetectionConfig { batch_size_threshold: 50, batch_window_seconds: 30, ..Default::default() };
        let events = vec![event(0, 30), event(5, 25)];

        let finding = BatchDetector::evaluate(&events, &config).expect("expected a finding");
        assert_eq!(finding.code, DetectorCode::Batch);
    }

    #[test]
    fn does_not_flag_small_operations() {
        let config = DetectionConfig { batch_size_threshold: 50, batch_window_seconds: 30, ..Default::default() };
        let events = vec![event(0, 3), event(5, 2)];

        assert!(BatchDetector::evaluate(&events, &config).is_none());
    }
}
