// [libs/domain/detection/src/velocity.rs]
use aegis_domain_connectors::types::NormalizedAuditEvent;
use aegis_domain_models::detector_configuration::DetectorCode;
use chrono::Duration;

use crate::config::DetectionConfig;
use crate::types::DetectorFinding;

/// Flags bursts: N events within a sliding window of Δt, per tenant
/// threshold. Stateless — evaluated fresh against whatever slice of
/// events the caller hands it.
pub struct VelocityDetector;

impl VelocityDetector {
    pub fn evaluate(events: &[NormalizedAuditEvent], config: &DetectionConfig) -> Option<DetectorFinding> {
        if events.is_empty() {
            return None;
        }

        let mut sorted: Vec<&NormalizedAuditEvent> = events.iter().collect();
        sorted.sort_by_key(|e| e.occurred_at);

        let window = Duration::seconds(config.velocity_window_seconds);
        let mut window_start = 0usize;
        let mut peak = 1u32;
        let mut peak_at = sorted[0].occurred_at;

        for window_end in 0..sorted.len() {
            while sorted[window_end].occurred_at - sorted[window_start].occurred_at > window {
                window_start += 1;
            }
            let count = (window_end - window_start + 1) as u32;
            if count > peak {
                peak = count;
                peak_at = sorted[window_end].occurred_at;
            }
        }

        if peak < config.velocity_threshold_events {
            return None;
        }

        Some(DetectorFinding {
            code: DetectorCode::Velocity,
            description: format!(
                "{} events within a {}s window (threshold {})",
                peak, config.velocity_window_seconds, config.velocity_threshold_events
            ),
            weight: 1.0,
            evidence: vec![format!("burst peak of {peak} events ending at {peak_at}")],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn event(offset_seconds: i64) -> NormalizedAuditEvent {
        NormalizedAuditEvent {
            external_id: "evt".to_string(),
            actor_email: None,
            action: "call".to_string(),
            occurred_at: Utc::now() + Duration::seconds(offset_seconds),
            target_count: 1,
            data_access_patterns: Vec::new(),
        }
    }

    #[test]
    fn flags_burst_above_threshold() {
        let config = DetectionConfig { velocity_threshold_events: 5, velocity_window_seconds: 10, ..Default::default() };
        let events: Vec<_> = (0..6).map(event).collect();

        let finding = VelocityDetector::evaluate(&events, &config).expect("expected a finding");
        assert_eq!(finding.code, DetectorCode::Velocity);
    }

    #[test]
    fn does_not_flag_sparse_events() {
        let config = DetectionConfig { velocity_threshold_events: 5, velocity_window_seconds: 10, ..Default::default() };
        let events: Vec<_> = (0..3).map(|i| event(i * 20)).collect();

        assert!(VelocityDetector::evaluate(&events, &config).is_none());
    }
}
