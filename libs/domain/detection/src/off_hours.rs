// [libs/domain/detection/src/off_hours.rs]
use aegis_domain_connectors::types::NormalizedAuditEvent;
use aegis_domain_models::detector_configuration::DetectorCode;
use chrono::Timelike;

use crate::config::DetectionConfig;
use crate::types::DetectorFinding;

/// Flags events outside the tenant's configured business hours/days.
/// Evaluated against `occurred_at` in UTC; tenants whose business hours
/// are expressed in a local timezone are expected to convert at
/// configuration time, not per-event.
pub struct OffHoursDetector;

impl OffHoursDetector {
    pub fn evaluate(events: &[NormalizedAuditEvent], config: &DetectionConfig) -> Option<DetectorFinding> {
        let off_hours_events: Vec<&NormalizedAuditEvent> = events
            .iter()
            .filter(|event| !Self::within_business_hours(event, config))
            .collect();

        if off_hours_events.is_empty() {
            return None;
        }

        Some(DetectorFinding {
            code: DetectorCode::OffHours,
            description: format!("{} of {} events occurred outside configured business hours", off_hours_events.len(), events.len()),
            weight: 0.5,
            evidence: off_hours_events.iter().take(5).map(|event| format!("{} at {}", event.action, event.occurred_at)).collect(),
        })
    }

    fn within_business_hours(event: &NormalizedAuditEvent, config: &DetectionConfig) -> bool {
        let weekday = event.occurred_at.weekday();
        let hour = event.occurred_at.hour();
        config.business_days.contains(&weekday) && hour >= config.business_hours_start_utc && hour < config.business_hours_end_utc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn event_at(year: i32, month: u32, day: u32, hour: u32) -> NormalizedAuditEvent {
        NormalizedAuditEvent {
            external_id: "evt".to_string(),
            actor_email: None,
            action: "call".to_string(),
            occurred_at: Utc.with_ymd_and_hms(year, month, day, hour, 0, 0).unwrap(),
            target_count: 1,
            data_access_patterns: Vec::new(),
        }
    }

    #[test]
    fn flags_midnight_event_as_off_hours() {
        let config = DetectionConfig::default();
        // 2026-07-27 is a Monday, within business days; 02:00 UTC is off-hours.
        let events = vec![event_at(2026, 7, 27, 2)];

        let finding = OffHoursDetector::evaluate(&events, &config).expect("expected a finding");
        assert_eq!(finding.code, DetectorCode::OffHours);
    }

    #[test]
    fn does_not_flag_business_hours_event() {
        let config = DetectionConfig::default();
        let events = vec![event_at(2026, 7, 27, 10)];

        assert!(OffHoursDetector::evaluate(&events, &config).is_none());
    }

    #[test]
    fn flags_weekend_event() {
        let config = DetectionConfig::default();
        // 2026-08-01 is a Saturday.
        let events = vec![event_at(2026, 8, 1, 10)];

        assert!(OffHoursDetector::evaluate(&events, &config).is_some());
    }
}
