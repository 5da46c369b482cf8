// [libs/domain/detection/src/engine.rs]
use aegis_domain_connectors::types::{NormalizedAuditEvent, RawAutomation};
use aegis_domain_models::automation::{AutomationStatus, DetectionMetadata, DiscoveredAutomation};
use aegis_domain_models::risk_assessment::RiskFactor;
use chrono::{DateTime, Duration, Utc};

use crate::batch::BatchDetector;
use crate::config::DetectionConfig;
use crate::off_hours::OffHoursDetector;
use crate::pattern_table::AiProviderRecognizer;
use crate::types::detector_code_str;
use crate::velocity::VelocityDetector;

pub struct DetectionEngine;

impl DetectionEngine {
    /// Runs AI-provider recognition and the three behavioral detectors
    /// against one automation's audit events, writing the combined
    /// result into `automation.detection_metadata` and flipping its
    /// status to `Suspicious` if any behavioral detector fired.
    pub fn enrich(automation: &mut DiscoveredAutomation, raw: &RawAutomation, events: &[NormalizedAuditEvent], config: &DetectionConfig) {
        let ai_match = AiProviderRecognizer::recognize(raw);

        let findings = [VelocityDetector::evaluate(events, config), BatchDetector::evaluate(events, config), OffHoursDetector::evaluate(events, config)];
        let risk_factors: Vec<RiskFactor> = findings
            .into_iter()
            .flatten()
            .map(|finding| RiskFactor { code: detector_code_str(finding.code).to_string(), description: finding.description, weight: finding.weight })
            .collect();

        let mut data_access_patterns: Vec<String> = events.iter().flat_map(|event| event.data_access_patterns.iter().cloned()).collect();
        data_access_patterns.sort();
        data_access_patterns.dedup();

        automation.data_access_patterns = data_access_patterns;
        automation.detection_metadata = DetectionMetadata {
            is_ai_platform: ai_match.as_ref().is_some_and(|m| m.confidence >= config.ai_provider_confidence_threshold),
            ai_provider: ai_match.as_ref().map(|m| m.provider.clone()),
            platform_name: automation.detection_metadata.platform_name.clone(),
            scopes: raw.scopes.clone(),
            detection_method: ai_match.as_ref().map(|m| m.matched_by.clone()),
            confidence: ai_match.as_ref().map(|m| m.confidence).unwrap_or(0.0),
            evidence: ai_match.map(|m| m.evidence).unwrap_or_default(),
            risk_factors: risk_factors.clone(),
        };

        if !risk_factors.is_empty() && automation.status == AutomationStatus::Active {
            automation.status = AutomationStatus::Suspicious;
        }
    }

    /// An automation missing from the latest discovery run isn't deleted;
    /// `lastSeenAt` simply stops advancing until the staleness window
    /// elapses, at which point it's marked inactive. Re-appearance in a
    /// later run (via the repository's upsert) clears both.
    pub fn mark_stale(automation: &mut DiscoveredAutomation, now: DateTime<Utc>, staleness_window: Duration) {
        if automation.is_stale(now, staleness_window) {
            automation.is_active = false;
            automation.status = AutomationStatus::Inactive;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_domain_models::automation::OwnerInfo;
    use aegis_domain_models::connection::Platform;

    fn raw_automation(client_id: Option<&str>) -> RawAutomation {
        RawAutomation {
            external_id: "ext-1".to_string(),
            name: "Suspicious Bot".to_string(),
            description: None,
            owner_email: None,
            owner_name: None,
            scopes: vec!["read".to_string()],
            created_at: None,
            last_triggered_at: None,
            trigger_type: None,
            client_id: client_id.map(String::from),
            user_agent: None,
            raw: serde_json::json!({}),
        }
    }

    fn automation() -> DiscoveredAutomation {
        let now = Utc::now();
        DiscoveredAutomation {
            id: "auto-1".to_string(),
            organization_id: "org-1".to_string(),
            connection_id: "conn-1".to_string(),
            discovery_run_id: "run-1".to_string(),
            external_id: "ext-1".to_string(),
            name: "Suspicious Bot".to_string(),
            description: None,
            automation_type: aegis_domain_models::automation::AutomationType::Bot,
            status: AutomationStatus::Active,
            trigger_type: None,
            requested_permissions: Vec::new(),
            data_access_patterns: Vec::new(),
            owner_info: OwnerInfo { email: None, name: None },
            first_discovered_at: now,
            last_seen_at: now,
            is_active: true,
            platform_metadata: serde_json::json!({}),
            detection_metadata: DetectionMetadata::default(),
            created_at: now,
            updated_at: now,
        }
    }

    fn burst_events(config: &DetectionConfig) -> Vec<NormalizedAuditEvent> {
        (0..config.velocity_threshold_events + 1)
            .map(|i| NormalizedAuditEvent {
                external_id: format!("evt-{i}"),
                actor_email: None,
                action: "call".to_string(),
                occurred_at: Utc::now(),
                target_count: 1,
                data_access_patterns: vec!["drive.files".to_string()],
            })
            .collect()
    }

    #[test]
    fn enrich_marks_strong_ai_match_as_platform() {
        let config = DetectionConfig::default();
        let mut a = automation();
        DetectionEngine::enrich(&mut a, &raw_automation(Some("openai-connector")), &[], &config);

        assert!(a.detection_metadata.is_ai_platform);
        assert_eq!(a.detection_metadata.ai_provider.as_deref(), Some("OpenAI"));
    }

    #[test]
    fn enrich_flips_status_to_suspicious_when_detectors_fire() {
        let config = DetectionConfig::default();
        let mut a = automation();
        let events = burst_events(&config);
        DetectionEngine::enrich(&mut a, &raw_automation(None), &events, &config);

        assert_eq!(a.status, AutomationStatus::Suspicious);
        assert!(!a.detection_metadata.risk_factors.is_empty());
        assert_eq!(a.data_access_patterns, vec!["drive.files".to_string()]);
    }

    #[test]
    fn mark_stale_deactivates_past_window_but_not_before() {
        let mut a = automation();
        a.last_seen_at = Utc::now() - Duration::days(10);

        DetectionEngine::mark_stale(&mut a, Utc::now(), Duration::days(7));
        assert!(!a.is_active);
        assert_eq!(a.status, AutomationStatus::Inactive);

        let mut fresh = automation();
        DetectionEngine::mark_stale(&mut fresh, Utc::now(), Duration::days(7));
        assert!(fresh.is_active);
    }
}
