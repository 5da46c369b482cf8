// [libs/domain/detection/src/correlator.rs]
use aegis_domain_models::automation::DiscoveredAutomation;
use chrono::Duration;
use regex::Regex;
use std::sync::OnceLock;

use crate::types::CorrelationGroup;

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"https?://([a-zA-Z0-9.-]+)").expect("static url regex is valid"))
}

/// Groups automations that likely represent one logical workflow spanning
/// multiple platforms. Produces equivalence classes; never merges the
/// underlying rows. Runs over whatever slice of a tenant's automations the
/// caller hands it — typically everything touched by one discovery run
/// plus anything previously seen for the same connections.
pub struct Correlator {
    pub temporal_proximity_window: Duration,
}

impl Default for Correlator {
    fn default() -> Self {
        Self { temporal_proximity_window: Duration::hours(1) }
    }
}

impl Correlator {
    pub fn correlate(&self, automations: &[DiscoveredAutomation]) -> Vec<CorrelationGroup> {
        let n = automations.len();
        let mut parent: Vec<usize> = (0..n).collect();

        fn find(parent: &mut [usize], x: usize) -> usize {
            if parent[x] != x {
                parent[x] = find(parent, parent[x]);
            }
            parent[x]
        }
        fn union(parent: &mut [usize], a: usize, b: usize) {
            let (ra, rb) = (find(parent, a), find(parent, b));
            if ra != rb {
                parent[ra] = rb;
            }
        }

        let mut pair_signals: std::collections::HashMap<(usize, usize), Vec<String>> = std::collections::HashMap::new();

        for i in 0..n {
            for j in (i + 1)..n {
                let signals = self.signals_between(&automations[i], &automations[j]);
                if !signals.is_empty() {
                    union(&mut parent, i, j);
                    pair_signals.insert((i, j), signals);
                }
            }
        }

        let mut groups: std::collections::HashMap<usize, Vec<usize>> = std::collections::HashMap::new();
        for i in 0..n {
            groups.entry(find(&mut parent, i)).or_default().push(i);
        }

        groups
            .into_values()
            .filter(|members| members.len() > 1)
            .map(|members| {
                let mut signals: Vec<String> = Vec::new();
                for a in 0..members.len() {
                    for b in (a + 1)..members.len() {
                        let key = if members[a] < members[b] { (members[a], members[b]) } else { (members[b], members[a]) };
                        if let Some(found) = pair_signals.get(&key) {
                            signals.extend(found.iter().cloned());
                        }
                    }
                }
                signals.sort();
                signals.dedup();

                let confidence = (0.4 + 0.2 * signals.len() as f64).min(0.95);
                CorrelationGroup {
                    automation_ids: members.iter().map(|&i| automations[i].id.clone()).collect(),
                    confidence,
                    signals,
                }
            })
            .collect()
    }

    fn signals_between(&self, a: &DiscoveredAutomation, b: &DiscoveredAutomation) -> Vec<String> {
        let mut signals = Vec::new();

        if let (Some(email_a), Some(email_b)) = (&a.owner_info.email, &b.owner_info.email) {
            if !email_a.is_empty() && email_a.eq_ignore_ascii_case(email_b) {
                signals.push("shared_owner_email".to_string());
            }
        }

        if let (Some(client_a), Some(client_b)) = (client_id(a), client_id(b)) {
            if client_a == client_b {
                signals.push("oauth_client_id_collision".to_string());
            }
        }

        if (a.last_seen_at - b.last_seen_at).abs() <= self.temporal_proximity_window {
            signals.push("temporal_proximity".to_string());
        }

        let domains_a = extract_domains(a.description.as_deref());
        let domains_b = extract_domains(b.description.as_deref());
        if domains_a.iter().any(|d| domains_b.contains(d)) {
            signals.push("shared_url_pattern".to_string());
        }

        signals
    }
}

fn client_id(automation: &DiscoveredAutomation) -> Option<String> {
    automation.platform_metadata.get("client_id").and_then(|v| v.as_str()).map(String::from)
}

fn extract_domains(text: Option<&str>) -> Vec<String> {
    match text {
        Some(text) => url_pattern().captures_iter(text).filter_map(|c| c.get(1)).map(|m| m.as_str().to_string()).collect(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_domain_models::automation::{AutomationStatus, AutomationType, DetectionMetadata, OwnerInfo};
    use chrono::{DateTime, Utc};

    fn automation(id: &str, owner_email: Option<&str>, client_id: Option<&str>) -> DiscoveredAutomation {
        automation_at(id, owner_email, client_id, Utc::now())
    }

    fn automation_at(id: &str, owner_email: Option<&str>, client_id: Option<&str>, last_seen_at: DateTime<Utc>) -> DiscoveredAutomation {
        let now = last_seen_at;
        let platform_metadata = match client_id {
            Some(client_id) => serde_json::json!({ "client_id": client_id }),
            None => serde_json::json!({}),
        };
        DiscoveredAutomation {
            id: id.to_string(),
            organization_id: "org-1".to_string(),
            connection_id: "conn-1".to_string(),
            discovery_run_id: "run-1".to_string(),
            external_id: id.to_string(),
            name: id.to_string(),
            description: None,
            automation_type: AutomationType::App,
            status: AutomationStatus::Active,
            trigger_type: None,
            requested_permissions: Vec::new(),
            data_access_patterns: Vec::new(),
            owner_info: OwnerInfo { email: owner_email.map(String::from), name: None },
            first_discovered_at: now,
            last_seen_at: now,
            is_active: true,
            platform_metadata,
            detection_metadata: DetectionMetadata::default(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn groups_automations_sharing_owner_email() {
        let automations = vec![automation("a", Some("ana@corp.com"), None), automation("b", Some("ana@corp.com"), None), automation("c", Some("bob@corp.com"), None)];

        let groups = Correlator::default().correlate(&automations);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].automation_ids.len(), 2);
        assert!(groups[0].signals.contains(&"shared_owner_email".to_string()));
    }

    #[test]
    fn groups_automations_sharing_client_id() {
        let automations = vec![automation("a", None, Some("client-1")), automation("b", None, Some("client-1"))];

        let groups = Correlator::default().correlate(&automations);

        assert_eq!(groups.len(), 1);
        assert!(groups[0].signals.contains(&"oauth_client_id_collision".to_string()));
    }

    #[test]
    fn unrelated_automations_produce_no_groups() {
        let now = Utc::now();
        let automations = vec![
            automation_at("a", Some("ana@corp.com"), Some("client-1"), now),
            automation_at("b", Some("bob@corp.com"), Some("client-2"), now + Duration::hours(5)),
        ];

        assert!(Correlator::default().correlate(&automations).is_empty());
    }
}
