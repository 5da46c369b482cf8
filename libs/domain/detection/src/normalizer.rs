// [libs/domain/detection/src/normalizer.rs]
use aegis_domain_connectors::types::RawAutomation;
use aegis_domain_models::automation::{AutomationStatus, AutomationType, DetectionMetadata, DiscoveredAutomation, OwnerInfo};
use aegis_domain_models::connection::Platform;
use aegis_domain_models::common::OrganizationId;
use chrono::{DateTime, Utc};

/// Maps one platform's `RawAutomation` into the system's common
/// `DiscoveredAutomation` shape. `detection_metadata` is left at its
/// default here; `DetectionEngine::enrich` fills it in a second pass
/// once the automation's audit events are available.
pub fn normalize(
    organization_id: OrganizationId,
    connection_id: String,
    discovery_run_id: String,
    platform: Platform,
    raw: RawAutomation,
    now: DateTime<Utc>,
) -> DiscoveredAutomation {
    let automation_type = infer_automation_type(raw.trigger_type.as_deref());
    let mut platform_metadata = raw.raw;
    if let Some(client_id) = &raw.client_id {
        if let serde_json::Value::Object(map) = &mut platform_metadata {
            map.insert("client_id".to_string(), serde_json::Value::String(client_id.clone()));
        } else {
            platform_metadata = serde_json::json!({ "client_id": client_id });
        }
    }

    DiscoveredAutomation {
        id: String::new(),
        organization_id,
        connection_id,
        discovery_run_id,
        external_id: raw.external_id,
        name: raw.name,
        description: raw.description,
        automation_type,
        status: AutomationStatus::Active,
        trigger_type: raw.trigger_type,
        requested_permissions: raw.scopes,
        data_access_patterns: Vec::new(),
        owner_info: OwnerInfo { email: raw.owner_email, name: raw.owner_name },
        first_discovered_at: raw.created_at.unwrap_or(now),
        last_seen_at: raw.last_triggered_at.unwrap_or(now),
        is_active: true,
        platform_metadata,
        detection_metadata: DetectionMetadata { platform_name: Some(format!("{platform:?}")), ..Default::default() },
        created_at: now,
        updated_at: now,
    }
}

fn infer_automation_type(trigger_type: Option<&str>) -> AutomationType {
    match trigger_type {
        Some("webhook") => AutomationType::Webhook,
        Some("oauth_app") | Some("oauth_grant") => AutomationType::Integration,
        Some("connect_app") => AutomationType::Integration,
        Some("service_principal") | Some("service_account") => AutomationType::Bot,
        Some("custom_gpt") => AutomationType::Bot,
        Some("workspace") => AutomationType::Workflow,
        Some(_) => AutomationType::App,
        None => AutomationType::App,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(trigger_type: Option<&str>) -> RawAutomation {
        RawAutomation {
            external_id: "ext-1".to_string(),
            name: "Test App".to_string(),
            description: None,
            owner_email: Some("owner@corp.com".to_string()),
            owner_name: None,
            scopes: vec!["read".to_string()],
            created_at: None,
            last_triggered_at: None,
            trigger_type: trigger_type.map(String::from),
            client_id: Some("client-xyz".to_string()),
            user_agent: None,
            raw: serde_json::json!({}),
        }
    }

    #[test]
    fn normalize_embeds_client_id_into_platform_metadata() {
        let now = Utc::now();
        let automation = normalize("org-1".to_string(), "conn-1".to_string(), "run-1".to_string(), Platform::Slack, raw(Some("oauth_app")), now);

        assert_eq!(automation.automation_type, AutomationType::Integration);
        assert_eq!(automation.platform_metadata.get("client_id").and_then(|v| v.as_str()), Some("client-xyz"));
        assert_eq!(automation.owner_info.email.as_deref(), Some("owner@corp.com"));
    }

    #[test]
    fn unknown_trigger_type_defaults_to_app() {
        let automation = normalize("org-1".to_string(), "conn-1".to_string(), "run-1".to_string(), Platform::Google, raw(None), Utc::now());
        assert_eq!(automation.automation_type, AutomationType::App);
    }
}
