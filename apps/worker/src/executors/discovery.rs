// [apps/worker/src/executors/discovery.rs]
//! Drives one connection through the full discovery pipeline: decrypt its
//! credential, paginate the connector's automation listing and audit log,
//! normalize and enrich each automation, score it, and persist each page as
//! soon as it is fetched. A mid-pipeline connector failure resolves through
//! [`crate::errors::classify_connector_error`] into a reschedule, a
//! quarantine, or an ordinary retryable job failure — never a panic.
//! `ExpiredCredentials` and `MissingPermissions` are intercepted before they
//! ever reach that classifier: the former drives a refresh attempt, the
//! latter is a partial-functionality warning, not a broken connector.

use aegis_core_vault::VaultCryptoEngine;
use aegis_domain_connectors::types::{AuditQuery, NormalizedAuditEvent, RawAutomation};
use aegis_domain_connectors::{Connector, ConnectorError};
use aegis_domain_detection::{normalize, Correlator, DetectionConfig, DetectionEngine};
use aegis_domain_models::automation::DiscoveredAutomation;
use aegis_domain_models::connection::{ConnectionStatus, Platform};
use aegis_domain_models::credential::{CredentialStatus, DecryptedCredential, EncryptedCredential};
use aegis_domain_models::detector_configuration::DetectorCode;
use aegis_domain_models::discovery_run::DiscoveryRunStats;
use aegis_domain_models::job::Job;
use aegis_domain_models::{BusEvent, DiscoveryStage, OrganizationId, OverallRisk, RunStatus};
use aegis_domain_risk::{RiskConfig, RiskEngine, ASSESSOR_VERSION};
use chrono::{Duration, Utc};
use tracing::{error, info, warn};

use crate::errors::{classify_connector_error, ConnectorFailureAction};
use crate::state::WorkerState;

const HIGH_RISK_NOTIFICATION_FLOOR: OverallRisk = OverallRisk::High;
const ALGORITHMS: [&str; 4] = ["velocity", "batch", "off_hours", "ai_provider"];

enum Completion {
    Done(DiscoveryRunStats),
    Deferred,
}

/// Whether the pagination loop ran to exhaustion or was asked to stop.
enum PaginationOutcome {
    Completed,
    Cancelled,
}

pub async fn handle(state: WorkerState, job: Job) {
    let job_id = job.id.clone();
    match run(&state, &job).await {
        Ok(Completion::Done(stats)) => {
            let result = serde_json::json!({ "automationsFound": stats.automations_found, "errors": stats.errors, "warnings": stats.warnings });
            if let Err(e) = state.job_broker.complete(&job_id, result).await {
                error!("discovery job [{job_id}] finished but could not be marked complete: {e}");
            }
        }
        Ok(Completion::Deferred) => {}
        Err(message) => {
            warn!("discovery job [{job_id}] failed: {message}");
            if let Err(e) = state.job_broker.fail(&job_id, &message).await {
                error!("discovery job [{job_id}] failed and could not be marked failed: {e}");
            }
        }
    }
}

async fn run(state: &WorkerState, job: &Job) -> Result<Completion, String> {
    let organization_id: OrganizationId = job.organization_id.clone();
    let connection_id = job
        .payload
        .get("connectionId")
        .and_then(|v| v.as_str())
        .ok_or_else(|| "discovery job payload is missing connectionId".to_string())?
        .to_string();
    let resume_run_id = job.payload.get("runId").and_then(|v| v.as_str()).map(String::from);
    let resume_cursor = job.payload.get("cursor").and_then(|v| v.as_str()).map(String::from);

    let connection = state.connections.get(&organization_id, &connection_id).await.map_err(|e| e.to_string())?;

    let run = match resume_run_id {
        Some(run_id) => state.discovery_runs.get(&organization_id, &run_id).await.map_err(|e| e.to_string())?,
        None => state.discovery_runs.create(&organization_id, &connection_id).await.map_err(|e| e.to_string())?,
    };

    state.discovery_runs.advance_stage(&organization_id, &run.id, DiscoveryStage::FetchingCredentials).await.map_err(|e| e.to_string())?;

    let (mut metadata, access_record, refresh_record) = state.credentials.get(&organization_id, &connection_id).await.map_err(|e| e.to_string())?;
    let access_token = VaultCryptoEngine::decrypt(&access_record, &state.settings.vault_master_key).map_err(|e| e.to_string())?;
    let refresh_token = refresh_record
        .map(|record| VaultCryptoEngine::decrypt(&record, &state.settings.vault_master_key))
        .transpose()
        .map_err(|e| e.to_string())?;
    let mut credential = DecryptedCredential {
        connection_id: connection_id.clone(),
        platform: connection.platform,
        access_token,
        refresh_token,
        expires_at: metadata.expires_at,
    };

    let connector = aegis_domain_connectors::resolve(connection.platform);

    if metadata.needs_refresh(Utc::now(), state.settings.credential_refresh_buffer_seconds) {
        if !connection.platform.supports_refresh() {
            warn!("discovery run [{}] found a near-expiry, non-refreshable credential on connection [{connection_id}]; proceeding until it actually expires", run.id);
        } else if let Err(reason) = refresh_credential(state, &organization_id, &connection_id, connector.as_ref(), &mut credential, &mut metadata).await {
            return quarantine_run(state, job, &run.id, &organization_id, &connection_id, connection.platform, ConnectionStatus::Expired, reason, DiscoveryRunStats::default(), &[]).await;
        }
    }

    state.discovery_runs.advance_stage(&organization_id, &run.id, DiscoveryStage::Paginating).await.map_err(|e| e.to_string())?;

    let audit_events = fetch_audit_events_leniently(connector.as_ref(), &credential, state.settings.audit_lookback_hours).await;
    let detection_config = assemble_detection_config(state, &organization_id).await;
    let risk_config = RiskConfig { base_score: state.settings.risk_score_base, per_factor_score: state.settings.risk_score_per_factor, ..RiskConfig::default() };

    let mut stats = DiscoveryRunStats::default();
    let mut cursor = resume_cursor;
    let outcome = 'paginate: loop {
        match state.discovery_runs.is_cancellation_requested(&organization_id, &run.id).await {
            Ok(true) => break 'paginate PaginationOutcome::Cancelled,
            Ok(false) => {}
            Err(e) => warn!("discovery run [{}] could not check for a cancellation request, continuing: {e}", run.id),
        }

        let page = match connector.discover_automations(&credential, cursor.clone()).await {
            Ok(page) => page,
            Err(ConnectorError::ExpiredCredentials) => {
                if !connection.platform.supports_refresh() {
                    return quarantine_run(state, job, &run.id, &organization_id, &connection_id, connection.platform, ConnectionStatus::Expired, ConnectorError::ExpiredCredentials.to_string(), stats, &[])
                        .await;
                }
                match refresh_credential(state, &organization_id, &connection_id, connector.as_ref(), &mut credential, &mut metadata).await {
                    Ok(()) => continue 'paginate,
                    Err(reason) => return quarantine_run(state, job, &run.id, &organization_id, &connection_id, connection.platform, ConnectionStatus::Expired, reason, stats, &[]).await,
                }
            }
            Err(ConnectorError::MissingPermissions(scopes)) => {
                let warning = format!("discovery proceeded with partial data — missing permissions: {}", scopes.join(", "));
                warn!("discovery run [{}]: {warning}", run.id);
                if let Err(e) = state.connections.update_status(&organization_id, &connection_id, ConnectionStatus::Active, Some(&warning)).await {
                    warn!("discovery run [{}] could not record the permission warning on connection [{connection_id}]: {e}", run.id);
                }
                stats.warnings.push(warning);
                break 'paginate PaginationOutcome::Completed;
            }
            Err(error) => return handle_pagination_failure(state, job, &run.id, &organization_id, &connection_id, connection.platform, &error, cursor, stats).await,
        };

        for raw in &page.items {
            let mut automation = normalize(organization_id.clone(), connection_id.clone(), run.id.clone(), connection.platform, raw.clone(), Utc::now());
            let matched_events = events_for_owner(&audit_events, automation.owner_info.email.as_deref());
            DetectionEngine::enrich(&mut automation, raw, &matched_events, &detection_config);
            match persist_one(state, &organization_id, &run.id, connection.platform, automation, &risk_config).await {
                Ok(is_new) => {
                    if is_new {
                        stats.automations_found += 1;
                    }
                }
                Err(message) => {
                    stats.errors += 1;
                    warn!("discovery run [{}] failed to persist an automation: {message}", run.id);
                }
            }
        }

        let _ = state.job_broker.heartbeat(&job.id).await;
        state
            .event_bus
            .publish(
                &organization_id,
                BusEvent::DiscoveryProgress {
                    connection_id: connection_id.clone(),
                    progress: 40,
                    status: "paginating".to_string(),
                    items_found: stats.automations_found,
                    stage: Some("paginating".to_string()),
                    at: Utc::now(),
                },
            )
            .await;

        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break 'paginate PaginationOutcome::Completed,
        }
    };

    if matches!(outcome, PaginationOutcome::Cancelled) {
        state.discovery_runs.complete(&organization_id, &run.id, RunStatus::Cancelled, stats.clone(), &ALGORITHMS.map(String::from)).await.map_err(|e| e.to_string())?;
        info!("discovery run [{}] cancelled on connection [{connection_id}]; {} automation(s) already persisted are kept", run.id, stats.automations_found);
        return Ok(Completion::Done(stats));
    }

    let removed = state.automations.mark_unseen_inactive(&organization_id, &connection_id, &run.id).await.map_err(|e| e.to_string())?;
    if removed > 0 {
        info!("discovery run [{}] marked {removed} automation(s) on connection [{connection_id}] inactive", run.id);
    }

    if let Ok(active_automations) = state.automations.list(&organization_id, Some(&connection_id), false).await {
        let groups = Correlator::default().correlate(&active_automations);
        for group in &groups {
            info!(
                "discovery run [{}] correlated {} automation(s) with confidence {:.2}: {:?}",
                run.id,
                group.automation_ids.len(),
                group.confidence,
                group.signals
            );
        }
    }

    state.discovery_runs.advance_stage(&organization_id, &run.id, DiscoveryStage::Done).await.map_err(|e| e.to_string())?;
    state.discovery_runs.complete(&organization_id, &run.id, RunStatus::Completed, stats.clone(), &ALGORITHMS.map(String::from)).await.map_err(|e| e.to_string())?;
    state.connections.record_sync(&organization_id, &connection_id, Utc::now()).await.map_err(|e| e.to_string())?;

    state
        .event_bus
        .publish(
            &organization_id,
            BusEvent::ConnectionUpdate { connection_id: connection_id.clone(), status: "active".to_string(), platform: connection.platform, at: Utc::now(), error: None },
        )
        .await;

    Ok(Completion::Done(stats))
}

/// Exchanges a refresh token for a fresh access token, reseals both and
/// the metadata sidecar through the vault, and updates `credential` /
/// `metadata` in place so the caller can retry immediately with them.
async fn refresh_credential(
    state: &WorkerState,
    organization_id: &OrganizationId,
    connection_id: &str,
    connector: &dyn Connector,
    credential: &mut DecryptedCredential,
    metadata: &mut EncryptedCredential,
) -> Result<(), String> {
    let refreshed = connector.refresh_credentials(credential).await.map_err(|e| e.to_string())?;

    let access_record = VaultCryptoEngine::encrypt(&refreshed.access_token, &state.settings.vault_master_key, state.settings.vault_key_version).map_err(|e| e.to_string())?;
    let refresh_record = refreshed
        .refresh_token
        .as_deref()
        .map(|token| VaultCryptoEngine::encrypt(token, &state.settings.vault_master_key, state.settings.vault_key_version))
        .transpose()
        .map_err(|e| e.to_string())?;

    metadata.expires_at = refreshed.expires_at;
    metadata.status = CredentialStatus::Active;
    state.credentials.upsert(organization_id, connection_id, metadata, &access_record, refresh_record.as_ref()).await.map_err(|e| e.to_string())?;

    credential.access_token = refreshed.access_token;
    if refreshed.refresh_token.is_some() {
        credential.refresh_token = refreshed.refresh_token;
    }
    credential.expires_at = refreshed.expires_at;
    info!("refreshed credential on connection [{connection_id}]");
    Ok(())
}

/// Ends the run as `Failed`, the connection as `connection_status`, and the
/// credential as `Expired` — the shared tail of every unrecoverable
/// connector failure, whether it reached here via
/// [`classify_connector_error`]'s quarantine arm or via an exhausted
/// credential refresh.
async fn quarantine_run(
    state: &WorkerState,
    job: &Job,
    run_id: &str,
    organization_id: &OrganizationId,
    connection_id: &str,
    platform: Platform,
    connection_status: ConnectionStatus,
    reason: String,
    mut stats: DiscoveryRunStats,
    algorithms_executed: &[String],
) -> Result<Completion, String> {
    state.connections.update_status(organization_id, connection_id, connection_status, Some(&reason)).await.map_err(|e| e.to_string())?;
    state.credentials.mark_status(organization_id, connection_id, CredentialStatus::Expired).await.map_err(|e| e.to_string())?;
    stats.errors += 1;
    state.discovery_runs.complete(organization_id, run_id, RunStatus::Failed, stats, algorithms_executed).await.map_err(|e| e.to_string())?;
    state
        .event_bus
        .publish(
            organization_id,
            BusEvent::ConnectionUpdate { connection_id: connection_id.to_string(), status: "error".to_string(), platform, at: Utc::now(), error: Some(reason.clone()) },
        )
        .await;
    let _ = state.job_broker.fail(&job.id, &reason).await;
    Ok(Completion::Deferred)
}

async fn handle_pagination_failure(
    state: &WorkerState,
    job: &Job,
    run_id: &str,
    organization_id: &OrganizationId,
    connection_id: &str,
    platform: Platform,
    error: &ConnectorError,
    cursor: Option<String>,
    stats: DiscoveryRunStats,
) -> Result<Completion, String> {
    match classify_connector_error(error) {
        ConnectorFailureAction::RescheduleAfter(delay) => {
            let payload = serde_json::json!({ "connectionId": connection_id, "runId": run_id, "cursor": cursor });
            state.job_broker.reschedule(&job.id, delay, Some(payload)).await.map_err(|e| e.to_string())?;
            Ok(Completion::Deferred)
        }
        ConnectorFailureAction::QuarantineConnection(reason) => quarantine_run(state, job, run_id, organization_id, connection_id, platform, ConnectionStatus::Error, reason, stats, &[]).await,
        ConnectorFailureAction::Retry(reason) => Err(reason),
    }
}

async fn fetch_audit_events_leniently(connector: &dyn Connector, credential: &DecryptedCredential, lookback_hours: i64) -> Vec<NormalizedAuditEvent> {
    let since = Utc::now() - Duration::hours(lookback_hours);
    let until = Utc::now();
    let mut events = Vec::new();
    let mut cursor = None;

    loop {
        let query = AuditQuery { since, until, cursor: cursor.clone() };
        match connector.get_audit_logs(credential, query).await {
            Ok(page) => {
                events.extend(page.items);
                match page.next_cursor {
                    Some(next) => cursor = Some(next),
                    None => break,
                }
            }
            Err(error) => {
                warn!("audit log pagination stopped early, proceeding with {} event(s) already fetched: {error}", events.len());
                break;
            }
        }
    }

    events
}

fn events_for_owner(events: &[NormalizedAuditEvent], owner_email: Option<&str>) -> Vec<NormalizedAuditEvent> {
    let Some(owner_email) = owner_email else { return Vec::new() };
    events.iter().filter(|event| event.actor_email.as_deref().is_some_and(|actor| actor.eq_ignore_ascii_case(owner_email))).cloned().collect()
}

/// Persists one normalized automation and scores it. Returns whether the
/// row was newly inserted, so the caller only counts genuinely new
/// automations toward `automationsFound` — a re-run over unchanged
/// upstream data must report zero.
async fn persist_one(
    state: &WorkerState,
    organization_id: &OrganizationId,
    run_id: &str,
    platform: Platform,
    automation: DiscoveredAutomation,
    risk_config: &RiskConfig,
) -> Result<bool, String> {
    let (persisted, is_new) = state.automations.upsert_discovered(organization_id, &automation).await.map_err(|e| e.to_string())?;
    let outcome = RiskEngine::assess(&persisted.detection_metadata, risk_config);
    state
        .risk_assessments
        .create(organization_id, &persisted.id, outcome.overall_risk, outcome.risk_score, &outcome.risk_factors, ASSESSOR_VERSION)
        .await
        .map_err(|e| e.to_string())?;

    if outcome.overall_risk >= HIGH_RISK_NOTIFICATION_FLOOR {
        let payload = serde_json::json!({
            "automationId": persisted.id,
            "name": persisted.name,
            "overallRisk": format!("{:?}", outcome.overall_risk),
            "riskScore": outcome.risk_score,
        });
        let _ = state.job_broker.enqueue_notification(organization_id, run_id, payload, outcome.overall_risk == OverallRisk::Critical).await;
    }

    state
        .event_bus
        .publish(
            organization_id,
            BusEvent::AutomationDiscovered {
                automation_id: persisted.id.clone(),
                name: persisted.name.clone(),
                platform,
                risk_level: outcome.overall_risk,
                at: Utc::now(),
                risk_score: Some(outcome.risk_score),
                automation_type: Some(format!("{:?}", persisted.automation_type)),
            },
        )
        .await;

    Ok(is_new)
}

async fn assemble_detection_config(state: &WorkerState, organization_id: &OrganizationId) -> DetectionConfig {
    let mut config = DetectionConfig::default();
    for code in [DetectorCode::Velocity, DetectorCode::OffHours, DetectorCode::Batch, DetectorCode::AiProvider] {
        if let Ok(Some(row)) = state.detector_configurations.get_active(organization_id, code).await {
            apply_threshold_overrides(&mut config, code, &row.thresholds);
        }
    }
    config
}

fn apply_threshold_overrides(config: &mut DetectionConfig, code: DetectorCode, thresholds: &serde_json::Value) {
    match code {
        DetectorCode::Velocity => {
            if let Some(delta) = thresholds.get("velocity_threshold_events_delta").and_then(|v| v.as_i64()) {
                config.velocity_threshold_events = (config.velocity_threshold_events as i64 + delta).max(1) as u32;
            }
            if let Some(value) = thresholds.get("velocity_threshold_events").and_then(|v| v.as_u64()) {
                config.velocity_threshold_events = value as u32;
            }
        }
        DetectorCode::Batch => {
            if let Some(value) = thresholds.get("batch_size_threshold").and_then(|v| v.as_u64()) {
                config.batch_size_threshold = value as u32;
            }
        }
        DetectorCode::AiProvider => {
            if let Some(delta) = thresholds.get("confidence_floor_delta").and_then(|v| v.as_f64()) {
                config.ai_provider_confidence_threshold = (config.ai_provider_confidence_threshold + delta).clamp(0.0, 1.0);
            }
        }
        DetectorCode::OffHours => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event(actor_email: Option<&str>) -> NormalizedAuditEvent {
        NormalizedAuditEvent {
            external_id: "evt-1".to_string(),
            actor_email: actor_email.map(String::from),
            action: "grant.created".to_string(),
            occurred_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            target_count: 1,
            data_access_patterns: Vec::new(),
        }
    }

    #[test]
    fn events_for_owner_matches_case_insensitively() {
        let events = vec![event(Some("Owner@Example.com")), event(Some("someone-else@example.com"))];
        let matched = events_for_owner(&events, Some("owner@example.com"));
        assert_eq!(matched.len(), 1);
    }

    #[test]
    fn events_for_owner_is_empty_without_an_owner_email() {
        let events = vec![event(Some("owner@example.com"))];
        assert!(events_for_owner(&events, None).is_empty());
    }

    #[test]
    fn events_for_owner_skips_events_with_no_actor() {
        let events = vec![event(None)];
        assert!(events_for_owner(&events, Some("owner@example.com")).is_empty());
    }

    #[test]
    fn velocity_delta_floors_at_one_and_never_goes_negative() {
        let mut config = DetectionConfig { velocity_threshold_events: 3, ..DetectionConfig::default() };
        apply_threshold_overrides(&mut config, DetectorCode::Velocity, &serde_json::json!({ "velocity_threshold_events_delta": -10 }));
        assert_eq!(config.velocity_threshold_events, 1);
    }

    #[test]
    fn velocity_absolute_override_replaces_the_delta_result() {
        let mut config = DetectionConfig::default();
        apply_threshold_overrides(&mut config, DetectorCode::Velocity, &serde_json::json!({ "velocity_threshold_events": 42 }));
        assert_eq!(config.velocity_threshold_events, 42);
    }

    #[test]
    fn batch_size_threshold_overrides_directly() {
        let mut config = DetectionConfig::default();
        apply_threshold_overrides(&mut config, DetectorCode::Batch, &serde_json::json!({ "batch_size_threshold": 7 }));
        assert_eq!(config.batch_size_threshold, 7);
    }

    #[test]
    fn ai_provider_confidence_floor_delta_is_clamped_to_unit_interval() {
        let mut config = DetectionConfig { ai_provider_confidence_threshold: 0.9, ..DetectionConfig::default() };
        apply_threshold_overrides(&mut config, DetectorCode::AiProvider, &serde_json::json!({ "confidence_floor_delta": 0.5 }));
        assert_eq!(config.ai_provider_confidence_threshold, 1.0);
    }

    #[test]
    fn off_hours_has_no_override_surface() {
        let mut config = DetectionConfig::default();
        let before = config.clone();
        apply_threshold_overrides(&mut config, DetectorCode::OffHours, &serde_json::json!({ "anything": 1 }));
        assert_eq!(config.velocity_threshold_events, before.velocity_threshold_events);
    }
}
