// [apps/api/src/handlers/automations.rs]
//! Read surface over discovered automations. Filtering and pagination
//! happen in this layer rather than in SQL: `AutomationRepository::list`
//! only scopes by connection/active-state, which is the shape the
//! discovery worker needs; the richer `platform`/`riskLevel`/`search`
//! query here is a facade-only concern.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use aegis_domain_models::connection::Platform;
use aegis_domain_models::risk_assessment::{OverallRisk, RiskAssessment};
use aegis_domain_models::DiscoveredAutomation;

use crate::errors::{db_not_found, ApiError};
use crate::middleware::TenantIdentity;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListQuery {
    pub platform: Option<String>,
    pub risk_level: Option<String>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub connection_id: Option<String>,
    pub include_inactive: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub items: Vec<DiscoveredAutomation>,
    pub total: usize,
    pub page: u32,
    pub page_size: u32,
}

fn parse_platform_filter(raw: &str) -> Option<Platform> {
    match raw.to_ascii_lowercase().as_str() {
        "slack" => Some(Platform::Slack),
        "google" => Some(Platform::Google),
        "microsoft" => Some(Platform::Microsoft),
        "jira" => Some(Platform::Jira),
        "chatgpt" => Some(Platform::Chatgpt),
        "claude" => Some(Platform::Claude),
        "gemini" => Some(Platform::Gemini),
        _ => None,
    }
}

fn parse_risk_filter(raw: &str) -> Option<OverallRisk> {
    match raw.to_ascii_lowercase().as_str() {
        "low" => Some(OverallRisk::Low),
        "medium" => Some(OverallRisk::Medium),
        "high" => Some(OverallRisk::High),
        "critical" => Some(OverallRisk::Critical),
        _ => None,
    }
}

/// `GET /automations?platform=&riskLevel=&search=&page=&pageSize=`
pub async fn list(State(state): State<AppState>, Extension(identity): Extension<TenantIdentity>, Query(query): Query<ListQuery>) -> Result<Json<ListResponse>, ApiError> {
    let candidates = state.automations.list(&identity.organization_id, query.connection_id.as_deref(), query.include_inactive).await?;

    let platform_filter = query.platform.as_deref().map(parse_platform_filter);
    let risk_filter = query.risk_level.as_deref().map(parse_risk_filter);
    let search_filter = query.search.as_deref().map(|value| value.to_ascii_lowercase());

    let mut connection_platform_cache = std::collections::HashMap::new();
    let mut filtered = Vec::new();
    for automation in candidates {
        if let Some(ref expected) = platform_filter {
            let platform = match connection_platform_cache.get(&automation.connection_id) {
                Some(platform) => *platform,
                None => {
                    let connection = state.connections.get(&identity.organization_id, &automation.connection_id).await?;
                    connection_platform_cache.insert(automation.connection_id.clone(), connection.platform);
                    connection.platform
                }
            };
            if Some(platform) != *expected {
                continue;
            }
        }

        if let Some(ref expected_risk) = risk_filter {
            let latest = state.risk_assessments.latest_for_automation(&identity.organization_id, &automation.id).await;
            let matches = matches!(latest, Ok(ref assessment) if Some(assessment.overall_risk) == *expected_risk);
            if !matches {
                continue;
            }
        }

        if let Some(ref needle) = search_filter {
            if !automation.name.to_ascii_lowercase().contains(needle.as_str()) {
                continue;
            }
        }

        filtered.push(automation);
    }

    let total = filtered.len();
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query.page_size.unwrap_or(25).clamp(1, 200);
    let start = ((page - 1) as usize) * (page_size as usize);
    let items = filtered.into_iter().skip(start).take(page_size as usize).collect();

    Ok(Json(ListResponse { items, total, page, page_size }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationDetail {
    #[serde(flatten)]
    pub automation: DiscoveredAutomation,
    pub latest_risk_assessment: Option<RiskAssessment>,
}

/// `GET /automations/:id` — joins in the latest `RiskAssessment`; a
/// freshly discovered automation that hasn't been scored yet still
/// returns 200 with `latestRiskAssessment: null`.
pub async fn detail(State(state): State<AppState>, Extension(identity): Extension<TenantIdentity>, Path(automation_id): Path<String>) -> Result<Json<AutomationDetail>, ApiError> {
    let automation = state.automations.get(&identity.organization_id, &automation_id).await.map_err(|error| db_not_found(error, "automation"))?;
    let latest_risk_assessment = state.risk_assessments.latest_for_automation(&identity.organization_id, &automation_id).await.ok();
    Ok(Json(AutomationDetail { automation, latest_risk_assessment }))
}
