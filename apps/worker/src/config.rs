// [apps/worker/src/config.rs]
//! Flat env-var bootstrap, same style as `apps/api`'s `Settings` — read
//! once in `main`, cloned behind an `Arc` from there down.

use std::env;

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub database_auth_token: Option<String>,
    pub vault_master_key: String,
    pub vault_key_version: u32,
    pub credential_refresh_buffer_seconds: i64,
    pub discovery_concurrency: usize,
    pub risk_assessment_concurrency: usize,
    pub notifications_concurrency: usize,
    pub poll_interval_idle_ms: u64,
    pub staleness_window_days: i64,
    pub audit_lookback_hours: i64,
    pub risk_score_base: u8,
    pub risk_score_per_factor: u8,
    pub feedback_review_window_seconds: i64,
    pub feedback_review_cadence_hours: i64,
    pub discovery_cadence_hours: u32,
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|raw| raw.parse().ok()).unwrap_or(default)
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            database_auth_token: env::var("DATABASE_AUTH_TOKEN").ok(),
            vault_master_key: env::var("VAULT_MASTER_KEY").expect("VAULT_MASTER_KEY must be set"),
            vault_key_version: parse_or("VAULT_KEY_VERSION", 1),
            credential_refresh_buffer_seconds: parse_or("CREDENTIAL_REFRESH_BUFFER_SECONDS", 300),
            discovery_concurrency: parse_or("WORKER_DISCOVERY_CONCURRENCY", 4),
            risk_assessment_concurrency: parse_or("WORKER_RISK_ASSESSMENT_CONCURRENCY", 4),
            notifications_concurrency: parse_or("WORKER_NOTIFICATIONS_CONCURRENCY", 2),
            poll_interval_idle_ms: parse_or("WORKER_POLL_INTERVAL_IDLE_MS", 2_000),
            staleness_window_days: parse_or("STALENESS_WINDOW_DAYS", 7),
            audit_lookback_hours: parse_or("AUDIT_LOOKBACK_HOURS", 24),
            risk_score_base: parse_or("RISK_SCORE_BASE", 30),
            risk_score_per_factor: parse_or("RISK_SCORE_PER_FACTOR", 15),
            feedback_review_window_seconds: parse_or("FEEDBACK_REVIEW_WINDOW_SECONDS", 7 * 24 * 3600),
            feedback_review_cadence_hours: parse_or("FEEDBACK_REVIEW_CADENCE_HOURS", 24),
            discovery_cadence_hours: parse_or("DISCOVERY_INTERVAL_HOURS", 24),
        }
    }
}
