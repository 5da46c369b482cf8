// [apps/api/src/config.rs]
//! Flat env-var bootstrap, loaded once at process start. Matches the
//! corpus's bootstrapping style (read-and-parse in `main`) rather than a
//! layered config-file system.

use std::collections::HashMap;
use std::env;

use aegis_domain_models::connection::Platform;

/// OAuth client id/secret for one platform. Not every platform needs
/// both halves (ChatGPT/Claude/Gemini authenticate with a static API key
/// instead), so this is read defensively and left empty where unset.
#[derive(Debug, Clone, Default)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub database_auth_token: Option<String>,
    pub vault_master_key: String,
    pub vault_key_version: u32,
    pub oauth_clients: HashMap<Platform, OAuthClient>,
    pub chatgpt_api_key: Option<String>,
    pub claude_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub discovery_interval_hours: u32,
    pub discovery_timeout_minutes: u32,
    pub feedback_review_interval_hours: u32,
    pub risk_score_base: u8,
    pub risk_score_per_factor: u8,
    pub bind_addr: String,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|raw| raw.parse().ok()).unwrap_or(default)
}

fn oauth_client(prefix: &str) -> OAuthClient {
    OAuthClient {
        client_id: env::var(format!("{prefix}_CLIENT_ID")).unwrap_or_default(),
        client_secret: env::var(format!("{prefix}_CLIENT_SECRET")).unwrap_or_default(),
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let mut oauth_clients = HashMap::new();
        oauth_clients.insert(Platform::Slack, oauth_client("SLACK"));
        oauth_clients.insert(Platform::Google, oauth_client("GOOGLE"));
        oauth_clients.insert(Platform::Microsoft, oauth_client("MICROSOFT"));
        oauth_clients.insert(Platform::Jira, oauth_client("JIRA"));

        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            database_auth_token: env::var("DATABASE_AUTH_TOKEN").ok(),
            vault_master_key: env::var("VAULT_MASTER_KEY").expect("VAULT_MASTER_KEY must be set"),
            vault_key_version: parse_or("VAULT_KEY_VERSION", 1),
            oauth_clients,
            chatgpt_api_key: env::var("CHATGPT_API_KEY").ok(),
            claude_api_key: env::var("CLAUDE_API_KEY").ok(),
            gemini_api_key: env::var("GEMINI_API_KEY").ok(),
            discovery_interval_hours: parse_or("DISCOVERY_INTERVAL_HOURS", 24),
            discovery_timeout_minutes: parse_or("DISCOVERY_TIMEOUT_MINUTES", 30),
            feedback_review_interval_hours: parse_or("FEEDBACK_REVIEW_CADENCE_HOURS", 24),
            risk_score_base: parse_or("RISK_SCORE_BASE", 30),
            risk_score_per_factor: parse_or("RISK_SCORE_PER_FACTOR", 15),
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:8080"),
        }
    }
}
