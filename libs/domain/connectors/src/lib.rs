//! Uniform capability contract over heterogeneous SaaS audit APIs: one
//! `Connector` trait, one adapter per platform (Slack, Google, Microsoft,
//! Jira, ChatGPT, Claude, Gemini). Export-and-poll platforms (Claude) hide
//! that retrieval style entirely behind `get_audit_logs`.

pub mod adapters;
pub mod connector_trait;
pub mod errors;
pub mod http;
pub mod oauth;
pub mod types;

pub use connector_trait::Connector;
pub use errors::ConnectorError;

use aegis_domain_models::Platform;
use std::sync::Arc;

/// Resolves the adapter for a platform. The worker and discovery job
/// handler never construct an adapter directly — they go through this so
/// adding an eighth platform touches one place.
pub fn resolve(platform: Platform) -> Arc<dyn Connector> {
    match platform {
        Platform::Slack => Arc::new(adapters::slack::SlackConnector::new()),
        Platform::Google => Arc::new(adapters::google::GoogleConnector::new()),
        Platform::Microsoft => Arc::new(adapters::microsoft::MicrosoftConnector::new()),
        Platform::Jira => Arc::new(adapters::jira::JiraConnector::new()),
        Platform::Chatgpt => Arc::new(adapters::chatgpt::ChatGptConnector::new()),
        Platform::Claude => Arc::new(adapters::claude::ClaudeConnector::new()),
        Platform::Gemini => Arc::new(adapters::gemini::GeminiConnector::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_returns_matching_platform_for_every_variant() {
        let platforms = [
            Platform::Slack,
            Platform::Google,
            Platform::Microsoft,
            Platform::Jira,
            Platform::Chatgpt,
            Platform::Claude,
            Platform::Gemini,
        ];
        for platform in platforms {
            assert_eq!(resolve(platform).platform(), platform);
        }
    }
}
