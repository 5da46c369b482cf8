// [libs/domain/detection/src/pattern_table.rs]
use std::sync::OnceLock;

use aegis_domain_connectors::types::RawAutomation;
use regex::Regex;

use crate::types::AiProviderMatch;

/// `matched_by` names the observable property a pattern was evaluated
/// against; `weight` combines multiplicatively with other weak signals,
/// capped at `AiProviderRecognizer::CONFIDENCE_CAP`, unless `strong` is
/// set, in which case a single match short-circuits to high confidence.
struct PatternRow {
    pattern: &'static str,
    provider: &'static str,
    matched_by: &'static str,
    weight: f64,
    strong: bool,
}

const CLIENT_ID_ROWS: &[PatternRow] = &[
    PatternRow { pattern: r"^(?i)openai-", provider: "OpenAI", matched_by: "client_id", weight: 0.95, strong: true },
    PatternRow { pattern: r"^(?i)anthropic-", provider: "Anthropic", matched_by: "client_id", weight: 0.95, strong: true },
];

const NAME_ROWS: &[PatternRow] = &[
    PatternRow { pattern: r"(?i)chatgpt|gpt-\d|openai", provider: "OpenAI", matched_by: "name", weight: 0.6, strong: false },
    PatternRow { pattern: r"(?i)claude|anthropic", provider: "Anthropic", matched_by: "name", weight: 0.6, strong: false },
    PatternRow { pattern: r"(?i)gemini|bard|vertex ai", provider: "Google AI", matched_by: "name", weight: 0.6, strong: false },
    PatternRow { pattern: r"(?i)cohere", provider: "Cohere", matched_by: "name", weight: 0.6, strong: false },
    PatternRow { pattern: r"(?i)hugging\s?face", provider: "HuggingFace", matched_by: "name", weight: 0.6, strong: false },
    PatternRow { pattern: r"(?i)replicate\.com|replicate ai", provider: "Replicate", matched_by: "name", weight: 0.6, strong: false },
    PatternRow { pattern: r"(?i)mistral", provider: "Mistral", matched_by: "name", weight: 0.6, strong: false },
    PatternRow { pattern: r"(?i)together\.ai|togethercompute", provider: "Together.ai", matched_by: "name", weight: 0.6, strong: false },
];

const USER_AGENT_ROWS: &[PatternRow] = &[
    PatternRow { pattern: r"(?i)openai-python|openai-node", provider: "OpenAI", matched_by: "user_agent", weight: 0.7, strong: false },
    PatternRow { pattern: r"(?i)anthropic-sdk", provider: "Anthropic", matched_by: "user_agent", weight: 0.7, strong: false },
];

const SCOPE_ROWS: &[PatternRow] = &[
    PatternRow { pattern: r"(?i)generativelanguage\.googleapis\.com", provider: "Google AI", matched_by: "scope", weight: 0.5, strong: false },
];

struct CompiledRow {
    regex: Regex,
    provider: &'static str,
    matched_by: &'static str,
    weight: f64,
    strong: bool,
}

fn compile_all() -> Vec<CompiledRow> {
    [CLIENT_ID_ROWS, NAME_ROWS, USER_AGENT_ROWS, SCOPE_ROWS]
        .iter()
        .flat_map(|rows| rows.iter())
        .filter_map(|row| {
            Regex::new(row.pattern).ok().map(|regex| CompiledRow {
                regex,
                provider: row.provider,
                matched_by: row.matched_by,
                weight: row.weight,
                strong: row.strong,
            })
        })
        .collect()
}

fn compiled_table() -> &'static Vec<CompiledRow> {
    static TABLE: OnceLock<Vec<CompiledRow>> = OnceLock::new();
    TABLE.get_or_init(compile_all)
}

/// Stateless recognizer: a single evaluation method taking the
/// normalized automation record and returning the strongest combined
/// provider match, if any field matched.
pub struct AiProviderRecognizer;

impl AiProviderRecognizer {
    const CONFIDENCE_CAP: f64 = 0.97;

    pub fn recognize(automation: &RawAutomation) -> Option<AiProviderMatch> {
        let candidates = [
            automation.client_id.as_deref().map(|v| ("client_id", v.to_string())),
            Some(("name", automation.name.clone())),
            automation.user_agent.as_deref().map(|v| ("user_agent", v.to_string())),
        ]
        .into_iter()
        .flatten()
        .chain(automation.scopes.iter().map(|s| ("scope", s.clone())));

        let mut best_by_provider: std::collections::HashMap<&'static str, AiProviderMatch> = std::collections::HashMap::new();

        for (field, value) in candidates {
            for row in compiled_table() {
                if row.matched_by != field {
                    continue;
                }
                if !row.regex.is_match(&value) {
                    continue;
                }

                let evidence = format!("{}:{} matched /{}/", row.matched_by, value, row.regex.as_str());
                let entry = best_by_provider.entry(row.provider).or_insert_with(|| AiProviderMatch {
                    provider: row.provider.to_string(),
                    matched_by: row.matched_by.to_string(),
                    confidence: 0.0,
                    evidence: Vec::new(),
                });

                if row.strong {
                    entry.confidence = Self::CONFIDENCE_CAP;
                } else {
                    entry.confidence = (1.0 - (1.0 - entry.confidence) * (1.0 - row.weight)).min(Self::CONFIDENCE_CAP);
                }
                entry.evidence.push(evidence);
            }
        }

        best_by_provider.into_values().max_by(|a, b| a.confidence.partial_cmp(&b.confidence).unwrap_or(std::cmp::Ordering::Equal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn automation(name: &str, client_id: Option<&str>, scopes: Vec<&str>) -> RawAutomation {
        RawAutomation {
            external_id: "ext-1".to_string(),
            name: name.to_string(),
            description: None,
            owner_email: None,
            owner_name: None,
            scopes: scopes.into_iter().map(String::from).collect(),
            created_at: None,
            last_triggered_at: None,
            trigger_type: None,
            client_id: client_id.map(String::from),
            user_agent: None,
            raw: serde_json::Value::Null,
        }
    }

    #[test]
    fn strong_client_id_signal_short_circuits_to_high_confidence() {
        let automation = automation("generic bot", Some("openai-connector-7"), vec![]);
        let result = AiProviderRecognizer::recognize(&automation).expect("expected a match");

        assert_eq!(result.provider, "OpenAI");
        assert!(result.confidence >= 0.95);
    }

    #[test]
    fn weak_signals_combine_multiplicatively() {
        let mut automation = automation("My Claude Assistant", None, vec![]);
        automation.user_agent = Some("anthropic-sdk-python/0.9".to_string());
        let result = AiProviderRecognizer::recognize(&automation).expect("expected a match");

        // name alone (0.6) combined with user_agent (0.7): 1 - (1-0.6)*(1-0.7) = 0.88
        assert_eq!(result.provider, "Anthropic");
        assert!(result.confidence > 0.6 && result.confidence < AiProviderRecognizer::CONFIDENCE_CAP);
    }

    #[test]
    fn no_signal_returns_none() {
        let automation = automation("Unrelated Internal Tool", None, vec![]);
        assert!(AiProviderRecognizer::recognize(&automation).is_none());
    }
}
