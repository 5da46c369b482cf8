// [libs/domain/detection/src/types.rs]
use aegis_domain_models::detector_configuration::DetectorCode;

/// One detector's output, folded by the Risk Engine into
/// `DetectionMetadata.risk_factors`.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorFinding {
    pub code: DetectorCode,
    pub description: String,
    pub weight: f64,
    pub evidence: Vec<String>,
}

/// A single AI-provider pattern match, combined multiplicatively with
/// others of the same kind up to `AiProviderRecognizer::CONFIDENCE_CAP`.
#[derive(Debug, Clone, PartialEq)]
pub struct AiProviderMatch {
    pub provider: String,
    pub matched_by: String,
    pub confidence: f64,
    pub evidence: Vec<String>,
}

/// An equivalence class the correlator believes represents one logical
/// workflow spanning multiple platforms. Annotation only — the
/// underlying `DiscoveredAutomation` rows are never merged.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationGroup {
    pub automation_ids: Vec<String>,
    pub confidence: f64,
    pub signals: Vec<String>,
}

/// Matches the `#[serde(rename_all = "snake_case")]` on `DetectorCode`
/// itself, so a `RiskFactor.code` string round-trips with whatever the
/// detector configuration repository persists for the same code.
pub fn detector_code_str(code: DetectorCode) -> &'static str {
    match code {
        DetectorCode::Velocity => "velocity",
        DetectorCode::OffHours => "off_hours",
        DetectorCode::Batch => "batch",
        DetectorCode::AiProvider => "ai_provider",
    }
}
