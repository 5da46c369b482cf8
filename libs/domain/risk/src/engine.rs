// [libs/domain/risk/src/engine.rs]
use aegis_domain_models::automation::DetectionMetadata;
use aegis_domain_models::risk_assessment::{OverallRisk, RiskFactor};

use crate::config::RiskConfig;

pub const ASSESSOR_VERSION: &str = "risk-engine-v1";

/// The AI-platform baseline score: a `detectionMetadata.isAIPlatform`
/// match short-circuits the factor-count rule entirely.
const AI_PLATFORM_BASELINE_SCORE: u8 = 85;

#[derive(Debug, Clone, PartialEq)]
pub struct RiskOutcome {
    pub overall_risk: OverallRisk,
    pub risk_score: u8,
    pub risk_factors: Vec<RiskFactor>,
}

/// Stateless struct, one evaluation method: snapshot of detection output
/// in, risk verdict out. Mirrors `DecisionEngine::evaluate_node_efficiency`
/// taking a telemetry snapshot and returning a verdict enum.
pub struct RiskEngine;

impl RiskEngine {
    pub fn assess(detection: &DetectionMetadata, config: &RiskConfig) -> RiskOutcome {
        let factors = Self::apply_weight_overrides(&detection.risk_factors, config);

        if detection.is_ai_platform {
            return RiskOutcome { overall_risk: OverallRisk::High, risk_score: AI_PLATFORM_BASELINE_SCORE, risk_factors: factors };
        }

        let count = factors.len();
        let overall_risk = match count {
            0 => OverallRisk::Low,
            1 | 2 => OverallRisk::Medium,
            3 | 4 => OverallRisk::High,
            _ => OverallRisk::Critical,
        };
        let risk_score = (config.base_score as usize + config.per_factor_score as usize * count).min(100) as u8;

        RiskOutcome { overall_risk, risk_score, risk_factors: factors }
    }

    fn apply_weight_overrides(factors: &[RiskFactor], config: &RiskConfig) -> Vec<RiskFactor> {
        factors
            .iter()
            .map(|factor| RiskFactor { code: factor.code.clone(), description: factor.description.clone(), weight: config.weight_for(&factor.code, factor.weight) })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factor(code: &str) -> RiskFactor {
        RiskFactor { code: code.to_string(), description: "test finding".to_string(), weight: 1.0 }
    }

    fn detection(is_ai_platform: bool, factors: Vec<RiskFactor>) -> DetectionMetadata {
        DetectionMetadata { is_ai_platform, risk_factors: factors, ..Default::default() }
    }

    #[test]
    fn ai_platform_short_circuits_to_high_with_baseline_score() {
        let outcome = RiskEngine::assess(&detection(true, vec![factor("velocity")]), &RiskConfig::default());
        assert_eq!(outcome.overall_risk, OverallRisk::High);
        assert_eq!(outcome.risk_score, 85);
    }

    #[test]
    fn zero_factors_is_low_risk() {
        let outcome = RiskEngine::assess(&detection(false, vec![]), &RiskConfig::default());
        assert_eq!(outcome.overall_risk, OverallRisk::Low);
        assert_eq!(outcome.risk_score, 30);
    }

    #[test]
    fn five_factors_is_critical_and_score_caps_at_100() {
        let factors = (0..5).map(|i| factor(&format!("factor-{i}"))).collect();
        let outcome = RiskEngine::assess(&detection(false, factors), &RiskConfig::default());
        assert_eq!(outcome.overall_risk, OverallRisk::Critical);
        assert_eq!(outcome.risk_score, 100);
    }

    #[test]
    fn three_factors_is_high() {
        let factors = vec![factor("velocity"), factor("batch"), factor("off_hours")];
        let outcome = RiskEngine::assess(&detection(false, factors), &RiskConfig::default());
        assert_eq!(outcome.overall_risk, OverallRisk::High);
        assert_eq!(outcome.risk_score, 75);
    }

    #[test]
    fn tenant_weight_override_replaces_default_weight() {
        let mut config = RiskConfig::default();
        config.factor_weight_overrides.insert("velocity".to_string(), 3.5);

        let outcome = RiskEngine::assess(&detection(false, vec![factor("velocity")]), &config);
        assert_eq!(outcome.risk_factors[0].weight, 3.5);
    }
}
