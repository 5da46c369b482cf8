// [libs/domain/risk/src/config.rs]
use std::collections::HashMap;

/// Per-tenant override of a detector's default weight, keyed by the same
/// `DetectorCode` string (`"velocity"`, `"off_hours"`, `"batch"`,
/// `"ai_provider"`) the detection engine writes into `RiskFactor.code`.
#[derive(Debug, Clone)]
pub struct RiskConfig {
    pub factor_weight_overrides: HashMap<String, f64>,
    /// `riskScore` floor when at least one factor fired (`RISK_SCORE_BASE`, default 30).
    pub base_score: u8,
    /// Added per risk factor on top of `base_score` (`RISK_SCORE_PER_FACTOR`, default 15).
    pub per_factor_score: u8,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self { factor_weight_overrides: HashMap::new(), base_score: 30, per_factor_score: 15 }
    }
}

impl RiskConfig {
    pub fn weight_for(&self, code: &str, default_weight: f64) -> f64 {
        self.factor_weight_overrides.get(code).copied().unwrap_or(default_weight)
    }
}
