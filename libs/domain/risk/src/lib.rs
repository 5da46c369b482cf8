//! Computes `{overallRisk, riskScore, riskFactors}` from detection output
//! and platform metadata, with tenant-overridable per-factor weights.

pub mod config;
pub mod engine;

pub use config::RiskConfig;
pub use engine::{RiskEngine, RiskOutcome, ASSESSOR_VERSION};
