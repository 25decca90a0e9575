//! Reason codes explaining how a verdict was reached

use serde::{Deserialize, Serialize};

/// Reason codes for every decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum ReasonCode {
    // =========================================================================
    // R1xx: Model bands
    // =========================================================================
    /// P(human) at or above the upper cutoff
    R101_MODEL_ABOVE_HIGH,
    /// P(human) between the cutoffs
    R102_MODEL_BETWEEN_BANDS,
    /// P(human) below the lower cutoff
    R103_MODEL_BELOW_LOW,

    // =========================================================================
    // R2xx: Rule paths
    // =========================================================================
    /// Sanity rule passed and forced HUMAN over the model
    R201_SANITY_OVERRIDE,
    /// No model loaded; sanity rule passed
    R202_RULE_ONLY_PASS,
    /// No model loaded; sanity rule failed
    R203_RULE_ONLY_FAIL,

    // =========================================================================
    // R3xx: Degraded paths
    // =========================================================================
    /// No model loaded; fixed fallback probability used
    R301_FALLBACK_DEFAULT,
    /// Model returned a non-finite value; clamped to 0.0
    R302_MODEL_FAULT_CLAMPED,
}

impl ReasonCode {
    /// Stable code string
    pub fn code(&self) -> &'static str {
        match self {
            ReasonCode::R101_MODEL_ABOVE_HIGH => "R101_MODEL_ABOVE_HIGH",
            ReasonCode::R102_MODEL_BETWEEN_BANDS => "R102_MODEL_BETWEEN_BANDS",
            ReasonCode::R103_MODEL_BELOW_LOW => "R103_MODEL_BELOW_LOW",
            ReasonCode::R201_SANITY_OVERRIDE => "R201_SANITY_OVERRIDE",
            ReasonCode::R202_RULE_ONLY_PASS => "R202_RULE_ONLY_PASS",
            ReasonCode::R203_RULE_ONLY_FAIL => "R203_RULE_ONLY_FAIL",
            ReasonCode::R301_FALLBACK_DEFAULT => "R301_FALLBACK_DEFAULT",
            ReasonCode::R302_MODEL_FAULT_CLAMPED => "R302_MODEL_FAULT_CLAMPED",
        }
    }

    /// One-line explanation
    pub fn description(&self) -> &'static str {
        match self {
            ReasonCode::R101_MODEL_ABOVE_HIGH => "Model confidence above upper cutoff",
            ReasonCode::R102_MODEL_BETWEEN_BANDS => "Model confidence between cutoffs",
            ReasonCode::R103_MODEL_BELOW_LOW => "Model confidence below lower cutoff",
            ReasonCode::R201_SANITY_OVERRIDE => "Sanity rule forced human verdict",
            ReasonCode::R202_RULE_ONLY_PASS => "No model; sanity rule passed",
            ReasonCode::R203_RULE_ONLY_FAIL => "No model; sanity rule failed",
            ReasonCode::R301_FALLBACK_DEFAULT => "No model; fallback probability used",
            ReasonCode::R302_MODEL_FAULT_CLAMPED => "Model fault; clamped to least-trusting outcome",
        }
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}
