//! Decision and verification result structures

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};

use crate::types::{ReasonCode, Verdict};

/// Output of the decision policy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub verdict: Verdict,
    /// The number that produced the verdict
    pub confidence: f64,
    pub reason: ReasonCode,
}

impl Decision {
    pub fn new(verdict: Verdict, confidence: f64, reason: ReasonCode) -> Self {
        Self { verdict, confidence, reason }
    }
}

/// Result of one verification request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub verdict: Verdict,
    pub is_human: bool,
    pub confidence: f64,
    /// Proof token; empty when none was issued
    pub token: String,
    pub reason: ReasonCode,
    pub timestamp: DateTime<Utc>,
}

impl VerificationResult {
    pub fn new(
        decision: Decision,
        is_human: bool,
        token: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            verdict: decision.verdict,
            is_human,
            confidence: decision.confidence,
            token: token.unwrap_or_default(),
            reason: decision.reason,
            timestamp,
        }
    }

    /// Whether a proof token was issued
    pub fn has_token(&self) -> bool {
        !self.token.is_empty()
    }

    /// Format for terminal display (with colors)
    pub fn to_terminal_string(&self) -> String {
        let token = if self.has_token() {
            self.token.cyan().to_string()
        } else {
            "-".dimmed().to_string()
        };
        format!(
            "{} P(human)={:.3} | token={} | {}",
            self.verdict.painted(),
            self.confidence,
            token,
            self.reason.code().dimmed()
        )
    }

    /// Format for parseable output (no colors)
    pub fn to_parseable_string(&self) -> String {
        format!(
            "verdict={} | confidence={:.3} | is_human={} | token={} | reason={}",
            self.verdict,
            self.confidence,
            self.is_human,
            if self.has_token() { self.token.as_str() } else { "-" },
            self.reason.code()
        )
    }
}
