//! Verdict definitions

use colored::{ColoredString, Colorize};
use serde::{Deserialize, Serialize};

/// Discrete outcome of the decision policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Confident the session is human-generated
    Human,
    /// Between the bands; allowed in some deployments
    Suspicious,
    /// Confident the session is automated
    Bot,
}

impl Verdict {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Human => "human",
            Verdict::Suspicious => "suspicious",
            Verdict::Bot => "bot",
        }
    }

    /// Whether the caller should be let through
    pub fn is_allowed(&self, suspicious_is_human: bool) -> bool {
        match self {
            Verdict::Human => true,
            Verdict::Suspicious => suspicious_is_human,
            Verdict::Bot => false,
        }
    }

    /// Colored label for terminal display
    pub fn painted(&self) -> ColoredString {
        match self {
            Verdict::Human => "HUMAN".green().bold(),
            Verdict::Suspicious => "SUSPICIOUS".yellow().bold(),
            Verdict::Bot => "BOT".red().bold(),
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
