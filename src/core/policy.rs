//! Decision policy: probability (+ optional sanity rule) → verdict
//!
//! Bands (upper boundary inclusive):
//! - banded:  p ≥ high → HUMAN, low ≤ p < high → SUSPICIOUS, p < low → BOT
//! - single:  p ≥ mid → HUMAN, else BOT
//!
//! The sanity rule is fail-open: when enabled and every bound is strictly
//! exceeded, the verdict is HUMAN regardless of the model.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{Decision, Feature, FeatureVector, ReasonCode, Verdict};
use crate::{
    DEFAULT_HIGH_THRESHOLD, DEFAULT_LOW_THRESHOLD, DEFAULT_MID_THRESHOLD, SANITY_MIN_AVG_MOUSE_SPEED,
    SANITY_MIN_CLICK_DELAY, SANITY_MIN_MOUSE_PATH_ENTROPY, SANITY_MIN_TASK_COMPLETION_TIME,
};

/// Probability cutoffs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Thresholds {
    /// Three-way: human / suspicious / bot
    Banded { low: f64, high: f64 },
    /// Two-way: human / bot
    Single { mid: f64 },
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds::Banded {
            low: DEFAULT_LOW_THRESHOLD,
            high: DEFAULT_HIGH_THRESHOLD,
        }
    }
}

impl Thresholds {
    /// Two-way policy at the default cutoff
    pub fn single() -> Self {
        Thresholds::Single { mid: DEFAULT_MID_THRESHOLD }
    }

    /// Requires 0 ≤ low < high ≤ 1 (or 0 ≤ mid ≤ 1)
    pub fn validate(&self) -> Result<(), ConfigError> {
        let in_unit = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
        match *self {
            Thresholds::Banded { low, high } => {
                if !in_unit(low) || !in_unit(high) || low >= high {
                    return Err(ConfigError::Invalid(format!(
                        "thresholds must satisfy 0 <= low < high <= 1, got low={low} high={high}"
                    )));
                }
            }
            Thresholds::Single { mid } => {
                if !in_unit(mid) {
                    return Err(ConfigError::Invalid(format!(
                        "threshold must be within [0, 1], got mid={mid}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Band a probability. NaN compares false everywhere and lands in BOT.
    pub fn classify(&self, probability: f64) -> (Verdict, ReasonCode) {
        match *self {
            Thresholds::Banded { low, high } => {
                if probability >= high {
                    (Verdict::Human, ReasonCode::R101_MODEL_ABOVE_HIGH)
                } else if probability >= low {
                    (Verdict::Suspicious, ReasonCode::R102_MODEL_BETWEEN_BANDS)
                } else {
                    (Verdict::Bot, ReasonCode::R103_MODEL_BELOW_LOW)
                }
            }
            Thresholds::Single { mid } => {
                if probability >= mid {
                    (Verdict::Human, ReasonCode::R101_MODEL_ABOVE_HIGH)
                } else {
                    (Verdict::Bot, ReasonCode::R103_MODEL_BELOW_LOW)
                }
            }
        }
    }
}

/// Conjunctive plausibility rule over raw features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SanityRule {
    /// Whether a passing rule overrides the model. Off unless opted in.
    pub enabled: bool,
    pub min_avg_mouse_speed: f64,
    pub min_mouse_path_entropy: f64,
    pub min_click_delay: f64,
    pub min_task_completion_time: f64,
}

impl Default for SanityRule {
    fn default() -> Self {
        Self {
            enabled: false,
            min_avg_mouse_speed: SANITY_MIN_AVG_MOUSE_SPEED,
            min_mouse_path_entropy: SANITY_MIN_MOUSE_PATH_ENTROPY,
            min_click_delay: SANITY_MIN_CLICK_DELAY,
            min_task_completion_time: SANITY_MIN_TASK_COMPLETION_TIME,
        }
    }
}

impl SanityRule {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, bound) in self.bounds() {
            if !bound.is_finite() {
                return Err(ConfigError::Invalid(format!("sanity bound {name} must be finite")));
            }
        }
        Ok(())
    }

    fn bounds(&self) -> [(Feature, f64); 4] {
        [
            (Feature::AvgMouseSpeed, self.min_avg_mouse_speed),
            (Feature::MousePathEntropy, self.min_mouse_path_entropy),
            (Feature::ClickDelay, self.min_click_delay),
            (Feature::TaskCompletionTime, self.min_task_completion_time),
        ]
    }

    /// Number of bounds strictly exceeded
    pub fn checks_passed(&self, features: &FeatureVector) -> usize {
        self.bounds()
            .iter()
            .filter(|(feature, bound)| features.get(*feature) > *bound)
            .count()
    }

    /// Every bound strictly exceeded
    pub fn passes(&self, features: &FeatureVector) -> bool {
        self.checks_passed(features) == self.bounds().len()
    }

    /// Fraction of bounds exceeded, used as confidence on the rule-only path
    pub fn score(&self, features: &FeatureVector) -> f64 {
        self.checks_passed(features) as f64 / self.bounds().len() as f64
    }
}

/// Policy configuration
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub sanity: SanityRule,
}

/// Pure mapping from probability and features to a verdict
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionPolicy {
    thresholds: Thresholds,
    sanity: SanityRule,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            sanity: SanityRule::default(),
        }
    }
}

impl DecisionPolicy {
    /// Validated policy
    pub fn new(config: PolicyConfig) -> Result<Self, ConfigError> {
        config.thresholds.validate()?;
        config.sanity.validate()?;
        Ok(Self {
            thresholds: config.thresholds,
            sanity: config.sanity,
        })
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub fn sanity(&self) -> SanityRule {
        self.sanity
    }

    /// Decide from a model probability
    pub fn decide(&self, probability: f64, features: &FeatureVector) -> Decision {
        if self.sanity.enabled && self.sanity.passes(features) {
            return Decision::new(Verdict::Human, probability, ReasonCode::R201_SANITY_OVERRIDE);
        }
        let (verdict, reason) = self.thresholds.classify(probability);
        Decision::new(verdict, probability, reason)
    }

    /// Decide without a model, from the sanity rule alone.
    ///
    /// Uses the rule bounds whether or not the override is enabled.
    pub fn decide_rule_only(&self, features: &FeatureVector) -> Decision {
        let score = self.sanity.score(features);
        if self.sanity.passes(features) {
            Decision::new(Verdict::Human, score, ReasonCode::R202_RULE_ONLY_PASS)
        } else {
            Decision::new(Verdict::Bot, score, ReasonCode::R203_RULE_ONLY_FAIL)
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn plausible() -> FeatureVector {
        FeatureVector::from_pairs([
            (Feature::AvgMouseSpeed, 0.6),
            (Feature::MousePathEntropy, 0.5),
            (Feature::ClickDelay, 0.5),
            (Feature::TaskCompletionTime, 2.0),
            (Feature::IdleTime, 0.3),
        ])
        .unwrap()
    }

    fn scripted() -> FeatureVector {
        FeatureVector::from_pairs([
            (Feature::AvgMouseSpeed, 2.4),
            (Feature::MousePathEntropy, 0.05),
            (Feature::ClickDelay, 0.02),
            (Feature::TaskCompletionTime, 0.3),
        ])
        .unwrap()
    }

    #[test]
    fn test_banded_boundaries_fall_into_higher_band() {
        let policy = DecisionPolicy::default();
        let fv = FeatureVector::default();
        assert_eq!(policy.decide(0.60, &fv).verdict, Verdict::Human);
        assert_eq!(policy.decide(0.40, &fv).verdict, Verdict::Suspicious);
        assert_eq!(policy.decide(0.5999, &fv).verdict, Verdict::Suspicious);
        assert_eq!(policy.decide(0.3999, &fv).verdict, Verdict::Bot);
    }

    #[test]
    fn test_single_threshold_two_way() {
        let policy = DecisionPolicy::new(PolicyConfig {
            thresholds: Thresholds::single(),
            sanity: SanityRule::default(),
        })
        .unwrap();
        let fv = FeatureVector::default();
        assert_eq!(policy.thresholds(), Thresholds::Single { mid: DEFAULT_MID_THRESHOLD });
        assert_eq!(policy.decide(DEFAULT_MID_THRESHOLD, &fv).verdict, Verdict::Human);
        assert_eq!(policy.decide(0.49, &fv).verdict, Verdict::Bot);
    }

    #[test]
    fn test_confidence_is_carried_through() {
        let decision = DecisionPolicy::default().decide(0.73, &FeatureVector::default());
        assert_eq!(decision.confidence, 0.73);
        assert_eq!(decision.reason, ReasonCode::R101_MODEL_ABOVE_HIGH);
    }

    #[test]
    fn test_nan_probability_is_bot() {
        let decision = DecisionPolicy::default().decide(f64::NAN, &FeatureVector::default());
        assert_eq!(decision.verdict, Verdict::Bot);
    }

    #[test]
    fn test_sanity_override_disabled_by_default() {
        let decision = DecisionPolicy::default().decide(0.1, &plausible());
        assert_eq!(decision.verdict, Verdict::Bot);
    }

    #[test]
    fn test_sanity_override_forces_human_when_enabled() {
        let policy = DecisionPolicy::new(PolicyConfig {
            thresholds: Thresholds::default(),
            sanity: SanityRule { enabled: true, ..SanityRule::default() },
        })
        .unwrap();
        let decision = policy.decide(0.1, &plausible());
        assert_eq!(decision.verdict, Verdict::Human);
        assert_eq!(decision.reason, ReasonCode::R201_SANITY_OVERRIDE);
        assert_eq!(decision.confidence, 0.1);

        // Rule fails → model decides
        assert_eq!(policy.decide(0.1, &scripted()).verdict, Verdict::Bot);
    }

    #[test]
    fn test_sanity_bounds_are_strict() {
        let rule = SanityRule::default();
        let at_bound = FeatureVector::from_pairs([
            (Feature::AvgMouseSpeed, 0.6),
            (Feature::MousePathEntropy, 0.5),
            (Feature::ClickDelay, 0.5),
            (Feature::TaskCompletionTime, SANITY_MIN_TASK_COMPLETION_TIME),
        ])
        .unwrap();
        assert!(!rule.passes(&at_bound));
        assert_eq!(rule.checks_passed(&at_bound), 3);
    }

    #[test]
    fn test_rule_only_decisions() {
        let policy = DecisionPolicy::default();
        let pass = policy.decide_rule_only(&plausible());
        assert_eq!(pass.verdict, Verdict::Human);
        assert_eq!(pass.confidence, 1.0);
        assert_eq!(pass.reason, ReasonCode::R202_RULE_ONLY_PASS);

        let fail = policy.decide_rule_only(&scripted());
        assert_eq!(fail.verdict, Verdict::Bot);
        assert_eq!(fail.reason, ReasonCode::R203_RULE_ONLY_FAIL);
        assert!(fail.confidence < 1.0);
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        for thresholds in [
            Thresholds::Banded { low: 0.6, high: 0.6 },
            Thresholds::Banded { low: 0.7, high: 0.4 },
            Thresholds::Banded { low: -0.1, high: 0.5 },
            Thresholds::Banded { low: 0.1, high: 1.5 },
            Thresholds::Single { mid: f64::NAN },
        ] {
            let config = PolicyConfig { thresholds, sanity: SanityRule::default() };
            assert!(DecisionPolicy::new(config).is_err(), "{thresholds:?} should be rejected");
        }
    }

    #[test]
    fn test_thresholds_toml_shape() {
        let config: PolicyConfig = toml::from_str(
            r#"
            thresholds = { kind = "single", mid = 0.55 }
            [sanity]
            enabled = true
            min_click_delay = 0.2
            "#,
        )
        .unwrap();
        assert_eq!(config.thresholds, Thresholds::Single { mid: 0.55 });
        assert!(config.sanity.enabled);
        assert_eq!(config.sanity.min_click_delay, 0.2);
        assert_eq!(config.sanity.min_avg_mouse_speed, SANITY_MIN_AVG_MOUSE_SPEED);
    }
}
