//! Verification service: validate → classify → decide → (issue token)
//!
//! Classifier inference never runs under a token store lock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::tokens::fingerprint;
use crate::core::{Classifier, DecisionPolicy, TokenStore};
use crate::error::{ConfigError, VerifyError};
use crate::types::{
    Decision, FeatureVector, RawFeatures, ReasonCode, VerificationResult, Verdict,
};

/// What to do when no model is loaded
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MissingModelPolicy {
    /// Refuse verification (503)
    #[default]
    Reject,
    /// Decide from the sanity rule alone
    RuleOnly,
    /// Feed a fixed probability through the thresholds
    Fallback { probability: f64 },
}

/// What to do when the model returns a non-finite probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultPolicy {
    /// Treat as P(human) = 0.0
    #[default]
    Clamp,
    /// Fail the request (500)
    Reject,
}

/// Service behaviour switches
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceOptions {
    pub issue_tokens: bool,
    /// Also issue tokens on SUSPICIOUS verdicts
    pub token_on_suspicious: bool,
    /// Report SUSPICIOUS as `is_human = true`
    pub suspicious_is_human: bool,
    pub missing_model: MissingModelPolicy,
    pub on_model_fault: FaultPolicy,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            issue_tokens: true,
            token_on_suspicious: false,
            suspicious_is_human: true,
            missing_model: MissingModelPolicy::default(),
            on_model_fault: FaultPolicy::default(),
        }
    }
}

impl ServiceOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let MissingModelPolicy::Fallback { probability } = self.missing_model {
            if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
                return Err(ConfigError::Invalid(format!(
                    "fallback probability must be within [0, 1], got {probability}"
                )));
            }
        }
        Ok(())
    }

    fn qualifies_for_token(&self, verdict: Verdict) -> bool {
        self.issue_tokens
            && match verdict {
                Verdict::Human => true,
                Verdict::Suspicious => self.token_on_suspicious,
                Verdict::Bot => false,
            }
    }
}

/// Orchestrates classifier, policy and token store
pub struct VerificationService {
    classifier: Option<Arc<dyn Classifier>>,
    policy: DecisionPolicy,
    tokens: Arc<TokenStore>,
    options: ServiceOptions,
    model_digest: Option<String>,
}

impl std::fmt::Debug for VerificationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationService")
            .field("model_loaded", &self.model_loaded())
            .field("policy", &self.policy)
            .field("options", &self.options)
            .field("tokens_tracked", &self.tokens.len())
            .finish()
    }
}

impl VerificationService {
    pub fn new(
        classifier: Option<Arc<dyn Classifier>>,
        policy: DecisionPolicy,
        tokens: Arc<TokenStore>,
        options: ServiceOptions,
    ) -> Self {
        Self {
            classifier,
            policy,
            tokens,
            options,
            model_digest: None,
        }
    }

    /// Attach the loaded model's digest for reporting
    pub fn with_model_digest(mut self, digest: Option<String>) -> Self {
        self.model_digest = digest;
        self
    }

    pub fn model_loaded(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn model_digest(&self) -> Option<&str> {
        self.model_digest.as_deref()
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn options(&self) -> &ServiceOptions {
        &self.options
    }

    /// Verify raw caller input at the current time
    pub fn verify(&self, raw: &RawFeatures) -> Result<VerificationResult, VerifyError> {
        self.verify_at(raw, Utc::now())
    }

    /// Verify raw caller input at `now`
    pub fn verify_at(
        &self,
        raw: &RawFeatures,
        now: DateTime<Utc>,
    ) -> Result<VerificationResult, VerifyError> {
        let features = FeatureVector::from_raw(raw)?;
        self.verify_features_at(&features, now)
    }

    /// Verify an already-validated feature vector at `now`
    pub fn verify_features_at(
        &self,
        features: &FeatureVector,
        now: DateTime<Utc>,
    ) -> Result<VerificationResult, VerifyError> {
        tracing::debug!(features = ?features.to_map(), "verify features received");

        let decision = self.decide(features)?;

        self.tokens.cleanup(now);

        let token = if self.options.qualifies_for_token(decision.verdict) {
            Some(self.tokens.issue(now))
        } else {
            None
        };

        tracing::info!(
            verdict = %decision.verdict,
            confidence = decision.confidence,
            reason = %decision.reason,
            token_issued = token.is_some(),
            "verification decided"
        );

        let is_human = decision.verdict.is_allowed(self.options.suspicious_is_human);
        Ok(VerificationResult::new(decision, is_human, token, now))
    }

    fn decide(&self, features: &FeatureVector) -> Result<Decision, VerifyError> {
        let Some(classifier) = &self.classifier else {
            return match self.options.missing_model {
                MissingModelPolicy::Reject => Err(VerifyError::ModelUnavailable),
                MissingModelPolicy::RuleOnly => Ok(self.policy.decide_rule_only(features)),
                MissingModelPolicy::Fallback { probability } => {
                    let mut decision = self.policy.decide(probability, features);
                    if decision.reason != ReasonCode::R201_SANITY_OVERRIDE {
                        decision.reason = ReasonCode::R301_FALLBACK_DEFAULT;
                    }
                    Ok(decision)
                }
            };
        };

        let raw = classifier.predict_human_probability(features);
        if raw.is_finite() {
            return Ok(self.policy.decide(raw.clamp(0.0, 1.0), features));
        }

        tracing::warn!(value = raw, "classifier returned non-finite probability");
        match self.options.on_model_fault {
            FaultPolicy::Reject => Err(VerifyError::ModelFault { value: raw }),
            FaultPolicy::Clamp => {
                let decision = self.policy.decide(0.0, features);
                if decision.reason == ReasonCode::R201_SANITY_OVERRIDE {
                    return Ok(decision);
                }
                // Least-trusting outcome even if the lower cutoff is 0.0
                Ok(Decision::new(Verdict::Bot, 0.0, ReasonCode::R302_MODEL_FAULT_CLAMPED))
            }
        }
    }

    /// Redeem a proof token at the current time
    pub fn redeem(&self, token: &str) -> bool {
        self.redeem_at(token, Utc::now())
    }

    /// Redeem a proof token at `now`. Every failure is a plain `false`.
    pub fn redeem_at(&self, token: &str, now: DateTime<Utc>) -> bool {
        self.tokens.cleanup(now);
        let valid = self.tokens.consume(token, now);
        self.tokens.cleanup(now);
        tracing::debug!(token = %fingerprint(token), valid, "token redeemed");
        valid
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::policy::{PolicyConfig, SanityRule};
    use crate::error::ValidationError;
    use crate::types::TokenState;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed(f64);

    impl Classifier for Fixed {
        fn predict_human_probability(&self, _: &FeatureVector) -> f64 {
            self.0
        }
    }

    struct Counting(AtomicUsize);

    impl Classifier for Counting {
        fn predict_human_probability(&self, _: &FeatureVector) -> f64 {
            self.0.fetch_add(1, Ordering::SeqCst);
            0.9
        }
    }

    fn raw() -> RawFeatures {
        json!({
            "avg_mouse_speed": 0.6,
            "mouse_path_entropy": 0.5,
            "click_delay": 0.5,
            "task_completion_time": 2.0,
            "idle_time": 0.3,
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    fn service(classifier: Option<Arc<dyn Classifier>>, options: ServiceOptions) -> VerificationService {
        VerificationService::new(
            classifier,
            DecisionPolicy::default(),
            Arc::new(TokenStore::default()),
            options,
        )
    }

    fn with_model(p: f64) -> VerificationService {
        service(Some(Arc::new(Fixed(p))), ServiceOptions::default())
    }

    #[test]
    fn test_human_gets_token() {
        let svc = with_model(0.8);
        let result = svc.verify(&raw()).unwrap();
        assert_eq!(result.verdict, Verdict::Human);
        assert!(result.is_human);
        assert!(result.has_token());
        assert!(svc.redeem(&result.token));
        assert!(!svc.redeem(&result.token));
    }

    #[test]
    fn test_suspicious_allowed_but_no_token_by_default() {
        let svc = with_model(0.5);
        let result = svc.verify(&raw()).unwrap();
        assert_eq!(result.verdict, Verdict::Suspicious);
        assert!(result.is_human);
        assert!(!result.has_token());
    }

    #[test]
    fn test_suspicious_token_when_enabled() {
        let options = ServiceOptions { token_on_suspicious: true, ..ServiceOptions::default() };
        let svc = service(Some(Arc::new(Fixed(0.5))), options);
        assert!(svc.verify(&raw()).unwrap().has_token());
    }

    #[test]
    fn test_bot_gets_nothing() {
        let svc = with_model(0.1);
        let result = svc.verify(&raw()).unwrap();
        assert_eq!(result.verdict, Verdict::Bot);
        assert!(!result.is_human);
        assert!(!result.has_token());
        assert!(svc.tokens().is_empty());
    }

    #[test]
    fn test_token_issuance_can_be_disabled() {
        let options = ServiceOptions { issue_tokens: false, ..ServiceOptions::default() };
        let svc = service(Some(Arc::new(Fixed(0.9))), options);
        assert!(!svc.verify(&raw()).unwrap().has_token());
    }

    #[test]
    fn test_validation_error_skips_classifier() {
        let counting = Arc::new(Counting(AtomicUsize::new(0)));
        let svc = service(Some(counting.clone() as Arc<dyn Classifier>), ServiceOptions::default());
        let mut input = raw();
        input.insert("idle_time".into(), json!("NaN"));
        let err = svc.verify(&input).unwrap_err();
        assert!(matches!(err, VerifyError::Validation(ValidationError::NonFinite { .. })));
        assert_eq!(counting.0.load(Ordering::SeqCst), 0);
        assert!(svc.tokens().is_empty());
    }

    #[test]
    fn test_missing_model_rejects_by_default() {
        let svc = service(None, ServiceOptions::default());
        assert!(matches!(svc.verify(&raw()), Err(VerifyError::ModelUnavailable)));
    }

    #[test]
    fn test_missing_model_validation_still_first() {
        let svc = service(None, ServiceOptions::default());
        let mut input = raw();
        input.remove("click_delay");
        assert!(matches!(svc.verify(&input), Err(VerifyError::Validation(_))));
    }

    #[test]
    fn test_missing_model_rule_only() {
        let options = ServiceOptions {
            missing_model: MissingModelPolicy::RuleOnly,
            ..ServiceOptions::default()
        };
        let svc = service(None, options);
        let result = svc.verify(&raw()).unwrap();
        assert_eq!(result.verdict, Verdict::Human);
        assert_eq!(result.reason, ReasonCode::R202_RULE_ONLY_PASS);
        assert!(result.has_token());
    }

    #[test]
    fn test_missing_model_fallback_probability() {
        let options = ServiceOptions {
            missing_model: MissingModelPolicy::Fallback { probability: 0.0 },
            ..ServiceOptions::default()
        };
        let svc = service(None, options);
        let result = svc.verify(&raw()).unwrap();
        assert_eq!(result.verdict, Verdict::Bot);
        assert_eq!(result.reason, ReasonCode::R301_FALLBACK_DEFAULT);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_model_fault_clamped_to_bot() {
        let svc = with_model(f64::NAN);
        let result = svc.verify(&raw()).unwrap();
        assert_eq!(result.verdict, Verdict::Bot);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.reason, ReasonCode::R302_MODEL_FAULT_CLAMPED);
        assert!(!result.has_token());
    }

    #[test]
    fn test_model_fault_rejected_when_configured() {
        let options = ServiceOptions { on_model_fault: FaultPolicy::Reject, ..ServiceOptions::default() };
        let svc = service(Some(Arc::new(Fixed(f64::INFINITY))), options);
        assert!(matches!(svc.verify(&raw()), Err(VerifyError::ModelFault { .. })));
    }

    #[test]
    fn test_out_of_range_probability_clamped() {
        let result = with_model(1.7).verify(&raw()).unwrap();
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.verdict, Verdict::Human);
    }

    #[test]
    fn test_sanity_override_applies_through_service() {
        let policy = DecisionPolicy::new(PolicyConfig {
            sanity: SanityRule { enabled: true, ..SanityRule::default() },
            ..PolicyConfig::default()
        })
        .unwrap();
        let svc = VerificationService::new(
            Some(Arc::new(Fixed(0.05))),
            policy,
            Arc::new(TokenStore::default()),
            ServiceOptions::default(),
        );
        let result = svc.verify(&raw()).unwrap();
        assert_eq!(result.verdict, Verdict::Human);
        assert_eq!(result.reason, ReasonCode::R201_SANITY_OVERRIDE);
    }

    #[test]
    fn test_redeem_evicts_consumed_record() {
        let svc = with_model(0.9);
        let now = Utc::now();
        let result = svc.verify_at(&raw(), now).unwrap();
        assert!(svc.redeem_at(&result.token, now));
        assert_eq!(svc.tokens().state(&result.token, now), TokenState::Absent);
        assert!(svc.tokens().is_empty());
    }

    #[test]
    fn test_redeem_garbage_is_false() {
        let svc = with_model(0.9);
        assert!(!svc.redeem("garbage"));
        assert!(!svc.redeem(""));
    }

    #[test]
    fn test_fallback_probability_validated() {
        let options = ServiceOptions {
            missing_model: MissingModelPolicy::Fallback { probability: 1.5 },
            ..ServiceOptions::default()
        };
        assert!(options.validate().is_err());
    }
}
