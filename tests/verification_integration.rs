//! End-to-end verification through the service and a persisted model

use serde_json::json;
use std::io::Write;
use std::sync::Arc;

use smartcaptcha::core::{
    Classifier, DecisionPolicy, ModelArtifact, ServiceOptions, TokenStore, VerificationService,
};
use smartcaptcha::types::{FeatureVector, RawFeatures, ReasonCode, Verdict};

struct Fixed(f64);

impl Classifier for Fixed {
    fn predict_human_probability(&self, _: &FeatureVector) -> f64 {
        self.0
    }
}

fn scenario_features() -> RawFeatures {
    json!({
        "avg_mouse_speed": 0.6,
        "mouse_path_entropy": 0.5,
        "click_delay": 0.5,
        "task_completion_time": 2.0,
        "idle_time": 0.3
    })
    .as_object()
    .cloned()
    .unwrap()
}

fn service_with(classifier: Arc<dyn Classifier>) -> VerificationService {
    VerificationService::new(
        Some(classifier),
        DecisionPolicy::default(),
        Arc::new(TokenStore::default()),
        ServiceOptions::default(),
    )
}

#[test]
fn test_reference_scenario() {
    let service = service_with(Arc::new(Fixed(0.8)));

    let result = service.verify(&scenario_features()).unwrap();
    assert_eq!(result.verdict, Verdict::Human);
    assert_eq!(result.confidence, 0.8);
    assert!(result.has_token());

    assert!(service.redeem(&result.token));
    assert!(!service.redeem(&result.token));
}

#[test]
fn test_non_finite_inputs_rejected() {
    let service = service_with(Arc::new(Fixed(0.8)));
    for bad in [json!("NaN"), json!("inf"), json!("-Infinity")] {
        let mut raw = scenario_features();
        raw.insert("mouse_path_entropy".into(), bad);
        assert!(service.verify(&raw).is_err());
    }
    assert!(service.tokens().is_empty());
}

#[test]
fn test_persisted_logistic_model() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "{}",
        json!({
            "feature_columns": ["avg_mouse_speed", "mouse_path_entropy", "click_delay",
                                "task_completion_time", "idle_time"],
            "label_mapping": { "bot": 0, "human": 1 },
            "model": {
                "type": "logistic",
                "weights": [-1.0, 4.0, 2.0, 1.0, 1.0],
                "bias": -2.0
            }
        })
    )
    .unwrap();

    let model = ModelArtifact::load(file.path()).unwrap();
    let digest = model.digest.clone();
    assert!(digest.is_some());

    let service = service_with(Arc::new(model)).with_model_digest(digest);
    assert!(service.model_digest().is_some());

    // z = -2 - 0.6 + 2.0 + 1.0 + 2.0 + 0.3 = 2.7
    let result = service.verify(&scenario_features()).unwrap();
    assert_eq!(result.verdict, Verdict::Human);
    assert_eq!(result.reason, ReasonCode::R101_MODEL_ABOVE_HIGH);
    assert!((result.confidence - 1.0 / (1.0 + (-2.7f64).exp())).abs() < 1e-9);

    let mut bot = scenario_features();
    for field in ["mouse_path_entropy", "click_delay", "task_completion_time", "idle_time"] {
        bot.insert(field.into(), json!(0.0));
    }
    bot.insert("avg_mouse_speed".into(), json!(3.0));
    let result = service.verify(&bot).unwrap();
    assert_eq!(result.verdict, Verdict::Bot);
    assert!(!result.has_token());
}

#[test]
fn test_concurrent_verification_issues_distinct_tokens() {
    let service = service_with(Arc::new(Fixed(0.9)));
    let raw = scenario_features();

    let tokens: Vec<String> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| s.spawn(|| service.verify(&raw).unwrap().token))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let unique: std::collections::HashSet<_> = tokens.iter().collect();
    assert_eq!(unique.len(), tokens.len());
    assert!(tokens.iter().all(|t| service.redeem(t)));
}

#[test]
fn test_shipped_model_separates_simulated_sessions() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/model/smartcaptcha_model.json");
    let model = ModelArtifact::load(path).unwrap();
    assert_eq!(model.kind(), "logistic");

    let report = smartcaptcha::core::simulate(&model, 100, 7);
    assert!(report.bot_like.max < 0.40);
    assert!(report.human_like.mean > 0.60);
}
