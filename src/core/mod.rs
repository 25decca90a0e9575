//! Core modules for SmartCAPTCHA

pub mod api;
pub mod classifier;
pub mod policy;
pub mod service;
pub mod simulation;
pub mod telemetry;
pub mod tokens;

pub use api::{create_router, run_server, AppState};
pub use classifier::{Classifier, DecisionTree, ModelArtifact, ModelKind, TreeNode};
pub use policy::{DecisionPolicy, PolicyConfig, SanityRule, Thresholds};
pub use service::{FaultPolicy, MissingModelPolicy, ServiceOptions, VerificationService};
pub use simulation::{simulate, SampleGenerator, SampleKind, ScoreSummary, SimulationReport};
pub use telemetry::extract_features;
pub use tokens::{TokenConfig, TokenStore};
