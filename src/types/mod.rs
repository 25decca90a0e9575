//! Core types for SmartCAPTCHA

mod features;
mod output;
mod reason;
mod telemetry;
mod token;
mod verdict;

pub use features::{Feature, FeatureVector, RawFeatures};
pub use output::{Decision, VerificationResult};
pub use reason::ReasonCode;
pub use telemetry::{InteractionSession, PointerEvent, PointerEventKind};
pub use token::{TokenRecord, TokenState};
pub use verdict::Verdict;
