//! SmartCAPTCHA: behavioral-biometrics verification service
//!
//! Pointer telemetry → FeatureVector → Classifier → DecisionPolicy → Verdict,
//! with a single-use, short-lived proof token issued on a qualifying verdict.

pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod types;

// =============================================================================
// DECISION THRESHOLDS [C]
// =============================================================================

/// P(human) at or above this is HUMAN (banded policy)
pub const DEFAULT_HIGH_THRESHOLD: f64 = 0.60;

/// P(human) at or above this (and below high) is SUSPICIOUS
pub const DEFAULT_LOW_THRESHOLD: f64 = 0.40;

/// Cutoff for the single-threshold policy
pub const DEFAULT_MID_THRESHOLD: f64 = 0.50;

// =============================================================================
// SANITY RULE BOUNDS [C] - every bound must be strictly exceeded
// =============================================================================

pub const SANITY_MIN_AVG_MOUSE_SPEED: f64 = 0.1;
pub const SANITY_MIN_MOUSE_PATH_ENTROPY: f64 = 0.2;
pub const SANITY_MIN_CLICK_DELAY: f64 = 0.1;
pub const SANITY_MIN_TASK_COMPLETION_TIME: f64 = 1.0;

// =============================================================================
// PROOF TOKENS [C]
// =============================================================================

/// How long an issued token stays redeemable (seconds)
pub const TOKEN_TTL_SECS: i64 = 120;

/// Random bytes per token (192 bits)
pub const TOKEN_BYTES: usize = 24;

/// Longest accepted token lifetime (one day)
pub const MAX_TOKEN_TTL_SECS: i64 = 86_400;

/// Lock stripes in the token store
pub const TOKEN_SHARDS: usize = 16;

/// Upper bound on lock stripes
pub const MAX_TOKEN_SHARDS: usize = 1024;

/// Background sweep period (seconds)
pub const TOKEN_SWEEP_INTERVAL_SECS: u64 = 30;

// =============================================================================
// TELEMETRY [C] - mirrors the browser widget's feature extraction
// =============================================================================

/// Gap between move events counted as idle time (milliseconds)
pub const IDLE_GAP_THRESHOLD_MS: f64 = 120.0;

/// Direction histogram bins for path entropy
pub const DIRECTION_BINS: usize = 12;

/// Inter-event timing histogram bins
pub const TIMING_BINS: usize = 10;

/// Minimum move events needed to derive features
pub const MIN_MOVE_EVENTS: usize = 3;

// =============================================================================
// VERSION
// =============================================================================

pub const VERSION: &str = "1.0.0";
