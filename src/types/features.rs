//! Feature vector: named behavioral signals for one verification attempt

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::ValidationError;

/// Raw caller input before validation
pub type RawFeatures = serde_json::Map<String, Value>;

/// Named behavioral signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Pointer distance per second over the drag
    AvgMouseSpeed,
    /// Normalised entropy of movement directions
    MousePathEntropy,
    /// Seconds between widget shown and first interaction
    ClickDelay,
    /// Seconds from first to last interaction
    TaskCompletionTime,
    /// Seconds spent in movement gaps
    IdleTime,
    MicroJitterVariance,
    AccelerationCurve,
    CurvatureVariance,
    OvershootCorrectionRatio,
    TimingEntropy,
}

impl Feature {
    /// All features, in model column order
    pub const ALL: [Feature; 10] = [
        Feature::AvgMouseSpeed,
        Feature::MousePathEntropy,
        Feature::ClickDelay,
        Feature::TaskCompletionTime,
        Feature::IdleTime,
        Feature::MicroJitterVariance,
        Feature::AccelerationCurve,
        Feature::CurvatureVariance,
        Feature::OvershootCorrectionRatio,
        Feature::TimingEntropy,
    ];

    /// Wire name
    pub fn name(&self) -> &'static str {
        match self {
            Feature::AvgMouseSpeed => "avg_mouse_speed",
            Feature::MousePathEntropy => "mouse_path_entropy",
            Feature::ClickDelay => "click_delay",
            Feature::TaskCompletionTime => "task_completion_time",
            Feature::IdleTime => "idle_time",
            Feature::MicroJitterVariance => "micro_jitter_variance",
            Feature::AccelerationCurve => "acceleration_curve",
            Feature::CurvatureVariance => "curvature_variance",
            Feature::OvershootCorrectionRatio => "overshoot_correction_ratio",
            Feature::TimingEntropy => "timing_entropy",
        }
    }

    /// Core signals must be present; extended ones default to 0.0
    pub fn is_required(&self) -> bool {
        matches!(
            self,
            Feature::AvgMouseSpeed
                | Feature::MousePathEntropy
                | Feature::ClickDelay
                | Feature::TaskCompletionTime
                | Feature::IdleTime
        )
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Validated feature values. Every value is finite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    values: [f64; 10],
}

impl Default for FeatureVector {
    fn default() -> Self {
        Self { values: [0.0; 10] }
    }
}

impl FeatureVector {
    /// Validate a raw field map. Unrecognized keys are ignored.
    pub fn from_raw(raw: &RawFeatures) -> Result<Self, ValidationError> {
        let mut values = [0.0; 10];
        for feature in Feature::ALL {
            let value = match raw.get(feature.name()) {
                Some(v) => coerce(feature, v)?,
                None if feature.is_required() => {
                    return Err(ValidationError::MissingField(feature.name()))
                }
                None => 0.0,
            };
            values[feature.index()] = value;
        }
        Ok(Self { values })
    }

    /// Build from already-numeric pairs; absent features are 0.0
    pub fn from_pairs<I>(pairs: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = (Feature, f64)>,
    {
        let mut values = [0.0; 10];
        for (feature, value) in pairs {
            values[feature.index()] = finite(feature, value)?;
        }
        Ok(Self { values })
    }

    /// Value of one feature
    pub fn get(&self, feature: Feature) -> f64 {
        self.values[feature.index()]
    }

    /// (feature, value) in column order
    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        Feature::ALL.iter().map(move |f| (*f, self.values[f.index()]))
    }

    /// Name → value map, for logging and JSON output
    pub fn to_map(&self) -> BTreeMap<&'static str, f64> {
        self.iter().map(|(f, v)| (f.name(), v)).collect()
    }
}

fn coerce(feature: Feature, value: &Value) -> Result<f64, ValidationError> {
    let field = feature.name();
    let number = match value {
        Value::Number(n) => n.as_f64().ok_or(ValidationError::NotANumber { field })?,
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| ValidationError::NotANumber { field })?,
        _ => return Err(ValidationError::NotANumber { field }),
    };
    finite(feature, number)
}

fn finite(feature: Feature, value: f64) -> Result<f64, ValidationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ValidationError::NonFinite { field: feature.name(), value })
    }
}
