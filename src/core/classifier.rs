//! Classifier: FeatureVector → P(human)
//!
//! The trained model is a JSON artifact:
//! `{ "feature_columns": [...], "label_mapping": {...}, "model": {...} }`
//! where `model` is either a logistic regression or a forest of decision
//! trees (descend left when `x <= threshold`, leaves hold P(human)).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::ModelError;
use crate::types::{Feature, FeatureVector};

/// Anything that scores a feature vector.
///
/// Must be deterministic for identical input. The service checks the
/// returned value; implementors do not need to.
pub trait Classifier: Send + Sync {
    fn predict_human_probability(&self, features: &FeatureVector) -> f64;
}

/// One node of a decision tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// Decision tree; node 0 is the root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        // Children always point forward, so this terminates.
        loop {
            match self.nodes.get(idx) {
                Some(TreeNode::Split { feature, threshold, left, right }) => {
                    let x = row.get(*feature).copied().unwrap_or(0.0);
                    idx = if x <= *threshold { *left } else { *right };
                }
                Some(TreeNode::Leaf { value }) => return *value,
                None => return 0.0,
            }
        }
    }

    fn validate(&self, columns: usize) -> Result<(), ModelError> {
        if self.nodes.is_empty() {
            return Err(ModelError::Invalid("tree has no nodes".into()));
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match *node {
                TreeNode::Split { feature, threshold, left, right } => {
                    if feature >= columns {
                        return Err(ModelError::Invalid(format!(
                            "node {idx} splits on column {feature}, only {columns} columns"
                        )));
                    }
                    if !threshold.is_finite() {
                        return Err(ModelError::Invalid(format!("node {idx} threshold not finite")));
                    }
                    for child in [left, right] {
                        if child <= idx || child >= self.nodes.len() {
                            return Err(ModelError::Invalid(format!(
                                "node {idx} has invalid child index {child}"
                            )));
                        }
                    }
                }
                TreeNode::Leaf { value } => {
                    if !(0.0..=1.0).contains(&value) {
                        return Err(ModelError::Invalid(format!(
                            "leaf {idx} value {value} outside [0, 1]"
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Model body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelKind {
    Logistic { weights: Vec<f64>, bias: f64 },
    Forest { trees: Vec<DecisionTree> },
}

impl ModelKind {
    fn name(&self) -> &'static str {
        match self {
            ModelKind::Logistic { .. } => "logistic",
            ModelKind::Forest { .. } => "forest",
        }
    }
}

/// Persisted model plus its column layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub feature_columns: Vec<Feature>,
    #[serde(default)]
    pub label_mapping: BTreeMap<String, u8>,
    pub model: ModelKind,
    /// SHA-256 of the file this was loaded from
    #[serde(skip)]
    pub digest: Option<String>,
}

impl ModelArtifact {
    /// Load and validate an artifact from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| ModelError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut artifact = Self::from_slice(&bytes)?;
        artifact.digest = Some(sha256_hex(&bytes));
        Ok(artifact)
    }

    /// Parse and validate an in-memory artifact
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ModelError> {
        let artifact: ModelArtifact = serde_json::from_slice(bytes)?;
        artifact.validate()?;
        Ok(artifact)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        let columns = self.feature_columns.len();
        if columns == 0 {
            return Err(ModelError::Invalid("feature_columns is empty".into()));
        }
        match &self.model {
            ModelKind::Logistic { weights, bias } => {
                if weights.len() != columns {
                    return Err(ModelError::Invalid(format!(
                        "{} weights for {columns} feature columns",
                        weights.len()
                    )));
                }
                if !bias.is_finite() || weights.iter().any(|w| !w.is_finite()) {
                    return Err(ModelError::Invalid("logistic coefficients not finite".into()));
                }
            }
            ModelKind::Forest { trees } => {
                if trees.is_empty() {
                    return Err(ModelError::Invalid("forest has no trees".into()));
                }
                for tree in trees {
                    tree.validate(columns)?;
                }
            }
        }
        if let Some(human) = self.label_mapping.get("human") {
            if *human != 1 {
                return Err(ModelError::Invalid(format!(
                    "label_mapping must map human to 1, got {human}"
                )));
            }
        }
        Ok(())
    }

    /// Model family name
    pub fn kind(&self) -> &'static str {
        self.model.name()
    }

    fn row(&self, features: &FeatureVector) -> Vec<f64> {
        self.feature_columns.iter().map(|c| features.get(*c)).collect()
    }
}

impl Classifier for ModelArtifact {
    fn predict_human_probability(&self, features: &FeatureVector) -> f64 {
        let row = self.row(features);
        match &self.model {
            ModelKind::Logistic { weights, bias } => {
                let z = bias + weights.iter().zip(&row).map(|(w, x)| w * x).sum::<f64>();
                sigmoid(z)
            }
            ModelKind::Forest { trees } => {
                let total: f64 = trees.iter().map(|t| t.predict(&row)).sum();
                total / trees.len() as f64
            }
        }
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn sha256_hex(data: &[u8]) -> String {
    let digest: [u8; 32] = Sha256::digest(data).into();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

// =============================================================================
// TESTS
// =============================================================================
