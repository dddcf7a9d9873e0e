use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ClassifierError, ModelError};
use crate::pipeline::classifier::{Classifier, Label};

/// One node of a tree. Split semantics follow scikit-learn: a sample goes
/// left when `features[feature] <= threshold`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        /// Per-class sample counts or weights, indexed like `classes`.
        value: Vec<f64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<Node>,
}

impl DecisionTree {
    /// Walks from the root to a leaf. Child indices always point forward,
    /// which `DecisionForest::validate` enforces, so this terminates.
    fn leaf(&self, features: &[f64]) -> &[f64] {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                Node::Leaf { value } => return value,
            }
        }
    }
}

/// Ensemble of decision trees exported from a trained model.
///
/// ```json
/// { "classes": ["Good", "Poor"], "n_features": 4,
///   "trees": [{ "nodes": [
///     { "feature": 0, "threshold": 5.0, "left": 1, "right": 2 },
///     { "value": [10, 0] },
///     { "value": [0, 10] } ] }] }
/// ```
///
/// Each tree votes with its leaf distribution normalized to 1; the class with
/// the largest summed vote wins. Ties go to the class listed first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawForest")]
pub struct DecisionForest {
    classes: Vec<String>,
    n_features: usize,
    trees: Vec<DecisionTree>,
}

/// Wire shape of [`DecisionForest`] before structural validation.
#[derive(Deserialize)]
struct RawForest {
    classes: Vec<String>,
    n_features: usize,
    trees: Vec<DecisionTree>,
}

impl TryFrom<RawForest> for DecisionForest {
    type Error = ModelError;

    fn try_from(raw: RawForest) -> Result<Self, Self::Error> {
        Self::new(raw.classes, raw.n_features, raw.trees)
    }
}

impl DecisionForest {
    pub fn new(
        classes: Vec<String>,
        n_features: usize,
        trees: Vec<DecisionTree>,
    ) -> Result<Self, ModelError> {
        let forest = Self {
            classes,
            n_features,
            trees,
        };
        forest.validate()?;
        Ok(forest)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let bytes =
            std::fs::read(path).map_err(|e| ModelError::Read(e, path.display().to_string()))?;
        Self::from_slice(&bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, ModelError> {
        let raw: RawForest = serde_json::from_slice(bytes)?;
        Self::try_from(raw)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.classes.is_empty() {
            return Err(ModelError::Malformed("model has no classes".to_string()));
        }
        if self.n_features == 0 {
            return Err(ModelError::Malformed("n_features must be positive".to_string()));
        }
        if self.trees.is_empty() {
            return Err(ModelError::Malformed("model has no trees".to_string()));
        }

        for (t, tree) in self.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                return Err(ModelError::Malformed(format!("tree {t} has no nodes")));
            }
            let len = tree.nodes.len();
            for (i, node) in tree.nodes.iter().enumerate() {
                match node {
                    Node::Split {
                        feature,
                        threshold,
                        left,
                        right,
                    } => {
                        if *feature >= self.n_features {
                            return Err(ModelError::Malformed(format!(
                                "tree {t} node {i} splits on feature {feature}, model has {}",
                                self.n_features
                            )));
                        }
                        if threshold.is_nan() {
                            return Err(ModelError::Malformed(format!(
                                "tree {t} node {i} has a NaN threshold"
                            )));
                        }
                        for child in [*left, *right] {
                            if child <= i || child >= len {
                                return Err(ModelError::Malformed(format!(
                                    "tree {t} node {i} points at invalid child {child}"
                                )));
                            }
                        }
                    }
                    Node::Leaf { value } => {
                        if value.len() != self.classes.len() {
                            return Err(ModelError::Malformed(format!(
                                "tree {t} leaf {i} has {} values for {} classes",
                                value.len(),
                                self.classes.len()
                            )));
                        }
                        if value.iter().any(|v| !v.is_finite() || *v < 0.0) {
                            return Err(ModelError::Malformed(format!(
                                "tree {t} leaf {i} has negative or non-finite values"
                            )));
                        }
                        if value.iter().sum::<f64>() <= 0.0 {
                            return Err(ModelError::Malformed(format!(
                                "tree {t} leaf {i} is empty"
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

impl Classifier for DecisionForest {
    fn predict(&self, features: &[f64]) -> Result<Label, ClassifierError> {
        if features.len() != self.n_features {
            return Err(ClassifierError::ShapeMismatch {
                expected: self.n_features,
                actual: features.len(),
            });
        }
        if features.iter().any(|v| !v.is_finite()) {
            return Err(ClassifierError::Evaluation(format!(
                "non-finite feature in {features:?}"
            )));
        }

        let mut votes = vec![0.0f64; self.classes.len()];
        for tree in &self.trees {
            let leaf = tree.leaf(features);
            let total: f64 = leaf.iter().sum();
            for (vote, weight) in votes.iter_mut().zip(leaf) {
                *vote += weight / total;
            }
        }

        let mut best = 0;
        for (i, vote) in votes.iter().enumerate() {
            if *vote > votes[best] {
                best = i;
            }
        }
        Ok(Label::new(self.classes[best].clone()))
    }

    fn name(&self) -> &'static str {
        "decision-forest"
    }
}
