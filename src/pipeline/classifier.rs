use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ClassifierError;
use crate::pipeline::features::FeatureVector;

/// Raw label produced by a classifier, e.g. a quality tier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Label(String);

impl Label {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A pre-trained predictor. Loaded once and shared read-only between requests.
pub trait Classifier: Send + Sync {
    fn predict(&self, features: &[f64]) -> Result<Label, ClassifierError>;
    fn name(&self) -> &'static str;
}

/// Hands the feature vector to `classifier` in training order.
/// Failures are returned unchanged.
pub fn predict(
    classifier: &dyn Classifier,
    features: &FeatureVector,
) -> Result<Label, ClassifierError> {
    classifier.predict(&features.as_array())
}
