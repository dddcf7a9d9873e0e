//! Serialized classifiers that can back the `Classifier` trait.

pub mod forest;

pub use forest::{DecisionForest, DecisionTree, Node};
