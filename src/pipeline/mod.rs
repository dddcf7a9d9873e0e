pub mod analyzer;
pub mod classifier;
pub mod engine;
pub mod features;
pub mod preprocessing;
pub mod scoring;
pub mod service;

pub use analyzer::{AnalysisReport, AnalysisRequest, ColorAnalyzer, ReferenceInput};
pub use classifier::{predict, Classifier, Label};
pub use engine::{ColorDifferenceEngine, HueAveraging};
pub use features::{build_features, FeatureBreakdown, FeatureVector, FEATURE_COUNT};
pub use scoring::{score, Scoring};
pub use service::{ColorAnalysisService, ColorAnalysisServiceBuilder};
