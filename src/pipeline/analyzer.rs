use std::sync::Arc;

use bytes::Bytes;
use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::color::ReferenceColor;
use crate::error::{AppError, ValidationError};
use crate::pipeline::classifier::{predict, Classifier, Label};
use crate::pipeline::engine::ColorDifferenceEngine;
use crate::pipeline::features::{build_features, FeatureBreakdown, FeatureVector};
use crate::pipeline::preprocessing::{self, CANONICAL_SIZE};
use crate::pipeline::scoring::Scoring;

/// Reference color as received from a client, not yet validated.
#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceInput {
    Channels { r: i64, g: i64, b: i64 },
    Hex(String),
}

impl ReferenceInput {
    pub fn resolve(&self) -> Result<ReferenceColor, ValidationError> {
        match self {
            ReferenceInput::Channels { r, g, b } => ReferenceColor::from_channels(*r, *g, *b),
            ReferenceInput::Hex(hex) => ReferenceColor::from_hex(hex),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub reference: ReferenceInput,
    /// Encoded image file as uploaded.
    pub image: Bytes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub delta_e: f64,
    pub accuracy: f64,
    pub features: FeatureBreakdown,
    pub prediction: Label,
}

impl AnalysisReport {
    pub fn new(features: &FeatureVector, accuracy: f64, prediction: Label) -> Self {
        Self {
            delta_e: features.delta_e,
            accuracy,
            features: features.breakdown(),
            prediction,
        }
    }
}

/// Runs a request through validation, normalization, feature extraction,
/// prediction and scoring.
pub struct ColorAnalyzer {
    engine: ColorDifferenceEngine,
    scoring: Scoring,
    canonical_size: u32,
    classifier: Arc<dyn Classifier>,
}

impl ColorAnalyzer {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self {
            engine: ColorDifferenceEngine::default(),
            scoring: Scoring::default(),
            canonical_size: CANONICAL_SIZE,
            classifier,
        }
    }

    pub fn with_engine(mut self, engine: ColorDifferenceEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_scoring(mut self, scoring: Scoring) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn with_canonical_size(mut self, canonical_size: u32) -> Self {
        self.canonical_size = canonical_size;
        self
    }

    pub fn engine(&self) -> ColorDifferenceEngine {
        self.engine
    }

    pub fn scoring(&self) -> Scoring {
        self.scoring
    }

    pub fn canonical_size(&self) -> u32 {
        self.canonical_size
    }

    pub fn classifier_name(&self) -> &'static str {
        self.classifier.name()
    }

    pub fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisReport, AppError> {
        // The reference is checked before any image work is done.
        let reference = request.reference.resolve()?;
        let decoded = preprocessing::decode(&request.image)?;
        let image = preprocessing::normalize(&decoded, self.canonical_size)?;
        self.analyze_image(&reference, &image)
    }

    /// Analyzes an image that has already been normalized by the caller.
    pub fn analyze_image(
        &self,
        reference: &ReferenceColor,
        image: &RgbImage,
    ) -> Result<AnalysisReport, AppError> {
        let features = build_features(&self.engine, reference, image)?;
        let prediction = predict(self.classifier.as_ref(), &features)?;
        let accuracy = self.scoring.accuracy(features.delta_e);

        tracing::debug!(
            "delta_e={:.3} accuracy={:.2} prediction={}",
            features.delta_e,
            accuracy,
            prediction
        );
        Ok(AnalysisReport::new(&features, accuracy, prediction))
    }
}
