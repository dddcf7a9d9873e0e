use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::color::{Hsb, HsbMean, ReferenceColor};
use crate::error::ValidationError;
use crate::pipeline::engine::ColorDifferenceEngine;

/// Number of inputs the classifier was trained on.
pub const FEATURE_COUNT: usize = 4;

/// Classifier input, in training order: `[delta_e, hue_diff, sat_diff, bright_diff]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    pub delta_e: f64,
    pub hue_diff: f64,
    pub sat_diff: f64,
    pub bright_diff: f64,
}

impl FeatureVector {
    pub fn as_array(&self) -> [f64; FEATURE_COUNT] {
        [self.delta_e, self.hue_diff, self.sat_diff, self.bright_diff]
    }

    pub fn breakdown(&self) -> FeatureBreakdown {
        FeatureBreakdown {
            hue_diff: self.hue_diff,
            sat_diff: self.sat_diff,
            bright_diff: self.bright_diff,
        }
    }
}

/// Channel differences as reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureBreakdown {
    pub hue_diff: f64,
    pub sat_diff: f64,
    pub bright_diff: f64,
}

/// Builds the classifier input for `reference` against an already
/// normalized `image`.
///
/// The reference goes through [`Hsb::from_rgb`], the same conversion applied
/// to every pixel, so the channel differences are commensurate.
pub fn build_features(
    engine: &ColorDifferenceEngine,
    reference: &ReferenceColor,
    image: &RgbImage,
) -> Result<FeatureVector, ValidationError> {
    let delta_e = engine.average_delta_e(reference, image)?;
    let image_hsb = engine.average_hsb(image)?;
    let reference_hsb = HsbMean::from(Hsb::from_rgb(reference.rgb()));

    Ok(FeatureVector {
        delta_e,
        hue_diff: (reference_hsb.hue - image_hsb.hue).abs(),
        sat_diff: (reference_hsb.saturation - image_hsb.saturation).abs(),
        bright_diff: (reference_hsb.brightness - image_hsb.brightness).abs(),
    })
}
