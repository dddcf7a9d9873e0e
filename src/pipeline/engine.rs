use std::collections::HashMap;
use std::f64::consts::TAU;

use image::RgbImage;
use serde::Deserialize;

use crate::color::{lab_from_rgb, DeltaEFormula, Hsb, HsbMean, ReferenceColor, HUE_RANGE};
use crate::error::ValidationError;

/// How hue is averaged across an image.
///
/// `Arithmetic` is a plain mean of the 0..180 hue values and is what the
/// deployed classifier was trained on. It is wrong near the red wrap-around
/// (179 and 1 average to 90, not 0). `Circular` averages on the hue wheel
/// instead, but changes the feature distribution the model sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HueAveraging {
    #[default]
    Arithmetic,
    Circular,
}

/// Computes perceptual distance and channel statistics between a reference
/// color and an image. Stateless; the same inputs always give the same output.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorDifferenceEngine {
    formula: DeltaEFormula,
    hue_averaging: HueAveraging,
}

impl ColorDifferenceEngine {
    pub fn new(formula: DeltaEFormula, hue_averaging: HueAveraging) -> Self {
        Self {
            formula,
            hue_averaging,
        }
    }

    pub fn formula(&self) -> DeltaEFormula {
        self.formula
    }

    pub fn hue_averaging(&self) -> HueAveraging {
        self.hue_averaging
    }

    /// Mean ΔE between `reference` and every pixel of `image`.
    pub fn average_delta_e(
        &self,
        reference: &ReferenceColor,
        image: &RgbImage,
    ) -> Result<f64, ValidationError> {
        let pixel_count = pixel_count(image)?;
        let reference_lab = lab_from_rgb(reference.rgb());

        // Photos repeat colors heavily; each distinct value is converted once.
        let mut distances: HashMap<[u8; 3], f64> = HashMap::new();
        let total: f64 = image
            .pixels()
            .map(|px| {
                *distances
                    .entry(px.0)
                    .or_insert_with(|| self.formula.difference(reference_lab, lab_from_rgb(*px)))
            })
            .sum();

        Ok(total / pixel_count)
    }

    /// Per-channel mean of the image's 8-bit HSB values.
    pub fn average_hsb(&self, image: &RgbImage) -> Result<HsbMean, ValidationError> {
        let pixel_count = pixel_count(image)?;

        let mut saturation = 0.0;
        let mut brightness = 0.0;
        let mut hue = HueAccumulator::new(self.hue_averaging);
        for px in image.pixels() {
            let hsb = Hsb::from_rgb(*px);
            hue.push(hsb.hue);
            saturation += f64::from(hsb.saturation);
            brightness += f64::from(hsb.brightness);
        }

        Ok(HsbMean {
            hue: hue.mean(pixel_count),
            saturation: saturation / pixel_count,
            brightness: brightness / pixel_count,
        })
    }
}

fn pixel_count(image: &RgbImage) -> Result<f64, ValidationError> {
    let (width, height) = image.dimensions();
    let count = u64::from(width) * u64::from(height);
    if count == 0 {
        return Err(ValidationError::EmptyImage);
    }
    Ok(count as f64)
}

enum HueAccumulator {
    Arithmetic(f64),
    Circular { sin: f64, cos: f64 },
}

impl HueAccumulator {
    fn new(mode: HueAveraging) -> Self {
        match mode {
            HueAveraging::Arithmetic => HueAccumulator::Arithmetic(0.0),
            HueAveraging::Circular => HueAccumulator::Circular { sin: 0.0, cos: 0.0 },
        }
    }

    fn push(&mut self, hue: u8) {
        match self {
            HueAccumulator::Arithmetic(sum) => *sum += f64::from(hue),
            HueAccumulator::Circular { sin, cos } => {
                let angle = f64::from(hue) / HUE_RANGE * TAU;
                *sin += angle.sin();
                *cos += angle.cos();
            }
        }
    }

    fn mean(&self, count: f64) -> f64 {
        match *self {
            HueAccumulator::Arithmetic(sum) => sum / count,
            HueAccumulator::Circular { sin, cos } => {
                // Opposing hues cancel out; there is no meaningful mean direction.
                if sin.hypot(cos) / count < 1e-9 {
                    return 0.0;
                }
                let mean = sin.atan2(cos).rem_euclid(TAU) / TAU * HUE_RANGE;
                if mean >= HUE_RANGE {
                    0.0
                } else {
                    mean
                }
            }
        }
    }
}
