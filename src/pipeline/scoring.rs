use crate::error::ConfigError;

/// ΔE at and beyond which a match is scored 0%.
pub const DEFAULT_SATURATION_DELTA_E: f64 = 20.0;

/// Linear accuracy policy: 100% at ΔE 0, falling to 0% at the saturation
/// threshold. A policy constant, not a calibrated curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scoring {
    saturation: f64,
}

impl Default for Scoring {
    fn default() -> Self {
        Self {
            saturation: DEFAULT_SATURATION_DELTA_E,
        }
    }
}

impl Scoring {
    /// `saturation` must be a positive, finite ΔE.
    pub fn new(saturation: f64) -> Result<Self, ConfigError> {
        if !(saturation.is_finite() && saturation > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "accuracy saturation must be a positive number, got {saturation}"
            )));
        }
        Ok(Self { saturation })
    }

    pub fn saturation(&self) -> f64 {
        self.saturation
    }

    pub fn accuracy(&self, avg_delta_e: f64) -> f64 {
        (100.0 - (avg_delta_e / self.saturation) * 100.0).clamp(0.0, 100.0)
    }
}

/// Accuracy under the default saturation threshold.
pub fn score(avg_delta_e: f64) -> f64 {
    Scoring::default().accuracy(avg_delta_e)
}
