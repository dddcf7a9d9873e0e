use std::time::Duration;

use serde::Deserialize;
use tracing::Level;

use crate::color::DeltaEFormula;
use crate::error::ConfigError;
use crate::pipeline::engine::HueAveraging;
use crate::pipeline::preprocessing::CANONICAL_SIZE;
use crate::pipeline::scoring::DEFAULT_SATURATION_DELTA_E;

const CONFIG_FILE: &str = "swatch-grader";
const CONFIG_PATH_VAR: &str = "SWATCH_GRADER_CONFIG";
const ENV_PREFIX: &str = "SWATCH_GRADER";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub host: String,
    pub port: u16,
    pub model_path: String,
    pub canonical_size: u32,
    pub accuracy_saturation: f64,
    pub delta_e_formula: DeltaEFormula,
    pub hue_averaging: HueAveraging,
    pub max_upload_bytes: usize,
    pub request_timeout_ms: Option<u64>,
    pub max_concurrent_analyses: Option<usize>,
    pub log_level: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            model_path: "models/color_quality_model.json".to_string(),
            canonical_size: CANONICAL_SIZE,
            accuracy_saturation: DEFAULT_SATURATION_DELTA_E,
            delta_e_formula: DeltaEFormula::default(),
            hue_averaging: HueAveraging::default(),
            max_upload_bytes: 5 * 1024 * 1024,
            request_timeout_ms: None,
            max_concurrent_analyses: None,
            log_level: "info".to_string(),
        }
    }
}

impl Configuration {
    /// Layers defaults, an optional config file and `SWATCH_GRADER__*` env vars.
    ///
    /// The file defaults to `swatch-grader.{toml,json,yaml}` in the working
    /// directory; `SWATCH_GRADER_CONFIG` points at another one.
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| CONFIG_FILE.to_string());
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&file).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let configuration: Configuration = settings.try_deserialize()?;
        configuration.validate()?;
        Ok(configuration)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Invalid("port must be non-zero".to_string()));
        }
        if self.canonical_size == 0 {
            return Err(ConfigError::Invalid(
                "canonical_size must be greater than 0".to_string(),
            ));
        }
        if !(self.accuracy_saturation.is_finite() && self.accuracy_saturation > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "accuracy_saturation must be a positive number, got {}",
                self.accuracy_saturation
            )));
        }
        if self.max_concurrent_analyses == Some(0) {
            return Err(ConfigError::Invalid(
                "max_concurrent_analyses must be greater than 0 when set".to_string(),
            ));
        }
        self.log_level()?;
        Ok(())
    }

    pub fn log_level(&self) -> Result<Level, ConfigError> {
        self.log_level
            .parse::<Level>()
            .map_err(|_| ConfigError::Invalid(format!("unknown log level {:?}", self.log_level)))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}
