pub mod color;
pub mod config;
pub mod error;
pub mod model;
pub mod network;
pub mod pipeline;

pub use config::Configuration;
pub use error::{AppError, ClassifierError, ConfigError, ModelError, ValidationError};

pub use model::DecisionForest;
pub use network::Server;
pub use pipeline::{ColorAnalysisService, ColorAnalysisServiceBuilder};
