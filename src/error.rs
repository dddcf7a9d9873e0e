use thiserror::Error;

// Main Application Error Type

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation Error: {0}")]
    Validation(#[from] ValidationError),
    #[error("Classifier Error: {0}")]
    Classifier(#[from] ClassifierError),
    #[error("Model Error: {0}")]
    Model(#[from] ModelError),
    #[error("Configuration Error: {0}")]
    Config(#[from] ConfigError),
    #[error("Failed to bind to port {1}: {0}")]
    Bind(std::io::Error, u16),
    #[error("Server stopped unexpectedly: {0}")]
    Serve(std::io::Error),
    #[error("Upload exceeds the {0} byte limit")]
    UploadTooLarge(usize),
    #[error("Analysis timed out")]
    Timeout,
    #[error("Analysis task failed: {0}")]
    Task(String),
}

/// Rejected input. Raised before the classifier is ever consulted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("reference_{channel} must be between 0 and 255, got {value}")]
    ChannelOutOfRange { channel: char, value: i64 },
    #[error("Invalid reference hex color: {0:?}")]
    InvalidHex(String),
    #[error("Missing form field: {0}")]
    MissingField(&'static str),
    #[error("Form field {field} is not an integer: {value:?}")]
    InvalidField { field: &'static str, value: String },
    #[error("Malformed multipart form: {0}")]
    MalformedForm(String),
    #[error("No image was uploaded")]
    MissingImage,
    #[error("Uploaded file could not be decoded as an image: {0}")]
    UndecodableImage(String),
    #[error("Image has no pixels")]
    EmptyImage,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassifierError {
    #[error("Expected {expected} features, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
    #[error("Classifier failed: {0}")]
    Evaluation(String),
}

// Model loading Error Type
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to read model file {1}: {0}")]
    Read(std::io::Error, String),
    #[error("Failed to parse model: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Malformed model: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
