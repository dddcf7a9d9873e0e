use std::sync::Arc;

use swatch_grader::pipeline::Classifier;
use swatch_grader::{AppError, ColorAnalysisServiceBuilder, Configuration, DecisionForest, Server};
use tracing::{info, Level};

fn init_logging(level: Level) {
    tracing_subscriber::fmt().with_max_level(level).init();
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let configuration = Configuration::load()?;
    init_logging(configuration.log_level()?);

    info!("Loading classifier from {}", configuration.model_path);
    let forest = DecisionForest::from_path(&configuration.model_path)?;
    info!(
        "Loaded {} with {} trees over classes {:?}",
        forest.name(),
        forest.tree_count(),
        forest.classes()
    );

    let service = ColorAnalysisServiceBuilder::new(Arc::new(forest))
        .configure(&configuration)?
        .build();
    Server::new(&configuration, service).start().await
}
