use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use tokio::sync::Semaphore;
use tower::Service;

use crate::config::Configuration;
use crate::error::{AppError, ConfigError};
use crate::pipeline::analyzer::{AnalysisReport, AnalysisRequest, ColorAnalyzer};
use crate::pipeline::classifier::Classifier;
use crate::pipeline::engine::ColorDifferenceEngine;
use crate::pipeline::scoring::Scoring;

/// `tower::Service` front for [`ColorAnalyzer`]. Cloning shares the analyzer
/// and the analysis permits.
#[derive(Clone)]
pub struct ColorAnalysisService {
    inner: Arc<ColorAnalyzer>,
    permits: Option<Arc<Semaphore>>,
}

impl ColorAnalysisService {
    pub fn new(analyzer: ColorAnalyzer) -> Self {
        Self {
            inner: Arc::new(analyzer),
            permits: None,
        }
    }

    /// Caps analyses running at once across all clones. A permit is held by
    /// the blocking task itself, so it outlives a caller that gave up waiting.
    pub fn with_concurrency_limit(mut self, max_concurrent: usize) -> Self {
        self.permits = Some(Arc::new(Semaphore::new(max_concurrent)));
        self
    }

    pub fn available_permits(&self) -> Option<usize> {
        self.permits.as_ref().map(|permits| permits.available_permits())
    }

    pub fn analyzer(&self) -> &ColorAnalyzer {
        &self.inner
    }
}

impl Service<AnalysisRequest> for ColorAnalysisService {
    type Response = AnalysisReport;
    type Error = AppError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: AnalysisRequest) -> Self::Future {
        let analyzer = self.inner.clone();
        let permits = self.permits.clone();

        Box::pin(async move {
            let permit = match permits {
                Some(permits) => Some(
                    permits
                        .acquire_owned()
                        .await
                        .map_err(|e| AppError::Task(e.to_string()))?,
                ),
                None => None,
            };
            // Decoding and the per-pixel passes are CPU bound.
            tokio::task::spawn_blocking(move || {
                let _permit = permit;
                analyzer.analyze(&request)
            })
            .await
            .map_err(|e| AppError::Task(e.to_string()))?
        })
    }
}

pub struct ColorAnalysisServiceBuilder {
    classifier: Arc<dyn Classifier>,
    engine: ColorDifferenceEngine,
    scoring: Scoring,
    canonical_size: Option<u32>,
    max_concurrent: Option<usize>,
}

impl ColorAnalysisServiceBuilder {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self {
            classifier,
            engine: ColorDifferenceEngine::default(),
            scoring: Scoring::default(),
            canonical_size: None,
            max_concurrent: None,
        }
    }

    pub fn configure(self, configuration: &Configuration) -> Result<Self, ConfigError> {
        let mut builder = self
            .engine(ColorDifferenceEngine::new(
                configuration.delta_e_formula,
                configuration.hue_averaging,
            ))
            .scoring(Scoring::new(configuration.accuracy_saturation)?)
            .canonical_size(configuration.canonical_size);
        if let Some(max_concurrent) = configuration.max_concurrent_analyses {
            builder = builder.concurrency_limit(max_concurrent);
        }
        Ok(builder)
    }

    pub fn engine(mut self, engine: ColorDifferenceEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn scoring(mut self, scoring: Scoring) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn canonical_size(mut self, canonical_size: u32) -> Self {
        self.canonical_size = Some(canonical_size);
        self
    }

    pub fn concurrency_limit(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = Some(max_concurrent);
        self
    }

    pub fn build(self) -> ColorAnalysisService {
        let mut analyzer = ColorAnalyzer::new(self.classifier)
            .with_engine(self.engine)
            .with_scoring(self.scoring);
        if let Some(canonical_size) = self.canonical_size {
            analyzer = analyzer.with_canonical_size(canonical_size);
        }
        let service = ColorAnalysisService::new(analyzer);
        match self.max_concurrent {
            Some(max_concurrent) => service.with_concurrency_limit(max_concurrent),
            None => service,
        }
    }
}
