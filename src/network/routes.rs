use std::time::Duration;

use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde_json::{json, Value};
use tower::timeout::error::Elapsed;
use tower::timeout::TimeoutLayer;
use tower::util::BoxService;
use tower::{BoxError, ServiceBuilder, ServiceExt};
use tracing::{debug, info, Instrument};
use uuid::Uuid;

use crate::config::Configuration;
use crate::error::{AppError, ValidationError};
use crate::network::cors::CorsLayer;
use crate::pipeline::{AnalysisReport, AnalysisRequest, ColorAnalysisService, ReferenceInput};

/// Shared, read-only state handed to every request.
#[derive(Clone)]
pub struct AppState {
    analysis: ColorAnalysisService,
    timeout: Option<Duration>,
    max_upload_bytes: usize,
}

impl AppState {
    pub fn new(analysis: ColorAnalysisService, configuration: &Configuration) -> Self {
        Self {
            analysis,
            timeout: configuration.request_timeout(),
            max_upload_bytes: configuration.max_upload_bytes,
        }
    }

    /// Runs one analysis behind the optional timeout. Concurrency is capped
    /// inside [`ColorAnalysisService`] so the cap survives a timed-out caller.
    async fn run(&self, request: AnalysisRequest) -> Result<AnalysisReport, AppError> {
        let service = ServiceBuilder::new()
            .option_layer(self.timeout.map(TimeoutLayer::new))
            .map_err(box_error)
            .service(self.analysis.clone());

        BoxService::new(service)
            .oneshot(request)
            .await
            .map_err(into_app_error)
    }
}

fn box_error(err: AppError) -> BoxError {
    Box::new(err)
}

fn into_app_error(err: BoxError) -> AppError {
    if err.is::<Elapsed>() {
        return AppError::Timeout;
    }
    match err.downcast::<AppError>() {
        Ok(err) => *err,
        Err(err) => AppError::Task(err.to_string()),
    }
}

pub fn router(state: AppState) -> Router {
    let max_upload_bytes = state.max_upload_bytes;
    Router::new()
        .route("/", get(root))
        .route("/healthz", get(health))
        .route("/analyze", post(analyze))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer)
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "Color API is running 🚀" }))
}

async fn health() -> &'static str {
    "ok"
}

async fn analyze(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<AnalysisReport>, AppError> {
    let request_id = Uuid::new_v4();
    async move {
        let form = AnalyzeForm::read(multipart, state.max_upload_bytes).await?;
        let request = form.into_request()?;
        let report = state.run(request).await?;
        info!(
            "Analyzed upload: delta_e={:.2} accuracy={:.1} prediction={}",
            report.delta_e, report.accuracy, report.prediction
        );
        Ok(Json(report))
    }
    .instrument(tracing::info_span!("analyze", %request_id))
    .await
}

/// Raw multipart fields of an `/analyze` upload.
#[derive(Debug, Default)]
struct AnalyzeForm {
    reference_r: Option<String>,
    reference_g: Option<String>,
    reference_b: Option<String>,
    reference_hex: Option<String>,
    file: Option<Bytes>,
}

impl AnalyzeForm {
    async fn read(mut multipart: Multipart, limit: usize) -> Result<Self, AppError> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| form_error(e, limit))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "reference_r" => form.reference_r = Some(read_text(field, limit).await?),
                "reference_g" => form.reference_g = Some(read_text(field, limit).await?),
                "reference_b" => form.reference_b = Some(read_text(field, limit).await?),
                "reference_hex" => form.reference_hex = Some(read_text(field, limit).await?),
                "file" => {
                    form.file = Some(field.bytes().await.map_err(|e| form_error(e, limit))?)
                }
                other => debug!("Ignoring form field {:?}", other),
            }
        }
        Ok(form)
    }

    /// Parses and range-checks the reference before the upload is looked at.
    fn into_request(self) -> Result<AnalysisRequest, ValidationError> {
        let has_channels =
            self.reference_r.is_some() || self.reference_g.is_some() || self.reference_b.is_some();
        let reference = match self.reference_hex {
            Some(hex) if !has_channels => ReferenceInput::Hex(hex),
            _ => ReferenceInput::Channels {
                r: parse_channel("reference_r", self.reference_r)?,
                g: parse_channel("reference_g", self.reference_g)?,
                b: parse_channel("reference_b", self.reference_b)?,
            },
        };
        reference.resolve()?;

        match self.file {
            Some(image) if !image.is_empty() => Ok(AnalysisRequest { reference, image }),
            _ => Err(ValidationError::MissingImage),
        }
    }
}

async fn read_text(
    field: axum::extract::multipart::Field<'_>,
    limit: usize,
) -> Result<String, AppError> {
    field.text().await.map_err(|e| form_error(e, limit))
}

fn parse_channel(field: &'static str, value: Option<String>) -> Result<i64, ValidationError> {
    let value = value.ok_or(ValidationError::MissingField(field))?;
    let parsed = value.trim().parse::<i64>();
    parsed.map_err(|_| ValidationError::InvalidField { field, value })
}

fn form_error(err: MultipartError, limit: usize) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::UploadTooLarge(limit)
    } else {
        ValidationError::MalformedForm(err.body_text()).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClassifierError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use crate::pipeline::analyzer::tests::{png_bytes, StubClassifier};
    use crate::pipeline::{Classifier, ColorAnalysisServiceBuilder, Label};
    use axum::body::Body;
    use axum::http::{header, Request};

    const BOUNDARY: &str = "swatch-grader-test-boundary";

    struct SlowClassifier;

    impl Classifier for SlowClassifier {
        fn predict(&self, _features: &[f64]) -> Result<Label, ClassifierError> {
            std::thread::sleep(Duration::from_millis(300));
            Ok(Label::new("Late"))
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    /// Sleeps like [`SlowClassifier`] while tracking how many predictions overlap.
    #[derive(Default)]
    struct OverlapClassifier {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Classifier for OverlapClassifier {
        fn predict(&self, _features: &[f64]) -> Result<Label, ClassifierError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(400));
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(Label::new("Late"))
        }

        fn name(&self) -> &'static str {
            "overlap"
        }
    }

    fn app_with(classifier: Arc<dyn Classifier>, configuration: Configuration) -> Router {
        let service = ColorAnalysisServiceBuilder::new(classifier)
            .configure(&configuration)
            .unwrap()
            .build();
        router(AppState::new(service, &configuration))
    }

    fn app() -> Router {
        app_with(
            Arc::new(StubClassifier::default()),
            Configuration::default(),
        )
    }

    fn multipart_request(fields: &[(&str, &str)], file: Option<&[u8]>) -> Request<Body> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some(file) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"swatch.png\"\r\nContent-Type: image/png\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(file);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/analyze")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn white_fields() -> [(&'static str, &'static str); 3] {
        [
            ("reference_r", "255"),
            ("reference_g", "255"),
            ("reference_b", "255"),
        ]
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_root_reports_running() {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({ "message": "Color API is running 🚀" })
        );
    }

    #[tokio::test]
    async fn test_analyze_white_on_white() {
        let image = png_bytes(300, 300, [255, 255, 255]);
        let response = app()
            .oneshot(multipart_request(&white_fields(), Some(&image)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({
                "delta_e": 0.0,
                "accuracy": 100.0,
                "features": { "hue_diff": 0.0, "sat_diff": 0.0, "bright_diff": 0.0 },
                "prediction": "Good"
            })
        );
    }

    #[tokio::test]
    async fn test_analyze_accepts_hex_reference() {
        let image = png_bytes(10, 10, [0, 0, 0]);
        let response = app()
            .oneshot(multipart_request(
                &[("reference_hex", "#000000")],
                Some(&image),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["accuracy"], 100.0);
    }

    #[tokio::test]
    async fn test_out_of_range_channel_is_rejected() {
        let image = png_bytes(4, 4, [255, 255, 255]);
        let response = app()
            .oneshot(multipart_request(
                &[
                    ("reference_r", "300"),
                    ("reference_g", "0"),
                    ("reference_b", "0"),
                ],
                Some(&image),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let detail = json_body(response).await["detail"].as_str().unwrap().to_string();
        assert!(detail.contains("reference_r"), "{detail}");
    }

    #[tokio::test]
    async fn test_missing_and_malformed_fields_are_rejected() {
        let image = png_bytes(4, 4, [255, 255, 255]);

        let missing = app()
            .oneshot(multipart_request(
                &[("reference_r", "1"), ("reference_g", "2")],
                Some(&image),
            ))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let malformed = app()
            .oneshot(multipart_request(
                &[
                    ("reference_r", "red"),
                    ("reference_g", "0"),
                    ("reference_b", "0"),
                ],
                Some(&image),
            ))
            .await
            .unwrap();
        assert_eq!(malformed.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let no_file = app()
            .oneshot(multipart_request(&white_fields(), None))
            .await
            .unwrap();
        assert_eq!(no_file.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            json_body(no_file).await["detail"],
            "No image was uploaded"
        );
    }

    #[tokio::test]
    async fn test_undecodable_upload_is_rejected() {
        let response = app()
            .oneshot(multipart_request(&white_fields(), Some(b"plain text")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_oversized_upload_is_rejected() {
        let configuration = Configuration {
            max_upload_bytes: 256,
            ..Configuration::default()
        };
        let app = app_with(Arc::new(StubClassifier::default()), configuration);
        let response = app
            .oneshot(multipart_request(&white_fields(), Some(&[7u8; 4096])))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_slow_analysis_times_out() {
        let configuration = Configuration {
            request_timeout_ms: Some(20),
            ..Configuration::default()
        };
        let app = app_with(Arc::new(SlowClassifier), configuration);
        let image = png_bytes(300, 300, [255, 255, 255]);
        let response = app
            .oneshot(multipart_request(&white_fields(), Some(&image)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[tokio::test]
    async fn test_concurrency_limit_still_serves_requests() {
        let configuration = Configuration {
            max_concurrent_analyses: Some(1),
            ..Configuration::default()
        };
        let app = app_with(Arc::new(StubClassifier::default()), configuration);
        let image = png_bytes(300, 300, [255, 255, 255]);
        for _ in 0..3 {
            let response = app
                .clone()
                .oneshot(multipart_request(&white_fields(), Some(&image)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_timed_out_analyses_keep_their_permit() {
        let configuration = Configuration {
            request_timeout_ms: Some(100),
            max_concurrent_analyses: Some(1),
            ..Configuration::default()
        };
        let classifier = Arc::new(OverlapClassifier::default());
        let app = app_with(classifier.clone(), configuration);
        let image = png_bytes(300, 300, [255, 255, 255]);

        for _ in 0..4 {
            let response = app
                .clone()
                .oneshot(multipart_request(&white_fields(), Some(&image)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        }
        // Let the abandoned analyses drain before reading the peak.
        while classifier.peak.load(Ordering::SeqCst) == 0
            || classifier.active.load(Ordering::SeqCst) > 0
        {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(classifier.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cross_origin_response_carries_cors_headers() {
        let mut request = multipart_request(&white_fields(), Some(&png_bytes(2, 2, [1, 2, 3])));
        request.headers_mut().insert(
            header::ORIGIN,
            "http://localhost:3000".parse().unwrap(),
        );
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:3000"
        );
    }
}
