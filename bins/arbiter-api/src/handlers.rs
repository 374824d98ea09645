// HTTP route handlers for the Arbiter API

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use arbiter_common::types::{ExecutionRequest, TestResult, ValidationError};
use arbiter_engine::OrchestratorError;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::metrics;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct LanguageEntry {
    pub name: String,
    pub aliases: Vec<String>,
    pub compiled: bool,
}

/// Map a top-level failure to a status code and JSON body
pub fn error_response(err: &OrchestratorError) -> (StatusCode, Value) {
    let status = match err {
        OrchestratorError::Validation(_) | OrchestratorError::UnsupportedLanguage(_) => {
            StatusCode::BAD_REQUEST
        }
        OrchestratorError::Provisioning(_) => StatusCode::SERVICE_UNAVAILABLE,
        OrchestratorError::Environment(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let mut body = json!({
        "error": err.to_string(),
        "kind": err.kind(),
    });
    if let OrchestratorError::UnsupportedLanguage(e) = err {
        body["supported"] = json!(e.supported);
    }

    (status, body)
}

fn record_verdicts(language: &str, results: &[TestResult]) {
    for result in results {
        let verdict = match result.failure_kind {
            None => "passed".to_string(),
            Some(kind) => kind.to_string(),
        };
        metrics::TEST_VERDICTS_TOTAL
            .with_label_values(&[language, &verdict])
            .inc();
    }
}

/// POST /run - Grade a submission synchronously
pub async fn run_submission(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let start = Instant::now();

    let parsed = body
        .map_err(|rejection| ValidationError::MalformedBody(rejection.body_text()))
        .and_then(|Json(body)| ExecutionRequest::from_json(&body));

    let request = match parsed {
        Ok(request) => request,
        Err(e) => {
            let err = OrchestratorError::from(e);
            warn!(error = %err, "Rejected malformed request");
            metrics::REQUESTS_TOTAL
                .with_label_values(&["unknown", err.kind()])
                .inc();
            let (status, body) = error_response(&err);
            return (status, Json(body)).into_response();
        }
    };

    // Canonical name keeps metric label cardinality bounded
    let language = match state.orchestrator.registry().resolve(request.language.as_deref()) {
        Ok(profile) => profile.name.clone(),
        Err(_) => "unsupported".to_string(),
    };

    let outcome = state.orchestrator.execute(&request).await;
    metrics::REQUEST_DURATION_SECONDS.observe(start.elapsed().as_secs_f64());

    match outcome {
        Ok(results) => {
            info!(
                language = %language,
                test_cases = results.len(),
                passed = results.iter().filter(|r| r.passed).count(),
                "Submission graded"
            );
            metrics::REQUESTS_TOTAL
                .with_label_values(&[&language, "graded"])
                .inc();
            record_verdicts(&language, &results);
            (StatusCode::OK, Json(results)).into_response()
        }
        Err(err) => {
            if err.is_infrastructure() {
                error!(language = %language, error = %err, "Grading failed");
            } else {
                warn!(language = %language, error = %err, "Request rejected");
            }
            metrics::REQUESTS_TOTAL
                .with_label_values(&[&language, err.kind()])
                .inc();
            let (status, body) = error_response(&err);
            (status, Json(body)).into_response()
        }
    }
}

/// GET /languages - Supported languages
pub async fn list_languages(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let languages: Vec<LanguageEntry> = state
        .orchestrator
        .registry()
        .profiles()
        .iter()
        .map(|p| LanguageEntry {
            name: p.name.clone(),
            aliases: p.aliases.clone(),
            compiled: p.needs_compile(),
        })
        .collect();

    Json(json!({
        "default": state.orchestrator.registry().default_language(),
        "languages": languages,
    }))
}

/// GET /health - Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /metrics - Prometheus scrape endpoint
pub async fn metrics_endpoint() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        metrics::render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbiter_common::config::RunnerConfig;
    use arbiter_engine::{
        CommandOutput, LanguageRegistry, Orchestrator, ProviderError, Sandbox, SandboxProvider,
        UnsupportedLanguage,
    };
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;
    use tower::ServiceExt;

    /// Echoes each test's input file back as its output
    struct EchoSandbox {
        files: Mutex<HashMap<String, Vec<u8>>>,
    }

    #[async_trait]
    impl Sandbox for EchoSandbox {
        fn id(&self) -> &str {
            "echo"
        }

        async fn write_file(&self, name: &str, content: &[u8]) -> Result<(), ProviderError> {
            self.files
                .lock()
                .unwrap()
                .insert(name.to_string(), content.to_vec());
            Ok(())
        }

        async fn run(
            &self,
            command: &str,
            _timeout: Option<Duration>,
        ) -> Result<CommandOutput, ProviderError> {
            let input = command.rsplit("< ").next().unwrap_or_default();
            let stdout = self
                .files
                .lock()
                .unwrap()
                .get(input)
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                .unwrap_or_default();
            Ok(CommandOutput {
                exit_code: 0,
                stdout,
                stderr: String::new(),
            })
        }

        async fn release(&self) -> Result<(), ProviderError> {
            Ok(())
        }
    }

    struct EchoProvider {
        available: bool,
    }

    #[async_trait]
    impl SandboxProvider for EchoProvider {
        async fn create(&self, _template: &str) -> Result<Arc<dyn Sandbox>, ProviderError> {
            if !self.available {
                return Err(ProviderError::Provisioning("daemon down".to_string()));
            }
            Ok(Arc::new(EchoSandbox {
                files: Mutex::new(HashMap::new()),
            }))
        }
    }

    fn app(available: bool) -> axum::Router {
        let config = RunnerConfig::from_lookup(|_| None).unwrap();
        let orchestrator = Orchestrator::new(
            Arc::new(EchoProvider { available }),
            Arc::new(LanguageRegistry::builtin()),
            config,
        );
        crate::routes::routes().with_state(Arc::new(AppState { orchestrator }))
    }

    async fn post_run(
        app: axum::Router,
        content_type: Option<&str>,
        body: &str,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method("POST").uri("/run");
        if let Some(content_type) = content_type {
            request = request.header("content-type", content_type);
        }
        let response = app
            .oneshot(request.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_run_grades_submission() {
        let body = json!({
            "code": "print(input())",
            "language": "Python",
            "testCases": [
                {"input": "7\n", "expected": "7"},
                {"input": "8\n", "expected": "9"}
            ]
        });

        let (status, body) =
            post_run(app(true), Some("application/json"), &body.to_string()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["passed"], true);
        assert_eq!(body[0]["output"], "7");
        assert_eq!(body[1]["passed"], false);
        assert_eq!(body[1]["failureKind"], "mismatch");
    }

    #[tokio::test]
    async fn test_run_rejects_unparseable_body_as_validation_error() {
        let (status, body) = post_run(app(true), Some("application/json"), "{not json").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "validationError");
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("invalid request: request body is not valid JSON"));
    }

    #[tokio::test]
    async fn test_run_rejects_missing_content_type_as_validation_error() {
        let (status, body) = post_run(app(true), None, r#"{"code": "x", "testCases": []}"#).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "validationError");
    }

    #[tokio::test]
    async fn test_run_reports_unsupported_language() {
        let body = json!({"code": "x", "language": "cobol", "testCases": []});

        let (status, body) =
            post_run(app(true), Some("application/json"), &body.to_string()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "unsupportedLanguage");
        assert!(body["supported"]
            .as_array()
            .unwrap()
            .contains(&json!("python")));
    }

    #[tokio::test]
    async fn test_run_reports_provisioning_failure() {
        let body = json!({"code": "x", "testCases": [{"expected": ""}]});

        let (status, body) =
            post_run(app(false), Some("application/json"), &body.to_string()).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["kind"], "provisioningError");
    }

    #[test]
    fn test_error_status_codes() {
        let (status, body) = error_response(&OrchestratorError::from(ValidationError::MissingCode));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "validationError");
        assert_eq!(body["error"], "invalid request: code is required and must be a string");

        let (status, body) = error_response(&OrchestratorError::from(UnsupportedLanguage {
            requested: "ruby".to_string(),
            supported: vec!["java".to_string(), "python".to_string()],
        }));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["supported"], json!(["java", "python"]));

        let (status, body) = error_response(&OrchestratorError::Provisioning(
            ProviderError::Provisioning("daemon down".to_string()),
        ));
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["kind"], "provisioningError");
        assert!(body.get("supported").is_none());

        let (status, _) = error_response(&OrchestratorError::Environment(ProviderError::Io(
            "write failed".to_string(),
        )));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
