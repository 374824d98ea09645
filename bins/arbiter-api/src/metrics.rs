// Prometheus metrics for the grading API

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter_vec, Encoder, Histogram, IntCounterVec, TextEncoder,
};

lazy_static! {
    /// Requests by language and outcome (`graded`, or the top-level error kind)
    pub static ref REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "arbiter_requests_total",
        "Grading requests by language and outcome",
        &["language", "outcome"]
    )
    .expect("metric can be registered");

    /// Per-test verdicts: `passed`, `compileError`, `runtimeError`, `mismatch`
    pub static ref TEST_VERDICTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "arbiter_test_verdicts_total",
        "Test case verdicts by language",
        &["language", "verdict"]
    )
    .expect("metric can be registered");

    pub static ref REQUEST_DURATION_SECONDS: Histogram = register_histogram!(
        "arbiter_request_duration_seconds",
        "End-to-end grading latency",
        vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .expect("metric can be registered");
}

/// Render every registered metric in the Prometheus text format
pub fn render() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8(buffer).unwrap_or_default()
}
