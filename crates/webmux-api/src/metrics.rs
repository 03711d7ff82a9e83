//! Prometheus metrics for the API server.

use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "webmux_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "webmux_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "webmux_http_requests_in_flight";

    pub const JOBS_ENQUEUED_TOTAL: &str = "webmux_jobs_enqueued_total";
    pub const DOWNLOADS_TOTAL: &str = "webmux_downloads_total";
    pub const DOWNLOAD_BYTES_TOTAL: &str = "webmux_download_served_bytes_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_job_enqueued() {
    counter!(names::JOBS_ENQUEUED_TOTAL).increment(1);
}

pub fn record_download(bytes: u64) {
    counter!(names::DOWNLOADS_TOTAL).increment(1);
    counter!(names::DOWNLOAD_BYTES_TOTAL).increment(bytes);
}

/// Collapse per-job path segments so label cardinality stays bounded.
fn sanitize_path(path: &str) -> String {
    for prefix in ["/api/status/", "/api/download/"] {
        if let Some(rest) = path.strip_prefix(prefix) {
            if !rest.is_empty() {
                return format!("{}:job_id", prefix);
            }
        }
    }
    path.to_string()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(
            sanitize_path("/api/status/550e8400-e29b-41d4-a716-446655440000"),
            "/api/status/:job_id"
        );
        assert_eq!(sanitize_path("/api/download/j1"), "/api/download/:job_id");
        assert_eq!(sanitize_path("/api/generate"), "/api/generate");
        assert_eq!(sanitize_path("/health"), "/health");
    }
}
