//! Prometheus metrics for the worker.

use std::net::SocketAddr;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::{WorkerError, WorkerResult};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_STARTED_TOTAL: &str = "webmux_jobs_started_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "webmux_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "webmux_jobs_failed_total";
    pub const JOBS_SKIPPED_TOTAL: &str = "webmux_jobs_skipped_total";
    pub const JOBS_IN_FLIGHT: &str = "webmux_jobs_in_flight";
    pub const STAGE_DURATION_SECONDS: &str = "webmux_stage_duration_seconds";
    pub const DOWNLOAD_BYTES_TOTAL: &str = "webmux_download_bytes_total";
    pub const RESUBSCRIBES_TOTAL: &str = "webmux_resubscribes_total";
}

/// Install the recorder and serve `/metrics` on `port`.
pub fn init_metrics(port: u16) -> WorkerResult<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| WorkerError::config_error(format!("metrics exporter: {}", e)))
}

pub fn record_job_started() {
    counter!(names::JOBS_STARTED_TOTAL).increment(1);
}

pub fn record_job_completed() {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
}

pub fn record_job_failed(stage: &str) {
    let labels = [("stage", stage.to_string())];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

pub fn record_job_skipped(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::JOBS_SKIPPED_TOTAL, &labels).increment(1);
}

pub fn set_jobs_in_flight(count: usize) {
    gauge!(names::JOBS_IN_FLIGHT).set(count as f64);
}

pub fn record_stage_duration(stage: &str, duration_secs: f64) {
    let labels = [("stage", stage.to_string())];
    histogram!(names::STAGE_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_download_bytes(stream: &str, bytes: u64) {
    let labels = [("stream", stream.to_string())];
    counter!(names::DOWNLOAD_BYTES_TOTAL, &labels).increment(bytes);
}

pub fn record_resubscribe() {
    counter!(names::RESUBSCRIBES_TOTAL).increment(1);
}
