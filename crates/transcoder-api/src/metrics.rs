//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "transcoder_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "transcoder_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "transcoder_http_requests_in_flight";

    // WebSocket metrics
    pub const WS_CONNECTIONS_TOTAL: &str = "transcoder_ws_connections_total";
    pub const WS_CONNECTIONS_ACTIVE: &str = "transcoder_ws_connections_active";
    pub const WS_MESSAGES_SENT: &str = "transcoder_ws_messages_sent_total";
    pub const WS_MESSAGES_RECEIVED: &str = "transcoder_ws_messages_received_total";

    // Queue/job metrics
    pub const WORK_QUEUE_DEPTH: &str = "transcoder_work_queue_depth";
    pub const JOBS_SUBMITTED_TOTAL: &str = "transcoder_jobs_submitted_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "transcoder_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "transcoder_jobs_failed_total";
    pub const JOBS_STALLED_TOTAL: &str = "transcoder_jobs_stalled_total";
    pub const JOB_PIPELINE_DURATION_SECONDS: &str = "transcoder_job_pipeline_duration_seconds";

    // Blob transfer metrics
    pub const DOWNLOAD_DURATION_SECONDS: &str = "transcoder_download_duration_seconds";
    pub const UPLOAD_DURATION_SECONDS: &str = "transcoder_upload_duration_seconds";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "transcoder_rate_limit_hits_total";
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

/// Record WebSocket connection.
pub fn record_ws_connection(endpoint: &str) {
    let labels = [("endpoint", endpoint.to_string())];
    counter!(names::WS_CONNECTIONS_TOTAL, &labels).increment(1);
}

/// Update active WebSocket connections gauge.
pub fn set_ws_active_connections(count: i64) {
    gauge!(names::WS_CONNECTIONS_ACTIVE).set(count as f64);
}

/// Record WebSocket message sent.
pub fn record_ws_message_sent(endpoint: &str, message_type: &str) {
    let labels = [
        ("endpoint", endpoint.to_string()),
        ("type", message_type.to_string()),
    ];
    counter!(names::WS_MESSAGES_SENT, &labels).increment(1);
}

/// Record WebSocket message received.
pub fn record_ws_message_received(endpoint: &str) {
    let labels = [("endpoint", endpoint.to_string())];
    counter!(names::WS_MESSAGES_RECEIVED, &labels).increment(1);
}

/// Update work queue depth gauge.
pub fn set_queue_length(length: u64) {
    gauge!(names::WORK_QUEUE_DEPTH).set(length as f64);
}

/// Record job submitted (Dispatcher).
pub fn record_job_submitted() {
    counter!(names::JOBS_SUBMITTED_TOTAL).increment(1);
}

/// Record job completed (API-side Consumer, on a `completed` result).
pub fn record_job_completed() {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
}

/// Record job failed (API-side Consumer, on a `failed` or `cancelled` result).
pub fn record_job_failed(error_type: Option<&str>) {
    let labels = [("error_type", error_type.unwrap_or("none").to_string())];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

/// Record job stalled (Stall Detector).
pub fn record_job_stalled() {
    counter!(names::JOBS_STALLED_TOTAL).increment(1);
}

/// Record end-to-end pipeline duration for a terminal job.
pub fn record_job_pipeline_duration(duration_secs: f64) {
    histogram!(names::JOB_PIPELINE_DURATION_SECONDS).record(duration_secs);
}

/// Record download duration.
pub fn record_download_duration(duration_secs: f64) {
    histogram!(names::DOWNLOAD_DURATION_SECONDS).record(duration_secs);
}

/// Record upload duration.
pub fn record_upload_duration(duration_secs: f64) {
    histogram!(names::UPLOAD_DURATION_SECONDS).record(duration_secs);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", endpoint.to_string())];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Sanitize path for metrics labels (remove IDs, etc.).
fn sanitize_path(path: &str) -> String {
    let path = regex_lite::Regex::new(r"/jobs/[a-zA-Z0-9_-]+")
        .unwrap()
        .replace_all(path, "/jobs/:job_id");
    let path = regex_lite::Regex::new(r"/presets/[0-9]+")
        .unwrap()
        .replace_all(&path, "/presets/:preset_id");
    let path = regex_lite::Regex::new(r"/playlists/[0-9]+")
        .unwrap()
        .replace_all(&path, "/playlists/:playlist_id");
    let path = regex_lite::Regex::new(r"/progress/[a-zA-Z0-9_-]+")
        .unwrap()
        .replace_all(&path, "/progress/:job_id");
    let path = regex_lite::Regex::new(r"/download/[a-zA-Z0-9_./-]+")
        .unwrap()
        .replace_all(&path, "/download/:key");
    path.to_string()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    // Increment in-flight counter
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    // Decrement in-flight counter
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(sanitize_path("/jobs/render-001"), "/jobs/:job_id");
        assert_eq!(sanitize_path("/presets/42"), "/presets/:preset_id");
        assert_eq!(
            sanitize_path("/progress/render-001"),
            "/progress/:job_id"
        );
    }
}
