//! Metrics definitions for the Room Coordinator.
//!
//! All metrics follow Prometheus naming conventions:
//! - `rc_` prefix for Room Coordinator
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `event`: the known webhook event kinds plus `unknown`
//! - `status`: success, error
//! - `operation`: bounded by code (list_rooms, list_participants, ...)
//! - `endpoint`: parameterized paths
//!
//! Room ids and identities are never used as labels.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("rc_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // Upstream calls are bounded by UPSTREAM_TIMEOUT_SECONDS
        .set_buckets_for_metric(
            Matcher::Prefix("rc_upstream_request".to_string()),
            &[
                0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.000, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set upstream request buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `rc_http_requests_total`, `rc_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("rc_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.clone(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("rc_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Normalize endpoint path to prevent label cardinality explosion
///
/// Replaces room ids with a placeholder.
fn normalize_endpoint(path: &str) -> String {
    match path {
        "/metrics" | "/api/ping" | "/api/health" | "/api/rooms" | "/api/token"
        | "/api/webhook" | "/api/ws" => path.to_string(),
        _ => normalize_dynamic_endpoint(path),
    }
}

fn normalize_dynamic_endpoint(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("/api/rooms/") {
        let parts: Vec<&str> = rest.split('/').collect();
        match parts.as_slice() {
            [id] if !id.is_empty() => return "/api/rooms/{roomId}".to_string(),
            [id, "participants"] if !id.is_empty() => {
                return "/api/rooms/{roomId}/participants".to_string()
            }
            _ => {}
        }
    }

    // Unknown paths normalized to "/other" to bound cardinality
    "/other".to_string()
}

// ============================================================================
// Room State Metrics
// ============================================================================

/// Record an inbound webhook event by kind
///
/// Metric: `rc_webhook_events_total`
/// Labels: `event`
pub fn record_webhook_event(event: &'static str) {
    counter!("rc_webhook_events_total", "event" => event).increment(1);
}

/// Record one broadcast and the observers it pruned
///
/// Metric: `rc_broadcasts_total`, `rc_observers_pruned_total`
pub fn record_broadcast(delivered: usize, pruned: usize) {
    counter!("rc_broadcasts_total").increment(1);
    if pruned > 0 {
        counter!("rc_observers_pruned_total").increment(pruned as u64);
    }
    histogram!("rc_broadcast_fanout").record(delivered as f64);
}

/// Set the number of registered observers
///
/// Metric: `rc_observers`
pub fn set_observer_count(count: usize) {
    gauge!("rc_observers").set(count as f64);
}

/// Record an access grant issuance
///
/// Metric: `rc_tokens_issued_total`
/// Labels: `can_publish`
pub fn record_token_issued(can_publish: bool) {
    counter!("rc_tokens_issued_total", "can_publish" => can_publish.to_string()).increment(1);
}

/// Record a resync attempt
///
/// Metric: `rc_resync_total`, `rc_resync_duration_seconds`
/// Labels: `status`
pub fn record_resync(status: &'static str, duration: Duration) {
    histogram!("rc_resync_duration_seconds").record(duration.as_secs_f64());
    counter!("rc_resync_total", "status" => status).increment(1);
}

// ============================================================================
// Upstream Metrics
// ============================================================================

/// Record a call to the media server management API
///
/// Metric: `rc_upstream_request_duration_seconds`
/// Labels: `operation`, `status`
pub fn record_upstream_request(operation: &'static str, status: &'static str, duration: Duration) {
    histogram!("rc_upstream_request_duration_seconds",
        "operation" => operation,
        "status" => status
    )
    .record(duration.as_secs_f64());
}

/// Record a chat notification outcome
///
/// Metric: `rc_notifications_total`
/// Labels: `status` (sent, failed, dropped, disabled)
pub fn record_notification(status: &'static str) {
    counter!("rc_notifications_total", "status" => status).increment(1);
}

// ============================================================================
// Tests
// ============================================================================
