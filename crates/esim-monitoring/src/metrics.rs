//! Metrics for the provisioning coordinator.
//!
//! Each recording goes to the `metrics` facade and to a structured log line.
//! Without an installed recorder the facade calls are no-ops.

use ::metrics::{histogram, increment_counter};
use tracing::info;

/// Provisioning coordinator metrics
pub struct ProvisioningMetrics;

impl ProvisioningMetrics {
    /// Record an event leaving the coordinator
    pub fn record_event(event: &str, has_correlation_id: bool) {
        increment_counter!("esim_events_total", "event" => event.to_string());
        info!(
            metric = "esim_events_total",
            event,
            has_correlation_id,
            "Provisioning event emitted"
        );
    }

    /// Record a method call and its handling time
    pub fn record_method_call(method: &str, duration_ms: f64, status: &str) {
        increment_counter!(
            "esim_method_calls_total",
            "method" => method.to_string(),
            "status" => status.to_string()
        );
        histogram!("esim_method_call_duration_ms", duration_ms, "method" => method.to_string());
        info!(
            metric = "esim_method_calls_total",
            method,
            status,
            duration_ms,
            "Method call handled"
        );
    }

    /// Record a synchronous rejection
    pub fn record_rejection(code: &str) {
        increment_counter!("esim_rejections_total", "code" => code.to_string());
        info!(metric = "esim_rejections_total", code, "Request rejected");
    }

    /// Record a teardown and how many requests it abandoned
    pub fn record_teardown(abandoned: usize) {
        increment_counter!("esim_teardowns_total");
        info!(metric = "esim_teardowns_total", abandoned, "Coordinator torn down");
    }
}
