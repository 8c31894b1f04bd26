//! Prometheus metrics for the session token service.

use once_cell::sync::Lazy;
use prometheus::{register_counter_vec, CounterVec, Encoder, TextEncoder};

/// Tokens issued counter.
pub static TOKENS_ISSUED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "session_token_tokens_issued_total",
        "Total number of tokens issued",
        &["token_type"]
    )
    .expect("Failed to register tokens_issued metric")
});

/// Refresh attempts by outcome.
pub static TOKENS_REFRESHED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "session_token_refreshes_total",
        "Total number of refresh attempts",
        &["status"]
    )
    .expect("Failed to register refreshes metric")
});

/// Security events counter.
pub static SECURITY_EVENTS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "session_token_security_events_total",
        "Total number of security events",
        &["event_type"]
    )
    .expect("Failed to register security_events metric")
});

/// Security event labels.
pub const ORIGIN_MISMATCH: &str = "ORIGIN_MISMATCH";
pub const REFRESH_REUSE: &str = "REFRESH_REUSE";
pub const NOTIFY_FAILED: &str = "NOTIFY_FAILED";

/// Record a token issuance.
pub fn record_token_issued(token_type: &str) {
    TOKENS_ISSUED.with_label_values(&[token_type]).inc();
}

/// Record a refresh outcome.
pub fn record_token_refreshed(status: &str) {
    TOKENS_REFRESHED.with_label_values(&[status]).inc();
}

/// Record a security event.
pub fn record_security_event(event_type: &str) {
    SECURITY_EVENTS.with_label_values(&[event_type]).inc();
}

/// Text exposition of every registered metric.
pub fn render() -> String {
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&prometheus::gather(), &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8(buffer).unwrap_or_default()
}
