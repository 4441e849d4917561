//! Prometheus Metrics Module
//!
//! Application-wide metrics collection.
//!
//! # Metrics Collected
//! - Active WebSocket connection gauge
//! - Gateway command counts by command name
//! - Messages sent, split by encryption state
//! - Rate limit rejections by category
//! - Duplicate sends dropped by the dedup window
//! - Circuit breaker state and follow-check bypasses

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, GaugeVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Active WebSocket connections
pub static WS_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new(
            "ws_connections_active",
            "Number of live WebSocket connections",
        )
        .namespace("chat_gateway"),
    )
    .expect("Failed to create WS_CONNECTIONS_ACTIVE metric")
});

/// Gateway command counter by command name and outcome
pub static COMMANDS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("commands_total", "Gateway commands processed").namespace("chat_gateway"),
        &["command", "outcome"],
    )
    .expect("Failed to create COMMANDS_TOTAL metric")
});

/// Messages sent counter, split by encryption state
pub static MESSAGES_SENT_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("messages_sent_total", "Messages persisted and broadcast")
            .namespace("chat_gateway"),
        &["encrypted"],
    )
    .expect("Failed to create MESSAGES_SENT_TOTAL metric")
});

/// Rate limit rejections by category
pub static RATE_LIMIT_REJECTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "rate_limit_rejections_total",
            "Actions rejected by the rate limiter",
        )
        .namespace("chat_gateway"),
        &["category"],
    )
    .expect("Failed to create RATE_LIMIT_REJECTIONS_TOTAL metric")
});

/// Duplicate sends silently dropped
pub static DEDUP_DROPS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new(
            "dedup_drops_total",
            "Duplicate client message ids dropped by the dedup window",
        )
        .namespace("chat_gateway"),
    )
    .expect("Failed to create DEDUP_DROPS_TOTAL metric")
});

/// Circuit breaker state (1 for the current state, 0 otherwise)
pub static CIRCUIT_BREAKER_STATE: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(
        Opts::new("circuit_breaker_state", "Circuit breaker state per dependency")
            .namespace("chat_gateway"),
        &["breaker", "state"],
    )
    .expect("Failed to create CIRCUIT_BREAKER_STATE metric")
});

/// Mutual-follow checks skipped because the breaker was open
pub static FOLLOW_CHECK_BYPASS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new(
            "follow_check_bypass_total",
            "Room creations that skipped the mutual-follow check",
        )
        .namespace("chat_gateway"),
    )
    .expect("Failed to create FOLLOW_CHECK_BYPASS_TOTAL metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(WS_CONNECTIONS_ACTIVE.clone()))
        .expect("Failed to register WS_CONNECTIONS_ACTIVE");
    registry
        .register(Box::new(COMMANDS_TOTAL.clone()))
        .expect("Failed to register COMMANDS_TOTAL");
    registry
        .register(Box::new(MESSAGES_SENT_TOTAL.clone()))
        .expect("Failed to register MESSAGES_SENT_TOTAL");
    registry
        .register(Box::new(RATE_LIMIT_REJECTIONS_TOTAL.clone()))
        .expect("Failed to register RATE_LIMIT_REJECTIONS_TOTAL");
    registry
        .register(Box::new(DEDUP_DROPS_TOTAL.clone()))
        .expect("Failed to register DEDUP_DROPS_TOTAL");
    registry
        .register(Box::new(CIRCUIT_BREAKER_STATE.clone()))
        .expect("Failed to register CIRCUIT_BREAKER_STATE");
    registry
        .register(Box::new(FOLLOW_CHECK_BYPASS_TOTAL.clone()))
        .expect("Failed to register FOLLOW_CHECK_BYPASS_TOTAL");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .expect("Failed to encode metrics");
    String::from_utf8(buffer).expect("Metrics should be valid UTF-8")
}

/// Record a processed gateway command
pub fn record_command(command: &str, outcome: &str) {
    COMMANDS_TOTAL.with_label_values(&[command, outcome]).inc();
}

/// Record a persisted message
pub fn record_message_sent(encrypted: bool) {
    MESSAGES_SENT_TOTAL
        .with_label_values(&[if encrypted { "true" } else { "false" }])
        .inc();
}

/// Record a rate limit rejection
pub fn record_rate_limit_rejection(category: &str) {
    RATE_LIMIT_REJECTIONS_TOTAL
        .with_label_values(&[category])
        .inc();
}

/// Record a dropped duplicate send
pub fn record_dedup_drop() {
    DEDUP_DROPS_TOTAL.inc();
}

/// Record a bypassed mutual-follow check
pub fn record_follow_check_bypass() {
    FOLLOW_CHECK_BYPASS_TOTAL.inc();
}

/// Set the circuit breaker state gauge
pub fn set_circuit_breaker_state(breaker: &str, state: &str) {
    for s in ["closed", "open", "half_open"] {
        CIRCUIT_BREAKER_STATE
            .with_label_values(&[breaker, s])
            .set(if s == state { 1.0 } else { 0.0 });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        // Force lazy initialization
        let _ = &*REGISTRY;
        let _ = &*WS_CONNECTIONS_ACTIVE;
        let _ = &*COMMANDS_TOTAL;
        let _ = &*CIRCUIT_BREAKER_STATE;
    }

    #[test]
    fn test_gather_metrics() {
        record_command("send_message", "ok");
        let metrics = gather_metrics();
        assert!(metrics.contains("commands_total"));
    }

    #[test]
    fn test_breaker_state_is_exclusive() {
        set_circuit_breaker_state("follow_check", "open");
        let metrics = gather_metrics();
        assert!(metrics.contains("circuit_breaker_state"));
    }
}
