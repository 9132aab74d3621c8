//! Statistics pipeline metrics
//!
//! Prometheus metrics for the producer adapter, the consumer loops and the query engine

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};
use std::time::Duration;

static EVENTS_PUBLISHED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "statistics_events_published_total",
        "Interaction events handed to the channel (success/error)",
        &["kind", "status"]
    )
    .expect("Failed to register events published metric")
});

static EVENTS_CONSUMED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "statistics_events_consumed_total",
        "Interaction events read by the consumer loops, by outcome",
        &["kind", "outcome"]
    )
    .expect("Failed to register events consumed metric")
});

static DEAD_LETTERS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "statistics_dead_letters_total",
        "Messages dropped by the consumer loops",
        &["kind", "reason"]
    )
    .expect("Failed to register dead letters metric")
});

static QUERY_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "statistics_query_duration_seconds",
        "Duration of aggregate queries",
        &["query"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]
    )
    .expect("Failed to register query duration metric")
});

/// Record a publish attempt (success/error)
pub fn record_published(kind: &str, status: &str) {
    EVENTS_PUBLISHED_TOTAL
        .with_label_values(&[kind, status])
        .inc();
}

/// Record what the consumer did with one message (applied/malformed/write_failed)
pub fn record_consumed(kind: &str, outcome: &str) {
    EVENTS_CONSUMED_TOTAL
        .with_label_values(&[kind, outcome])
        .inc();
}

pub fn record_dead_letter(kind: &str, reason: &str) {
    DEAD_LETTERS_TOTAL.with_label_values(&[kind, reason]).inc();
}

pub fn record_query_duration(query: &str, duration: Duration) {
    QUERY_DURATION_SECONDS
        .with_label_values(&[query])
        .observe(duration.as_secs_f64());
}

/// Render every registered metric in the Prometheus text format
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8(buffer).unwrap_or_default()
}
