// Metrics and observability module
// This file tracks the collector's own behaviour: how long service queries
// take and how often they fail
//
// Numan Thabit 2025 Nov

use once_cell::sync::Lazy;
use prometheus::{register_counter_vec, register_histogram_vec, CounterVec, HistogramVec};

pub static QUERY_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "nerve_query_latency_seconds",
        "latency of service metrics queries",
        &["service"]
    )
    .unwrap()
});

pub static QUERY_ERRORS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "nerve_query_errors_total",
        "failed service queries by cause",
        &["service", "kind"]
    )
    .unwrap()
});
