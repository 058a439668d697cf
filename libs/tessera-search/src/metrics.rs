//! Prometheus metrics for indexing and search

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    // Indexing Metrics

    /// Bulk operations staged per document type and kind (index, delete)
    pub static ref INDEXING_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "tessera_indexing_operations_total",
        "Total number of staged indexing operations",
        &["document_type", "operation"]
    )
    .expect("Failed to register INDEXING_OPERATIONS_TOTAL");

    /// Bulk requests by outcome
    pub static ref BULK_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "tessera_bulk_requests_total",
        "Total number of bulk requests sent to the search backend",
        &["status"]
    )
    .expect("Failed to register BULK_REQUESTS_TOTAL");

    /// Bulk request duration
    pub static ref BULK_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "tessera_bulk_duration_seconds",
        "Bulk request duration in seconds",
        &["refresh"],
        vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .expect("Failed to register BULK_DURATION_SECONDS");

    /// Full index rebuilds
    pub static ref REBUILDS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "tessera_rebuilds_total",
        "Total number of index rebuilds",
        &["document_type", "mode"]
    )
    .expect("Failed to register REBUILDS_TOTAL");

    // Search Metrics

    /// Searches by document type and outcome
    pub static ref SEARCH_TOTAL: IntCounterVec = register_int_counter_vec!(
        "tessera_search_total",
        "Total number of advanced searches",
        &["document_type", "status"]
    )
    .expect("Failed to register SEARCH_TOTAL");

    /// Search duration
    pub static ref SEARCH_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "tessera_search_duration_seconds",
        "Advanced search duration in seconds",
        &["document_type"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .expect("Failed to register SEARCH_DURATION_SECONDS");

    /// Total hits reported by the backend
    pub static ref SEARCH_RESULTS: HistogramVec = register_histogram_vec!(
        "tessera_search_results",
        "Number of documents matched by a search",
        &["document_type"],
        vec![0.0, 1.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0, 10000.0]
    )
    .expect("Failed to register SEARCH_RESULTS");
}

/// Render all registered metrics in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
