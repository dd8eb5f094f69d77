//! Prometheus metrics definitions.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_gauge, HistogramVec, IntCounter,
    IntGauge,
};

/// Total chunks currently indexed.
pub static CHUNKS_TOTAL: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("semdex_chunks_total", "Total number of indexed chunks").unwrap()
});

/// Total files indexed since startup.
pub static FILES_INDEXED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "semdex_files_indexed_total",
        "Total number of files indexed since startup"
    )
    .unwrap()
});

/// Total full scans started.
pub static SCANS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("semdex_scans_total", "Total number of full scans started").unwrap()
});

/// Total search requests served.
pub static SEARCH_REQUESTS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "semdex_search_requests_total",
        "Total number of search requests"
    )
    .unwrap()
});

/// Request latency histogram.
pub static REQUEST_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "semdex_request_duration_seconds",
        "Request latency in seconds",
        &["endpoint", "method"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .unwrap()
});

/// Initialize all metrics (call once at startup).
pub fn init_metrics() {
    // Access lazy statics to register them
    let _ = &*CHUNKS_TOTAL;
    let _ = &*FILES_INDEXED;
    let _ = &*SCANS_TOTAL;
    let _ = &*SEARCH_REQUESTS;
    let _ = &*REQUEST_LATENCY;

    tracing::debug!("Prometheus metrics initialized");
}
