use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, Histogram, register_counter, register_counter_vec, register_gauge,
    register_histogram,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("codegen_requests_total", "Total number of generate requests")
            .expect("register codegen_requests_total");
    pub static ref CACHE_HITS: Counter =
        register_counter!("codegen_cache_hits_total", "Total cache hits")
            .expect("register codegen_cache_hits_total");
    pub static ref CACHE_MISSES: Counter =
        register_counter!("codegen_cache_misses_total", "Total cache misses")
            .expect("register codegen_cache_misses_total");
    pub static ref CACHE_ERRORS: Counter =
        register_counter!("codegen_cache_errors_total", "Cache backend failures absorbed")
            .expect("register codegen_cache_errors_total");
    pub static ref UPSTREAM_ERRORS: CounterVec = register_counter_vec!(
        "codegen_upstream_errors_total",
        "Failed upstream generation calls",
        &["retryable"]
    )
    .expect("register codegen_upstream_errors_total");
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "codegen_request_latency_seconds",
        "Request latency in seconds"
    )
    .expect("register codegen_request_latency_seconds");
    pub static ref CACHE_SIZE: Gauge =
        register_gauge!("codegen_cache_size", "Current number of items in the in-process cache")
            .expect("register codegen_cache_size");
}
