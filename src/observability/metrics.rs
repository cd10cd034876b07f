use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, HistogramOpts, HistogramVec, IntGaugeVec, Opts,
    Registry,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // API metrics
    pub static ref API_REQUESTS: CounterVec = CounterVec::new(
        Opts::new("price_api_requests_total", "Total number of API requests"),
        &["endpoint", "status"]
    ).unwrap();

    pub static ref API_REQUEST_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "price_api_request_duration_seconds",
            "API request duration in seconds"
        ).buckets(exponential_buckets(0.001, 2.0, 15).unwrap()),
        &["endpoint"]
    ).unwrap();

    // Cache metrics
    pub static ref CACHE_HITS: Counter = Counter::new(
        "price_cache_hits_total",
        "Total number of cache hits"
    ).unwrap();

    pub static ref CACHE_MISSES: Counter = Counter::new(
        "price_cache_misses_total",
        "Total number of cache misses"
    ).unwrap();

    // Source metrics
    pub static ref SOURCE_REQUESTS: CounterVec = CounterVec::new(
        Opts::new("price_source_requests_total", "Total number of requests to price sources"),
        &["source"]
    ).unwrap();

    pub static ref SOURCE_ERRORS: CounterVec = CounterVec::new(
        Opts::new("price_source_errors_total", "Total number of price source request errors"),
        &["source", "error_type"]
    ).unwrap();

    pub static ref SOURCE_REQUEST_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "price_source_request_duration_seconds",
            "Price source request duration in seconds"
        ).buckets(exponential_buckets(0.001, 2.0, 10).unwrap()),
        &["source"]
    ).unwrap();

    // Circuit breaker state: 0=closed, 1=open, 2=half-open
    pub static ref CIRCUIT_BREAKER_STATE: IntGaugeVec = IntGaugeVec::new(
        Opts::new("price_circuit_breaker_state", "Circuit breaker state (0=closed, 1=open, 2=half-open)"),
        &["source"]
    ).unwrap();

    // Refresh metrics
    pub static ref REFRESH_TOTAL: CounterVec = CounterVec::new(
        Opts::new("price_refresh_total", "Total number of price refreshes"),
        &["tier", "trigger_type"]
    ).unwrap();

    pub static ref REFRESH_ERRORS: CounterVec = CounterVec::new(
        Opts::new("price_refresh_errors_total", "Total number of price refresh errors"),
        &["tier"]
    ).unwrap();

    // Asset metrics
    pub static ref ASSET_ACCESS: CounterVec = CounterVec::new(
        Opts::new("price_asset_access_total", "Total number of accesses per asset"),
        &["asset", "tier"]
    ).unwrap();
}

pub fn register_metrics() {
    REGISTRY.register(Box::new(API_REQUESTS.clone())).unwrap();
    REGISTRY.register(Box::new(API_REQUEST_DURATION.clone())).unwrap();
    REGISTRY.register(Box::new(CACHE_HITS.clone())).unwrap();
    REGISTRY.register(Box::new(CACHE_MISSES.clone())).unwrap();
    REGISTRY.register(Box::new(SOURCE_REQUESTS.clone())).unwrap();
    REGISTRY.register(Box::new(SOURCE_ERRORS.clone())).unwrap();
    REGISTRY.register(Box::new(SOURCE_REQUEST_DURATION.clone())).unwrap();
    REGISTRY.register(Box::new(CIRCUIT_BREAKER_STATE.clone())).unwrap();
    REGISTRY.register(Box::new(REFRESH_TOTAL.clone())).unwrap();
    REGISTRY.register(Box::new(REFRESH_ERRORS.clone())).unwrap();
    REGISTRY.register(Box::new(ASSET_ACCESS.clone())).unwrap();
}
