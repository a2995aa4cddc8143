/// Prometheus metrics for index operations.
///
/// Every index-touching client call is timed through [`timed`]. Recording is
/// best effort: a metric that cannot be registered or observed is skipped and
/// never changes the outcome of the operation being measured.
///
/// # Example
/// ```no_run
/// use redisearch_client::metrics::{gather_metrics, init_metrics};
///
/// init_metrics().ok();
/// println!("{}", gather_metrics());
/// ```

mod decorators;

pub use decorators::*;

use lazy_static::lazy_static;
use prometheus::{CounterVec, HistogramOpts, HistogramVec, Opts, Registry};
use std::sync::atomic::{AtomicBool, Ordering};

const NAMESPACE: &str = "redisearch_client";

static METRICS_ENABLED: AtomicBool = AtomicBool::new(true);

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    /// Index operation duration in seconds
    ///
    /// Labels: operation, index
    pub static ref OPERATION_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "operation_duration_seconds",
            "Index operation duration in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        &["operation", "index"]
    ).expect("Failed to create OPERATION_DURATION_SECONDS metric");

    /// Total number of failed index operations
    ///
    /// Labels: operation, index
    pub static ref OPERATION_ERRORS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("operation_errors_total", "Total number of failed index operations")
            .namespace(NAMESPACE),
        &["operation", "index"]
    ).expect("Failed to create OPERATION_ERRORS_TOTAL metric");

    /// Total number of pages or cursor batches fetched by result streams
    ///
    /// Labels: index, mode
    pub static ref PAGES_FETCHED_TOTAL: CounterVec = CounterVec::new(
        Opts::new("pages_fetched_total", "Total number of result pages fetched")
            .namespace(NAMESPACE),
        &["index", "mode"]
    ).expect("Failed to create PAGES_FETCHED_TOTAL metric");

    /// Total number of stored payloads that failed to decode
    ///
    /// Labels: index
    pub static ref DECODE_FAILURES_TOTAL: CounterVec = CounterVec::new(
        Opts::new("decode_failures_total", "Total number of payloads that failed to decode")
            .namespace(NAMESPACE),
        &["index"]
    ).expect("Failed to create DECODE_FAILURES_TOTAL metric");
}

/// Register all collectors with the global registry.
///
/// Safe to call more than once.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    register(Box::new(OPERATION_DURATION_SECONDS.clone()))?;
    register(Box::new(OPERATION_ERRORS_TOTAL.clone()))?;
    register(Box::new(PAGES_FETCHED_TOTAL.clone()))?;
    register(Box::new(DECODE_FAILURES_TOTAL.clone()))?;

    tracing::debug!("Metrics collectors registered");
    Ok(())
}

fn register(collector: Box<dyn prometheus::core::Collector>) -> Result<(), prometheus::Error> {
    match PROMETHEUS_REGISTRY.register(collector) {
        Ok(()) | Err(prometheus::Error::AlreadyReg) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Turn metric recording on or off process-wide
pub fn set_metrics_enabled(enabled: bool) {
    METRICS_ENABLED.store(enabled, Ordering::Relaxed);
}

pub fn metrics_enabled() -> bool {
    METRICS_ENABLED.load(Ordering::Relaxed)
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}
