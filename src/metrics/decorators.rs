/// Timing wrappers for index operations
use super::*;
use std::time::Instant;

/// Run an index operation, recording its duration and failure.
///
/// # Example
/// ```no_run
/// use redisearch_client::metrics::timed;
///
/// let count = timed("count", "sku", || Ok::<_, redisearch_client::ClientError>(42));
/// ```
pub fn timed<F, T, E>(operation: &str, index: &str, f: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
{
    let start = Instant::now();
    let result = f();
    let elapsed = start.elapsed();

    tracing::debug!(
        operation,
        index,
        elapsed_ms = elapsed.as_secs_f64() * 1000.0,
        ok = result.is_ok(),
        "Index operation finished"
    );

    if metrics_enabled() {
        if let Ok(histogram) =
            OPERATION_DURATION_SECONDS.get_metric_with_label_values(&[operation, index])
        {
            histogram.observe(elapsed.as_secs_f64());
        }
        if result.is_err() {
            if let Ok(counter) =
                OPERATION_ERRORS_TOTAL.get_metric_with_label_values(&[operation, index])
            {
                counter.inc();
            }
        }
    }

    result
}

/// Count one page or cursor batch fetched by a result stream
pub fn record_page_fetch(index: &str, mode: &str) {
    if !metrics_enabled() {
        return;
    }
    if let Ok(counter) = PAGES_FETCHED_TOTAL.get_metric_with_label_values(&[index, mode]) {
        counter.inc();
    }
}

/// Count payloads that could not be decoded
pub fn record_decode_failures(index: &str, count: usize) {
    if !metrics_enabled() || count == 0 {
        return;
    }
    if let Ok(counter) = DECODE_FAILURES_TOTAL.get_metric_with_label_values(&[index]) {
        counter.inc_by(count as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timed_passes_result_through() {
        let ok: Result<u32, String> = timed("test_op", "decorator_test", || Ok(7));
        assert_eq!(ok, Ok(7));

        let err: Result<u32, String> = timed("test_op", "decorator_test", || Err("boom".into()));
        assert_eq!(err, Err("boom".to_string()));

        let errors = OPERATION_ERRORS_TOTAL
            .with_label_values(&["test_op", "decorator_test"])
            .get();
        assert!(errors >= 1.0);
    }
}
