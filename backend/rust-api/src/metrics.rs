use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter_vec, CounterVec, Encoder,
    HistogramVec, IntCounterVec, TextEncoder,
};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Cache Metrics (Redis)
    pub static ref CACHE_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "cache_operations_total",
        "Total number of cache operations",
        &["operation", "status"]
    )
    .unwrap();

    pub static ref CACHE_HIT_RATIO: CounterVec = register_counter_vec!(
        "cache_hit_ratio",
        "Cache hit/miss ratio",
        &["result"]
    )
    .unwrap();

    // Business Metrics
    pub static ref ACTIVITIES_LOGGED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "activities_logged_total",
        "Total number of activities logged",
        &["category"]
    )
    .unwrap();

    pub static ref EMISSION_LOGGED_KG_TOTAL: CounterVec = register_counter_vec!(
        "emission_logged_kg_total",
        "kg CO2e recorded through logged activities",
        &["category"]
    )
    .unwrap();

    pub static ref QUIZ_SUBMISSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "quiz_submissions_total",
        "Total number of completed quiz submissions",
        &["grade"]
    )
    .unwrap();

    pub static ref CHALLENGE_JOINS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "challenge_joins_total",
        "Total number of challenge joins",
        &["category"]
    )
    .unwrap();

    pub static ref PARTICIPANT_RECOMPUTES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "participant_recomputes_total",
        "Total number of participant progress recomputes",
        &["status"]
    )
    .unwrap();

    pub static ref TREES_AWARDED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "trees_awarded_total",
        "Total number of trees awarded",
        &["reason"]
    )
    .unwrap();

    pub static ref PROGRESS_WORKER_TICKS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "progress_worker_ticks_total",
        "Total number of progress worker ticks",
        &["status"]
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

/// Helper: track cache operation with metrics
pub async fn track_cache_operation<F, T, E>(operation: &str, future: F) -> Result<T, E>
where
    F: std::future::Future<Output = Result<T, E>>,
{
    let result = future.await;
    let status = if result.is_ok() { "success" } else { "error" };

    CACHE_OPERATIONS_TOTAL
        .with_label_values(&[operation, status])
        .inc();

    result
}

pub fn record_cache_hit() {
    CACHE_HIT_RATIO.with_label_values(&["hit"]).inc();
}

pub fn record_cache_miss() {
    CACHE_HIT_RATIO.with_label_values(&["miss"]).inc();
}

pub fn record_activity_logged(category: &str, emission: f64) {
    ACTIVITIES_LOGGED_TOTAL.with_label_values(&[category]).inc();
    EMISSION_LOGGED_KG_TOTAL
        .with_label_values(&[category])
        .inc_by(emission.max(0.0));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        let _ = HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/health", "200"])
            .get();
        let _ = PARTICIPANT_RECOMPUTES_TOTAL
            .with_label_values(&["success"])
            .get();
    }

    #[test]
    fn test_render_metrics() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();
        record_activity_logged("Food", 30.0);

        let output = render_metrics().unwrap();
        assert!(output.contains("http_requests_total"));
        assert!(output.contains("activities_logged_total"));
    }
}
