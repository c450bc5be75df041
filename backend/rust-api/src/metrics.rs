use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder, HistogramVec,
    IntCounter, IntCounterVec, TextEncoder,
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

    // Storage Metrics
    pub static ref DB_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "db_operations_total",
        "Total number of storage operations",
        &["operation", "status"]
    )
    .unwrap();

    // Business Metrics
    pub static ref FORM_SUBMISSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "form_submissions_total",
        "Total number of form submissions by outcome",
        &["outcome"]
    )
    .unwrap();

    pub static ref VALIDATION_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "validation_failures_total",
        "Number of answer sets rejected by required-field validation",
        &["scope"]
    )
    .unwrap();

    pub static ref FORMS_PUBLISHED_TOTAL: IntCounter = register_int_counter!(
        "forms_published_total",
        "Total number of form publications"
    )
    .unwrap();

    pub static ref NOTIFICATIONS_SENT_TOTAL: IntCounterVec = register_int_counter_vec!(
        "notifications_sent_total",
        "Push notifications by delivery status",
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

/// Helper: count a storage call by outcome
pub async fn track_db_operation<F, T>(operation: &str, future: F) -> Result<T, anyhow::Error>
where
    F: std::future::Future<Output = Result<T, anyhow::Error>>,
{
    let result = future.await;
    let status = if result.is_ok() { "success" } else { "error" };
    DB_OPERATIONS_TOTAL
        .with_label_values(&[operation, status])
        .inc();
    result
}

pub fn record_submission(outcome: &str) {
    FORM_SUBMISSIONS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_validation_failure(scope: &str) {
    VALIDATION_FAILURES_TOTAL.with_label_values(&[scope]).inc();
}

pub fn record_notifications(status: &str, count: u64) {
    NOTIFICATIONS_SENT_TOTAL
        .with_label_values(&[status])
        .inc_by(count);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_metrics_include_business_counters() {
        record_submission("accepted");
        record_validation_failure("form");
        FORMS_PUBLISHED_TOTAL.inc();

        let text = render_metrics().unwrap();
        assert!(text.contains("form_submissions_total"));
        assert!(text.contains("validation_failures_total"));
        assert!(text.contains("forms_published_total"));
    }

    #[tokio::test]
    async fn tracked_operations_pass_results_through() {
        let ok = track_db_operation("get_form", async { Ok::<_, anyhow::Error>(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err =
            track_db_operation("get_form", async { Err::<(), _>(anyhow::anyhow!("down")) }).await;
        assert!(err.is_err());
        assert!(
            DB_OPERATIONS_TOTAL
                .with_label_values(&["get_form", "error"])
                .get()
                >= 1
        );
    }
}
