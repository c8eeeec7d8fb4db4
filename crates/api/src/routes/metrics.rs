//! Prometheus recorder setup and the metrics endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

/// Deduction latency buckets in seconds, sized for single-row updates.
const DEDUCTION_BUCKETS: &[f64] = &[0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 1.0];

/// Installs the global Prometheus recorder and registers metric descriptions.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("stock_deduction_duration_seconds".to_string()),
            DEDUCTION_BUCKETS,
        )?
        .install_recorder()?;

    metrics::describe_counter!("stock_deductions_total", "Successful stock deductions");
    metrics::describe_counter!(
        "stock_deductions_failed",
        "Rejected or failed stock deductions by reason"
    );
    metrics::describe_counter!("products_created_total", "Products registered");
    metrics::describe_counter!("order_events_consumed", "Order events fetched from the stream");
    metrics::describe_counter!("order_events_malformed", "Order events that failed to decode");
    metrics::describe_counter!("order_events_failed", "Order events stopped by a failing item");
    metrics::describe_counter!(
        "order_events_duplicate_items",
        "Line items skipped because they were already applied"
    );
    metrics::describe_counter!("compensation_notices_published", "Compensation notices sent");
    metrics::describe_counter!(
        "compensation_publish_failures",
        "Compensation notices that could not be published"
    );
    metrics::describe_histogram!(
        "stock_deduction_duration_seconds",
        metrics::Unit::Seconds,
        "Latency of ledger stock deductions"
    );

    Ok(handle)
}

/// GET /metrics: returns Prometheus-formatted metrics.
pub async fn get(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        handle.render(),
    )
}
