//! Request handlers.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use qualigate_core::{ErrorKind, ExecutionId, ValidationRequest};
use serde_json::{Value, json};
use tracing::{error, info, warn};

use crate::{AppState, error::ApiError, response::ValidationResponse};

/// Service name reported by the health endpoint.
pub const SERVICE_NAME: &str = "Qualigate Snowflake Validator";

const BASIC_VALIDATIONS: &str = "  - row_count > 0
  - missing_count(email) = 0
  - duplicate_count(customer_id) = 0
  - invalid_percent(phone) < 5%";

const ADVANCED_VALIDATIONS: &str = "  - row_count between 1000 and 10000
  - freshness(created_date) < 1d
  - avg(order_amount) > 100
  - stddev(price) < 50";

const CUSTOM_METRICS: &str = "  - conversion_rate >= 0.15:
      conversion_rate query: |
        SELECT COUNT(CASE WHEN status = 'completed' THEN 1 END) * 1.0 / COUNT(*)
        FROM sales_data
  - failed rows:
      fail query: |
        SELECT * FROM orders
        WHERE ship_date < order_date";

/// `GET /`
#[allow(clippy::unused_async)]
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `GET /validation-rules-examples`
#[allow(clippy::unused_async)]
pub async fn validation_rules_examples() -> Json<Value> {
    Json(json!({
        "basic_validations": BASIC_VALIDATIONS,
        "advanced_validations": ADVANCED_VALIDATIONS,
        "custom_metrics": CUSTOM_METRICS,
    }))
}

/// `POST /validate`
///
/// Runs the request on the shared executor and returns the report. Body
/// parse failures are answered with 422 in the common error envelope.
pub async fn validate(
    State(state): State<AppState>,
    payload: Result<Json<ValidationRequest>, JsonRejection>,
) -> Result<Json<ValidationResponse>, ApiError> {
    let Json(request) = payload?;
    let scan_id = ExecutionId::new();

    let report = state
        .executor
        .execute_with_id(scan_id, request)
        .await
        .map_err(|e| {
            if e.kind() == ErrorKind::ConfigurationError {
                warn!(execution_id = %scan_id, kind = %e.kind(), "Validation rejected: {}", e.message());
            } else {
                error!(execution_id = %scan_id, kind = %e.kind(), "Validation failed: {}", e.message());
            }
            ApiError::from(e)
        })?;

    info!(execution_id = %scan_id, status = %report.status, "Validation completed");
    let (quality_score, counts, duration) = (report.quality_score, report.counts, report.duration);
    tokio::spawn(async move {
        info!(
            execution_id = %scan_id,
            quality_score,
            passed = counts.passed,
            failed = counts.failed,
            warnings = counts.warned,
            duration_secs = duration.as_secs_f64(),
            "Validation summary"
        );
    });

    Ok(Json(ValidationResponse::from(report)))
}
