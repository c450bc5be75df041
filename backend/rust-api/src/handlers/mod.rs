use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::metrics;
use crate::services::form_service::FormError;
use crate::services::validation::ValidationReport;
use crate::services::AppState;

pub mod forms;
pub mod submissions;

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut dependencies = serde_json::Map::new();

    let storage = match tokio::time::timeout(
        std::time::Duration::from_secs(1),
        state.store.ping(),
    )
    .await
    {
        Ok(Ok(())) => json!({ "status": "healthy" }),
        Ok(Err(e)) => json!({ "status": "unhealthy", "error": format!("{}", e) }),
        Err(_) => json!({ "status": "unhealthy", "error": "Storage timeout after 1s" }),
    };
    let healthy = storage.get("status").and_then(|v| v.as_str()) == Some("healthy");
    dependencies.insert(
        state.config.storage_backend.as_str().to_string(),
        storage,
    );

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(json!({
            "status": if healthy { "healthy" } else { "degraded" },
            "service": "formcraft-api",
            "version": env!("CARGO_PKG_VERSION"),
            "dependencies": dependencies
        })),
    )
}

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render metrics: {}", e),
        ),
    }
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Unprocessable(String, ValidationReport),
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<FormError> for ApiError {
    fn from(err: FormError) -> Self {
        let message = err.to_string();
        match err {
            FormError::NotFound(_) | FormError::SubmissionNotFound(_) | FormError::PageOutOfRange(_) => {
                ApiError::NotFound(message)
            }
            FormError::Schema(_) => ApiError::BadRequest(message),
            FormError::Frozen
            | FormError::Modified
            | FormError::NotPublished
            | FormError::AlreadySubmitted(_) => {
                ApiError::Conflict(message)
            }
            FormError::Invalid(report) => ApiError::Unprocessable(message, report),
            FormError::Storage(e) => {
                tracing::error!("Storage failure: {:?}", e);
                ApiError::Internal(message)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, mut body) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, json!({ "message": message })),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, json!({ "message": message })),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, json!({ "message": message })),
            ApiError::Unprocessable(message, report) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "message": message,
                    "errors": report.errors,
                    "pages": report.pages,
                    "firstInvalidPage": report.first_invalid_page,
                }),
            ),
            ApiError::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "message": message }),
            ),
        };

        if let Some(map) = body.as_object_mut() {
            map.insert("status".to_string(), json!(status.as_u16()));
        }
        (status, Json(body)).into_response()
    }
}
