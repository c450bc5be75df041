use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use super::ApiError;
use crate::extractors::AppJson;
use crate::models::answer::ValidateAnswersRequest;
use crate::models::form::{CreateFormRequest, ListFormsQuery, PublishRequest, UpdateFormRequest};
use crate::services::form_service::FormService;
use crate::services::AppState;

/// POST /api/v1/forms
pub async fn create_form(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<CreateFormRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::bad_request(format!("Validation error: {}", e)))?;

    let form = FormService::new(&state).create_form(req).await?;
    Ok((StatusCode::CREATED, Json(form)))
}

/// GET /api/v1/forms?published=true&userId=...
pub async fn list_forms(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListFormsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let forms = FormService::new(&state).list_forms(&query).await?;
    Ok(Json(forms))
}

/// GET /api/v1/forms/{id}
pub async fn get_form(
    State(state): State<Arc<AppState>>,
    Path(form_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let form = FormService::new(&state).get_form(&form_id).await?;
    Ok(Json(form))
}

/// PUT /api/v1/forms/{id}
pub async fn update_form(
    State(state): State<Arc<AppState>>,
    Path(form_id): Path<String>,
    AppJson(req): AppJson<UpdateFormRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let form = FormService::new(&state)
        .update_form(&form_id, &req.form_config)
        .await?;
    Ok(Json(form))
}

/// POST /api/v1/forms/{id}/publish
///
/// The body is optional; an empty body publishes and notifies with the
/// default announcement.
pub async fn publish_form(
    State(state): State<Arc<AppState>>,
    Path(form_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let req: PublishRequest = if body.iter().all(u8::is_ascii_whitespace) {
        PublishRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            ApiError::bad_request(format!("Failed to parse JSON request body: {}", e))
        })?
    };
    req.validate()
        .map_err(|e| ApiError::bad_request(format!("Validation error: {}", e)))?;

    let outcome = FormService::new(&state).publish(&form_id, &req).await?;
    Ok(Json(outcome))
}

/// POST /api/v1/forms/{id}/unpublish
pub async fn unpublish_form(
    State(state): State<Arc<AppState>>,
    Path(form_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let form = FormService::new(&state).unpublish(&form_id).await?;
    Ok(Json(form))
}

/// POST /api/v1/forms/{id}/pages/{page}/validate
pub async fn validate_page(
    State(state): State<Arc<AppState>>,
    Path((form_id, page_index)): Path<(String, usize)>,
    AppJson(req): AppJson<ValidateAnswersRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let errors = FormService::new(&state)
        .validate_page(&form_id, page_index, &req.answers)
        .await?;
    Ok(Json(json!({
        "valid": errors.is_valid(),
        "page": page_index,
        "errors": errors,
    })))
}

/// POST /api/v1/forms/{id}/validate
pub async fn validate_form(
    State(state): State<Arc<AppState>>,
    Path(form_id): Path<String>,
    AppJson(req): AppJson<ValidateAnswersRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let report = FormService::new(&state)
        .validate_answers(&form_id, &req.answers)
        .await?;
    Ok(Json(report))
}

/// GET /api/v1/forms/{id}/analytics
pub async fn get_analytics(
    State(state): State<Arc<AppState>>,
    Path(form_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let report = FormService::new(&state).analytics(&form_id).await?;
    Ok(Json(report))
}
