use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use validator::Validate;

use super::ApiError;
use crate::extractors::AppJson;
use crate::models::answer::SubmitFormRequest;
use crate::services::form_service::FormService;
use crate::services::AppState;

/// POST /api/v1/forms/{id}/submissions
///
/// Stores the answers and returns the graded result.
pub async fn submit_form(
    State(state): State<Arc<AppState>>,
    Path(form_id): Path<String>,
    AppJson(req): AppJson<SubmitFormRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()
        .map_err(|e| ApiError::bad_request(format!("Validation error: {}", e)))?;

    let result = FormService::new(&state).submit(&form_id, req).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// GET /api/v1/forms/{id}/submissions
pub async fn list_submissions(
    State(state): State<Arc<AppState>>,
    Path(form_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let submissions = FormService::new(&state).list_submissions(&form_id).await?;
    Ok(Json(submissions))
}

/// GET /api/v1/forms/{id}/submissions/{submission_id}/score
pub async fn score_submission(
    State(state): State<Arc<AppState>>,
    Path((form_id, submission_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    if submission_id.trim().is_empty() {
        return Err(ApiError::not_found("Submission id is required"));
    }
    let result = FormService::new(&state)
        .score_submission(&form_id, &submission_id)
        .await?;
    Ok(Json(result))
}
