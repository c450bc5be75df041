use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::metrics::{self, track_db_operation, FORMS_PUBLISHED_TOTAL};
use crate::models::analytics::AnalyticsReport;
use crate::models::answer::{AnswerSet, SubmitFormRequest, Submission};
use crate::models::form::{
    CreateFormRequest, FormDocument, FormSchema, FormSummary, ListFormsQuery, PublishRequest,
    SchemaError,
};
use crate::models::scoring::{ScoreBand, SubmissionResultResponse};
use crate::services::notifier::{Notification, NotificationOutcome, Notifier};
use crate::services::store::FormStore;
use crate::services::validation::{self, ValidationReport, ValidationResult};
use crate::services::{analytics, scoring, AppState};

#[derive(Debug, Error)]
pub enum FormError {
    #[error("Form {0} not found")]
    NotFound(String),
    #[error("Submission {0} not found")]
    SubmissionNotFound(String),
    #[error("Page {0} does not exist")]
    PageOutOfRange(usize),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("Form already has submissions and can no longer be edited")]
    Frozen,
    #[error("Form was published or unpublished while being edited, reload and try again")]
    Modified,
    #[error("Form is not published")]
    NotPublished,
    #[error("User {0} has already submitted this form")]
    AlreadySubmitted(String),
    #[error("Please fill in all required fields")]
    Invalid(ValidationReport),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type FormResult<T> = Result<T, FormError>;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishOutcome {
    pub form: FormDocument,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<NotificationOutcome>,
    /// Set when the gateway call failed; the form stays published.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_error: Option<String>,
}

/// Form lifecycle: authoring, publication, submission and reporting.
pub struct FormService {
    store: Arc<dyn FormStore>,
    notifier: Arc<dyn Notifier>,
}

impl FormService {
    pub fn new(state: &AppState) -> Self {
        Self::with_backends(state.store.clone(), state.notifier.clone())
    }

    pub fn with_backends(store: Arc<dyn FormStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    async fn load_form(&self, form_id: &str) -> FormResult<FormDocument> {
        track_db_operation("get_form", self.store.get_form(form_id))
            .await?
            .ok_or_else(|| FormError::NotFound(form_id.to_string()))
    }

    pub async fn create_form(&self, req: CreateFormRequest) -> FormResult<FormDocument> {
        let schema = FormSchema::import(&req.form_config)?;
        let form = FormDocument::new(schema, req.created_by);

        track_db_operation("insert_form", self.store.insert_form(&form)).await?;
        tracing::info!(
            "Created form {} ({:?}) with {} pages",
            form.id,
            form.form_config.form_title,
            form.form_config.pages.len()
        );
        Ok(form)
    }

    pub async fn get_form(&self, form_id: &str) -> FormResult<FormDocument> {
        self.load_form(form_id).await
    }

    pub async fn list_forms(&self, query: &ListFormsQuery) -> FormResult<Vec<FormSummary>> {
        let forms = track_db_operation("list_forms", self.store.list_forms(query.published)).await?;
        Ok(forms
            .iter()
            .map(|doc| FormSummary::from_doc(doc, query.user_id.as_deref()))
            .collect())
    }

    /// Replaces the schema of a form nobody has answered yet. The write only
    /// lands if no submission or publication change happened since the form
    /// was loaded.
    pub async fn update_form(
        &self,
        form_id: &str,
        form_config: &serde_json::Value,
    ) -> FormResult<FormDocument> {
        let schema = FormSchema::import(form_config)?;
        let form = self.load_form(form_id).await?;

        let stored =
            track_db_operation("count_submissions", self.store.count_submissions(form_id)).await?;
        if form.has_submissions() || stored > 0 {
            tracing::warn!("Rejected edit of form {} with {} submissions", form_id, stored);
            return Err(FormError::Frozen);
        }
        if form.published {
            schema.check_publishable()?;
        }

        let updated = track_db_operation(
            "replace_schema",
            self.store
                .replace_schema(form_id, &schema, form.published, Utc::now()),
        )
        .await?;
        let Some(updated) = updated else {
            let current = self.load_form(form_id).await?;
            if current.has_submissions() {
                tracing::warn!("Form {} received a submission during edit", form_id);
                return Err(FormError::Frozen);
            }
            return Err(FormError::Modified);
        };

        tracing::info!("Updated form {}", form_id);
        Ok(updated)
    }

    /// Publishes a form and announces it. A failed announcement is reported
    /// back but leaves the form published. Publishing an already published
    /// form changes nothing and sends nothing.
    pub async fn publish(&self, form_id: &str, req: &PublishRequest) -> FormResult<PublishOutcome> {
        let form = self.load_form(form_id).await?;
        if form.published {
            return Ok(PublishOutcome {
                form,
                notification: None,
                notification_error: None,
            });
        }
        form.form_config.check_publishable()?;

        let form = track_db_operation(
            "set_published",
            self.store.set_published(form_id, true, Utc::now()),
        )
        .await?
        .ok_or_else(|| FormError::NotFound(form_id.to_string()))?;
        FORMS_PUBLISHED_TOTAL.inc();
        tracing::info!("Published form {}", form_id);

        if !req.notify {
            return Ok(PublishOutcome {
                form,
                notification: None,
                notification_error: None,
            });
        }

        let notification = Notification::form_published(
            &form.id,
            &form.form_config.form_title,
            req.message.as_deref(),
        );
        let (notification, notification_error) = match self.announce(&notification).await {
            Ok(outcome) => (Some(outcome), None),
            Err(e) => {
                tracing::error!("Failed to send notifications for form {}: {:?}", form_id, e);
                metrics::record_notifications("failed", 1);
                (None, Some(format!("Failed to send notifications: {}", e)))
            }
        };

        Ok(PublishOutcome {
            form,
            notification,
            notification_error,
        })
    }

    async fn announce(&self, notification: &Notification) -> anyhow::Result<NotificationOutcome> {
        let tokens =
            track_db_operation("notification_tokens", self.store.notification_tokens()).await?;
        tracing::info!("Found {} user tokens", tokens.len());

        if tokens.is_empty() {
            metrics::record_notifications("skipped", 1);
            return Ok(NotificationOutcome::nobody());
        }

        let outcome = self.notifier.notify(&tokens, notification).await?;
        metrics::record_notifications("sent", outcome.sent as u64);
        Ok(outcome)
    }

    pub async fn unpublish(&self, form_id: &str) -> FormResult<FormDocument> {
        let form = track_db_operation(
            "set_published",
            self.store.set_published(form_id, false, Utc::now()),
        )
        .await?
        .ok_or_else(|| FormError::NotFound(form_id.to_string()))?;
        tracing::info!("Unpublished form {}", form_id);
        Ok(form)
    }

    /// Required-field check for one page, as run before advancing.
    pub async fn validate_page(
        &self,
        form_id: &str,
        page_index: usize,
        answers: &AnswerSet,
    ) -> FormResult<ValidationResult> {
        let form = self.load_form(form_id).await?;
        let page = form
            .form_config
            .pages
            .get(page_index)
            .ok_or(FormError::PageOutOfRange(page_index))?;

        let result = validation::validate_page(page, answers);
        if !result.is_valid() {
            metrics::record_validation_failure("page");
        }
        Ok(result)
    }

    pub async fn validate_answers(
        &self,
        form_id: &str,
        answers: &AnswerSet,
    ) -> FormResult<ValidationReport> {
        let form = self.load_form(form_id).await?;
        let report = ValidationReport::for_answers(&form.form_config, answers);
        if !report.valid {
            metrics::record_validation_failure("form");
        }
        Ok(report)
    }

    /// Validates, stores and grades a response. Each user may answer a form
    /// once.
    pub async fn submit(
        &self,
        form_id: &str,
        req: SubmitFormRequest,
    ) -> FormResult<SubmissionResultResponse> {
        let form = self.load_form(form_id).await?;
        if !form.published {
            metrics::record_submission("closed");
            return Err(FormError::NotPublished);
        }
        let submitter = req.submitter();
        if form.has_submitted(&submitter.user_id) {
            metrics::record_submission("duplicate");
            return Err(FormError::AlreadySubmitted(submitter.user_id));
        }

        let report = ValidationReport::for_answers(&form.form_config, &req.answers);
        if !report.valid {
            tracing::info!(
                "Submission to form {} by {} failed validation: {} fields",
                form_id,
                submitter.user_id,
                report.errors.len()
            );
            metrics::record_validation_failure("form");
            metrics::record_submission("invalid");
            return Err(FormError::Invalid(report));
        }

        let claimed = track_db_operation(
            "record_submitter",
            self.store.record_submitter(form_id, &submitter.user_id),
        )
        .await?;
        if !claimed {
            metrics::record_submission("duplicate");
            return Err(FormError::AlreadySubmitted(submitter.user_id));
        }

        let submission = Submission {
            id: Uuid::new_v4().to_string(),
            form_id: form_id.to_string(),
            form_title: form.form_config.form_title.clone(),
            answers: req.answers,
            submitted_at: Utc::now(),
            submitter,
        };
        if let Err(e) =
            track_db_operation("insert_submission", self.store.insert_submission(&submission)).await
        {
            tracing::error!("Failed to store submission for form {}: {:?}", form_id, e);
            if let Err(release) = self
                .store
                .release_submitter(form_id, &submission.submitter.user_id)
                .await
            {
                tracing::error!("Failed to release submitter claim: {:?}", release);
            }
            return Err(e.into());
        }

        let result = scoring::score(&form.form_config, &submission.answers);
        metrics::record_submission("accepted");
        tracing::info!(
            "Stored submission {} for form {} by {}: {}/{} correct",
            submission.id,
            form_id,
            submission.submitter.user_id,
            result.correct_count,
            result.total_questions
        );

        Ok(SubmissionResultResponse {
            submission_id: submission.id,
            form_id: form_id.to_string(),
            band: ScoreBand::for_percent(result.score_percent),
            result,
        })
    }

    pub async fn list_submissions(&self, form_id: &str) -> FormResult<Vec<Submission>> {
        self.load_form(form_id).await?;
        Ok(track_db_operation("list_submissions", self.store.list_submissions(form_id)).await?)
    }

    /// Grades a stored submission against the form's current answers.
    pub async fn score_submission(
        &self,
        form_id: &str,
        submission_id: &str,
    ) -> FormResult<SubmissionResultResponse> {
        let form = self.load_form(form_id).await?;
        let submission = track_db_operation(
            "get_submission",
            self.store.get_submission(form_id, submission_id),
        )
        .await?
        .ok_or_else(|| FormError::SubmissionNotFound(submission_id.to_string()))?;

        let result = scoring::score(&form.form_config, &submission.answers);
        Ok(SubmissionResultResponse {
            submission_id: submission.id,
            form_id: form.id,
            band: ScoreBand::for_percent(result.score_percent),
            result,
        })
    }

    pub async fn analytics(&self, form_id: &str) -> FormResult<AnalyticsReport> {
        let form = self.load_form(form_id).await?;
        let submissions =
            track_db_operation("list_submissions", self.store.list_submissions(form_id)).await?;
        let answer_sets: Vec<&AnswerSet> = submissions.iter().map(|s| &s.answers).collect();
        Ok(analytics::build_report(&form.id, &form.form_config, &answer_sets))
    }
}
