#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use formcraft_api::{
    config::Config,
    create_router,
    services::notifier::{Notification, NotificationOutcome, Notifier},
    services::store::MemoryFormStore,
    services::AppState,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

/// Captures notifications instead of calling a gateway.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(Vec<String>, Notification)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        tokens: &[String],
        notification: &Notification,
    ) -> anyhow::Result<NotificationOutcome> {
        self.sent
            .lock()
            .unwrap()
            .push((tokens.to_vec(), notification.clone()));
        Ok(NotificationOutcome {
            sent: tokens.len(),
            message: format!("Notified {} devices", tokens.len()),
        })
    }
}

pub async fn create_test_app() -> Router {
    create_test_app_with_tokens(&[]).0
}

pub fn create_test_app_with_tokens(tokens: &[&str]) -> (Router, Arc<RecordingNotifier>) {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let store = Arc::new(MemoryFormStore::with_tokens(tokens.iter().copied()));
    let notifier = Arc::new(RecordingNotifier::default());
    let app_state = Arc::new(AppState::with_backends(
        Config::in_memory(),
        store,
        notifier.clone(),
    ));

    (create_router(app_state), notifier)
}

pub async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_string(&value).unwrap())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| json!(String::from_utf8_lossy(&bytes)))
    };
    (status, json)
}

/// Two-page quiz: a required name, a graded radio, a boolean and a checkbox.
pub fn quiz_form() -> Value {
    json!({
        "createdBy": "admin-1",
        "formConfig": {
            "formTitle": "Team survey",
            "pages": [
                {
                    "id": "page-1",
                    "title": "About you",
                    "description": "",
                    "fields": [
                        {"id": "name", "type": "text", "label": "Name", "required": true,
                         "hasCorrectAnswer": false},
                        {"id": "color", "type": "radio", "label": "Favourite colour",
                         "options": ["Red", "Blue", "Green"], "required": false,
                         "hasCorrectAnswer": true, "correctAnswer": "Red"}
                    ]
                },
                {
                    "id": "page-2",
                    "title": "Preferences",
                    "fields": [
                        {"id": "remote", "type": "boolean", "label": "Remote?",
                         "options": ["Yes", "No"], "required": true, "hasCorrectAnswer": false},
                        {"id": "langs", "type": "checkbox", "label": "Languages",
                         "options": ["Rust", "Go", "Python"], "required": false,
                         "hasCorrectAnswer": true, "correctAnswer": "Rust, Go"}
                    ]
                }
            ]
        }
    })
}

pub async fn create_form(app: &Router, body: Value) -> String {
    let (status, json) = send(app, "POST", "/api/v1/forms", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {}", json);
    json["_id"].as_str().unwrap().to_string()
}

pub async fn create_published_form(app: &Router) -> String {
    let form_id = create_form(app, quiz_form()).await;
    let (status, json) = send(
        app,
        "POST",
        &format!("/api/v1/forms/{}/publish", form_id),
        Some(json!({ "notify": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "publish failed: {}", json);
    form_id
}
