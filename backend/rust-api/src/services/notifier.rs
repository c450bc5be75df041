use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::utils::retry::{retry_async_with_config, RetryConfig};

/// Announcement sent to subscribed users when a form is published.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub form_id: String,
}

impl Notification {
    pub fn form_published(form_id: &str, form_title: &str, message: Option<&str>) -> Self {
        let body = match message.map(str::trim).filter(|m| !m.is_empty()) {
            Some(custom) => custom.to_string(),
            None => format!("A new form \"{}\" is available. Tap to fill it in.", form_title),
        };
        Self {
            title: "New form published".to_string(),
            body,
            form_id: form_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationOutcome {
    pub sent: usize,
    #[serde(default)]
    pub message: String,
}

impl NotificationOutcome {
    pub fn nobody() -> Self {
        Self {
            sent: 0,
            message: "No users have enabled notifications".to_string(),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, tokens: &[String], notification: &Notification)
        -> Result<NotificationOutcome>;
}

#[derive(Serialize)]
struct GatewayPayload<'a> {
    tokens: &'a [String],
    title: &'a str,
    body: &'a str,
    #[serde(rename = "formId")]
    form_id: &'a str,
}

#[derive(Deserialize)]
struct GatewayResponse {
    sent: Option<usize>,
    #[serde(rename = "successCount")]
    success_count: Option<usize>,
    message: Option<String>,
}

/// Forwards notifications to the push gateway's `/api/notify` endpoint.
pub struct PushGatewayNotifier {
    client: Client,
    notify_url: String,
    retry: RetryConfig,
}

impl PushGatewayNotifier {
    pub fn new(notify_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            notify_url: notify_url.into(),
            retry: RetryConfig::notification(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn post_once(&self, payload: &GatewayPayload<'_>) -> Result<NotificationOutcome> {
        let response = self
            .client
            .post(&self.notify_url)
            .json(payload)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .context("Failed to call push gateway")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!("Push gateway returned error {}: {}", status, error_text));
        }

        let body: Option<GatewayResponse> = response.json().await.ok();
        let sent = body
            .as_ref()
            .and_then(|b| b.sent.or(b.success_count))
            .unwrap_or(payload.tokens.len());
        let message = body
            .and_then(|b| b.message)
            .unwrap_or_else(|| format!("Notified {} devices", sent));

        Ok(NotificationOutcome { sent, message })
    }
}

#[async_trait]
impl Notifier for PushGatewayNotifier {
    async fn notify(
        &self,
        tokens: &[String],
        notification: &Notification,
    ) -> Result<NotificationOutcome> {
        if tokens.is_empty() {
            return Ok(NotificationOutcome::nobody());
        }

        let payload = GatewayPayload {
            tokens,
            title: &notification.title,
            body: &notification.body,
            form_id: &notification.form_id,
        };

        tracing::info!(
            "Sending publish notification for form {} to {} devices",
            notification.form_id,
            tokens.len()
        );

        retry_async_with_config(self.retry.clone(), || self.post_once(&payload)).await
    }
}

/// Used when no gateway is configured; reports nothing sent.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(
        &self,
        tokens: &[String],
        notification: &Notification,
    ) -> Result<NotificationOutcome> {
        tracing::debug!(
            "Push gateway not configured, skipping notification for form {} ({} tokens)",
            notification.form_id,
            tokens.len()
        );
        Ok(NotificationOutcome {
            sent: 0,
            message: "Notifications are disabled".to_string(),
        })
    }
}
