//! Discord-compatible webhook delivery.

use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use crate::http::{truncate_chars, ApiClient, HttpError};
use crate::retry::RetryError;

/// Discord rejects messages longer than this many characters.
pub const MAX_CONTENT_CHARS: usize = 2000;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("webhook delivery failed: {0}")]
    Delivery(#[from] RetryError<HttpError>),
}

impl WebhookError {
    /// True when the webhook answered with a permanent rejection (bad URL, bad payload).
    pub fn is_rejected(&self) -> bool {
        match self {
            WebhookError::Delivery(e) => !e.is_exhausted(),
        }
    }
}

#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    content: &'a str,
}

/// Posts rendered forecasts to a chat webhook.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    api: ApiClient,
    url: String,
}

impl WebhookNotifier {
    pub fn new(api: ApiClient, url: impl Into<String>) -> Self {
        Self {
            api,
            url: url.into(),
        }
    }

    /// Send `text` as the message content, truncated to the platform limit.
    #[instrument(skip(self, text), level = "info")]
    pub async fn send(&self, text: &str) -> Result<(), WebhookError> {
        let content = fit_content(text);
        if content != text {
            tracing::warn!(
                "Forecast truncated to {} characters for webhook delivery",
                MAX_CONTENT_CHARS
            );
        }

        self.api
            .post_with_retry(&self.url, &WebhookMessage { content: &content })
            .await?;

        tracing::info!("Forecast delivered to webhook");
        Ok(())
    }
}

/// Shorten `text` to fit in one message, marking the cut with an ellipsis.
fn fit_content(text: &str) -> String {
    if text.chars().count() <= MAX_CONTENT_CHARS {
        return text.to_string();
    }
    let mut content = truncate_chars(text, MAX_CONTENT_CHARS - 1);
    content.push('…');
    content
}
