//! JSON-over-HTTP client shared by every upstream.
//!
//! One `ApiClient` carries the reqwest client (timeout, User-Agent) and the
//! retry policy, so each call site gets the same backoff behavior.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::retry::{is_retryable_status, with_retry, RetryConfig, RetryDecision, RetryError, Retryable};

/// Longest slice of an error body kept for diagnostics.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Failure of a single HTTP attempt.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// The body arrived but is not what the endpoint promises
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The upstream reported a temporary condition inside a successful response
    #[error("upstream temporarily unavailable: {0}")]
    Unavailable(String),

    /// The upstream answered and said no; retrying will not change that
    #[error("rejected by upstream: {0}")]
    Rejected(String),
}

impl HttpError {
    /// HTTP status of the failure, if the server answered
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            HttpError::Transport(e) => e.status(),
            _ => None,
        }
    }
}

impl Retryable for HttpError {
    fn retry_decision(&self) -> RetryDecision {
        match self {
            HttpError::Transport(e) => e.retry_decision(),
            HttpError::Status { status, .. } => is_retryable_status(*status),
            HttpError::Malformed(_) | HttpError::Unavailable(_) => RetryDecision::Retry,
            HttpError::Rejected(_) => RetryDecision::NoRetry,
        }
    }
}

/// A failed POST attempt, classified for non-idempotent requests
#[derive(Debug)]
struct PostFailure(HttpError);

impl fmt::Display for PostFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Retryable for PostFailure {
    fn retry_decision(&self) -> RetryDecision {
        match &self.0 {
            HttpError::Transport(e) if e.is_connect() => RetryDecision::Retry,
            HttpError::Transport(e) => match e.status() {
                Some(status) => is_retryable_status(status),
                None => RetryDecision::NoRetry,
            },
            other => other.retry_decision(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Arc<Client>,
    retry: RetryConfig,
}

impl ApiClient {
    /// Build a client with the given User-Agent, per-request timeout and retry policy.
    pub fn new(user_agent: &str, timeout: Duration, retry: RetryConfig) -> Result<Self, HttpError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client: Arc::new(client),
            retry,
        })
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// One GET attempt, decoded as JSON.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, HttpError> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/geo+json, application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HttpError::Status {
                status,
                body: truncate_chars(&body, MAX_ERROR_BODY_CHARS),
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| HttpError::Malformed(e.to_string()))
    }

    /// GET under the retry policy, then `extract` the part the caller needs.
    ///
    /// `extract` runs inside each attempt, so a payload missing a required
    /// field is retried like any other malformed response.
    pub async fn get_with_retry<T, U, F>(&self, url: &str, extract: F) -> Result<U, RetryError<HttpError>>
    where
        T: DeserializeOwned,
        F: Fn(T) -> Result<U, HttpError>,
    {
        let extract = &extract;
        with_retry(&self.retry, move || async move {
            let body: T = self.get_json(url).await?;
            extract(body)
        })
        .await
    }

    /// One POST attempt with a JSON body; the response body is ignored.
    pub async fn post_json<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<(), HttpError> {
        let response = self.client.post(url).json(body).send().await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let text = response.text().await.unwrap_or_default();
            Err(HttpError::Status {
                status,
                body: truncate_chars(&text, MAX_ERROR_BODY_CHARS),
            })
        }
    }

    /// POST under the retry policy.
    ///
    /// POSTs are not idempotent, so a request that may have reached the
    /// server (timeout, broken body) is not sent again. Connect failures and
    /// retryable statuses still are.
    pub async fn post_with_retry<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<(), RetryError<HttpError>> {
        with_retry(&self.retry, move || async move {
            self.post_json(url, body).await.map_err(PostFailure)
        })
        .await
        .map_err(|e| e.map(|PostFailure(inner)| inner))
    }
}

/// Keep at most `max` characters, never splitting a UTF-8 sequence.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
