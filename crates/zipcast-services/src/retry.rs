//! Retry utilities for upstream calls with exponential backoff.
//!
//! This module provides retry logic for transient failures:
//! - Timeouts
//! - 5xx server errors and 429/408
//! - Connection resets
//! - Bodies that fail to decode
//!
//! It does NOT retry:
//! - 4xx client errors (bad requests, not found, etc.)
//! - Authentication failures (401, 403)
//! - Anything the caller classifies as a permanent rejection

use std::fmt;
use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;

/// Default retry configuration
pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 300;
pub const DEFAULT_MAX_DELAY_MS: u64 = 5000;

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay between retries (doubles each attempt)
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with custom settings
    pub fn new(max_retries: u32, initial_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::from_millis(initial_delay_ms),
            max_delay: Duration::from_millis(max_delay_ms),
        }
    }

    /// Total number of attempts, the first one included
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Calculate the delay for a given attempt number
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        // Exponential backoff: initial_delay * 2^attempt
        let factor = 2u64.saturating_pow(attempt);
        let delay_ms = (self.initial_delay.as_millis() as u64).saturating_mul(factor);
        let capped = delay_ms.min(self.max_delay.as_millis() as u64);
        Duration::from_millis(capped)
    }
}

/// Error classification for retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Should retry the request
    Retry,
    /// Should not retry - permanent failure
    NoRetry,
}

/// Errors that know whether another attempt could succeed.
pub trait Retryable {
    fn retry_decision(&self) -> RetryDecision;
}

impl Retryable for reqwest::Error {
    fn retry_decision(&self) -> RetryDecision {
        is_retryable_error(self)
    }
}

/// Outcome of an operation that did not succeed under the retry policy.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every attempt failed transiently; carries the last cause
    Exhausted { attempts: u32, last: E },
    /// The operation failed in a way retrying cannot fix
    Permanent(E),
}

impl<E> RetryError<E> {
    /// The underlying cause, whichever way the policy gave up
    pub fn cause(&self) -> &E {
        match self {
            RetryError::Exhausted { last, .. } => last,
            RetryError::Permanent(e) => e,
        }
    }

    pub fn into_cause(self) -> E {
        match self {
            RetryError::Exhausted { last, .. } => last,
            RetryError::Permanent(e) => e,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }

    /// Convert the cause, keeping how the policy gave up
    pub fn map<F>(self, f: impl FnOnce(E) -> F) -> RetryError<F> {
        match self {
            RetryError::Exhausted { attempts, last } => RetryError::Exhausted {
                attempts,
                last: f(last),
            },
            RetryError::Permanent(e) => RetryError::Permanent(f(e)),
        }
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Exhausted { attempts, last } => {
                write!(f, "gave up after {} attempts: {}", attempts, last)
            }
            RetryError::Permanent(e) => write!(f, "{}", e),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for RetryError<E> {}

/// Check if a reqwest error is retryable
pub fn is_retryable_error(error: &reqwest::Error) -> RetryDecision {
    // Timeout errors are retryable
    if error.is_timeout() {
        tracing::debug!("Request timed out, will retry");
        return RetryDecision::Retry;
    }

    // Connection errors (reset, refused) are retryable
    if error.is_connect() {
        tracing::debug!("Connection error, will retry");
        return RetryDecision::Retry;
    }

    // Truncated or garbled bodies usually come from a struggling upstream
    if error.is_decode() || error.is_body() {
        tracing::debug!("Response body error, will retry");
        return RetryDecision::Retry;
    }

    // Request errors (body issues) are not retryable
    if error.is_request() {
        tracing::debug!("Request error, not retryable");
        return RetryDecision::NoRetry;
    }

    // Status code errors need further inspection
    if let Some(status) = error.status() {
        return is_retryable_status(status);
    }

    // Default: don't retry unknown errors
    RetryDecision::NoRetry
}

/// Check if a status code is retryable
pub fn is_retryable_status(status: StatusCode) -> RetryDecision {
    // 5xx server errors are retryable
    if status.is_server_error() {
        tracing::debug!("Server error ({}), will retry", status);
        return RetryDecision::Retry;
    }

    // 429 Too Many Requests - should retry with backoff
    if status == StatusCode::TOO_MANY_REQUESTS {
        tracing::debug!("Rate limited (429), will retry");
        return RetryDecision::Retry;
    }

    // 408 Request Timeout - retryable
    if status == StatusCode::REQUEST_TIMEOUT {
        tracing::debug!("Request timeout (408), will retry");
        return RetryDecision::Retry;
    }

    // 4xx client errors are NOT retryable (including 401, 403)
    if status.is_client_error() {
        tracing::debug!("Client error ({}), not retryable", status);
        return RetryDecision::NoRetry;
    }

    // Default: don't retry
    RetryDecision::NoRetry
}

/// Run an operation under the retry policy.
///
/// # Arguments
/// * `config` - Retry configuration
/// * `operation` - Closure producing one attempt
///
/// # Returns
/// The first successful value, `Permanent` for a non-retryable failure, or
/// `Exhausted` with the last cause once `config.max_attempts()` attempts failed
///
/// # Example
/// ```ignore
/// let body = with_retry(&RetryConfig::default(), || async move {
///     api.get_json::<Body>(url).await
/// })
/// .await?;
/// ```
pub async fn with_retry<T, E, F, Fut>(config: &RetryConfig, mut operation: F) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + fmt::Display,
{
    let max_attempts = config.max_attempts();
    let mut attempt: u32 = 0;

    loop {
        if attempt > 0 {
            let delay = config.delay_for_attempt(attempt - 1);
            tracing::info!(
                "Retry attempt {} of {}, waiting {:?}",
                attempt,
                config.max_retries,
                delay
            );
            tokio::time::sleep(delay).await;
        }

        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!("Request succeeded after {} retries", attempt);
                }
                return Ok(value);
            }
            Err(e) => {
                if e.retry_decision() == RetryDecision::NoRetry {
                    tracing::debug!("Non-retryable error: {}", e);
                    return Err(RetryError::Permanent(e));
                }

                attempt += 1;
                if attempt >= max_attempts {
                    tracing::error!("All {} attempts exhausted: {}", max_attempts, e);
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: e,
                    });
                }

                tracing::warn!(
                    "Retryable error on attempt {} of {}: {}",
                    attempt,
                    max_attempts,
                    e
                );
            }
        }
    }
}
