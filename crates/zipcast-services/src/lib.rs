pub mod http;
pub mod retry;
pub mod webhook;

pub use http::{ApiClient, HttpError};
pub use retry::{with_retry, RetryConfig, RetryDecision, RetryError, Retryable};
pub use webhook::{WebhookError, WebhookNotifier};
