//! Maps service errors to zipcast_core::AppError for consistent user-facing messages.
//! Each service has its own module to keep mappings small and readable.

mod weather;
mod webhook;

pub use weather::from_pipeline;
pub use webhook::from_webhook;
