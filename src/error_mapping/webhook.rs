use zipcast_core::{AppError, DeliveryError};
use zipcast_services::WebhookError;

pub fn from_webhook(e: WebhookError) -> AppError {
    let detail = e.to_string();
    if e.is_rejected() {
        AppError::Delivery(DeliveryError::Rejected(detail))
    } else {
        AppError::Delivery(DeliveryError::ServiceUnavailable(detail))
    }
}
