//! Centralized error types for zipcast.
//!
//! This module provides a typed error hierarchy that:
//! - Separates "where is this ZIP" failures from "what is the weather" failures
//! - Provides user-friendly messages suitable for the terminal
//! - Preserves full error context for debugging/logging

use thiserror::Error;

/// Top-level application error type.
///
/// Every failure the binary can report converts into this type.
/// Use `user_message()` to get an operator-facing summary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Location error: {0}")]
    Location(#[from] LocationError),

    #[error("Forecast error: {0}")]
    Forecast(#[from] ForecastError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Returns a short message that names the failing upstream.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Location(e) => e.user_message(),
            AppError::Forecast(e) => e.user_message(),
            AppError::Delivery(e) => e.user_message(),
            AppError::Config(e) => e.user_message(),
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }
}

/// Failures to turn a ZIP code into coordinates.
#[derive(Debug, Error)]
pub enum LocationError {
    #[error("No location found for ZIP {0}")]
    NotFound(String),

    #[error("ZIP {0} matched more than one location")]
    Ambiguous(String),

    #[error("Geocoding API key missing or rejected: {0}")]
    Credential(String),

    #[error("Geocoding service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl LocationError {
    pub fn user_message(&self) -> &'static str {
        match self {
            LocationError::NotFound(_) => {
                "Could not determine location: the ZIP code is unknown to the geocoder."
            }
            LocationError::Ambiguous(_) => {
                "Could not determine location: the ZIP code matched several places."
            }
            LocationError::Credential(_) => {
                "Could not determine location: check the geocoding API key."
            }
            LocationError::ServiceUnavailable(_) => {
                "Could not determine location: the geocoding service is unavailable."
            }
        }
    }
}

/// Failures to retrieve the forecast for known coordinates.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("Unexpected weather service response: {0}")]
    InvalidResponse(String),

    #[error("Weather service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl ForecastError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ForecastError::InvalidResponse(_) => {
                "Could not retrieve forecast: the weather service sent an unexpected response."
            }
            ForecastError::ServiceUnavailable(_) => {
                "Could not retrieve forecast: the weather service is unavailable."
            }
        }
    }
}

/// Failures to hand the rendered forecast to a webhook.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Webhook rejected the message: {0}")]
    Rejected(String),

    #[error("Webhook unreachable: {0}")]
    ServiceUnavailable(String),
}

impl DeliveryError {
    pub fn user_message(&self) -> &'static str {
        match self {
            DeliveryError::Rejected(_) => {
                "The forecast could not be posted: the webhook rejected it."
            }
            DeliveryError::ServiceUnavailable(_) => {
                "The forecast could not be posted: the webhook is unreachable."
            }
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),
}

impl ConfigError {
    /// Classify a failure from `Config::load_validated`.
    ///
    /// TOML syntax or type errors anywhere in the chain are `ParseError`;
    /// everything else (unreadable file, failed validation) is `Invalid`.
    pub fn from_load_failure(err: &anyhow::Error) -> Self {
        let detail = format!("{:#}", err);
        if err.chain().any(|cause| cause.is::<toml::de::Error>()) {
            ConfigError::ParseError(detail)
        } else {
            ConfigError::Invalid(detail)
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
        }
    }
}
