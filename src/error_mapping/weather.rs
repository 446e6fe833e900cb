use zipcast_core::{AppError, ForecastError, LocationError};
use zipcast_weather::{ForecastError as NwsError, GeocodeError, PipelineError};

pub fn from_pipeline(e: PipelineError) -> AppError {
    match e {
        PipelineError::GeocodeUnavailable { source, .. } => AppError::Location(location(source)),
        PipelineError::ForecastUnavailable(e) => AppError::Forecast(forecast(e)),
    }
}

fn location(e: GeocodeError) -> LocationError {
    match e {
        GeocodeError::NotFound(zip) => LocationError::NotFound(zip.to_string()),
        GeocodeError::Ambiguous { zip, .. } => LocationError::Ambiguous(zip.to_string()),
        GeocodeError::MissingCredential | GeocodeError::CredentialRejected(_) => {
            LocationError::Credential(e.to_string())
        }
        GeocodeError::InvalidCoordinates(_) | GeocodeError::Endpoint(_) | GeocodeError::Provider(_) => {
            LocationError::ServiceUnavailable(e.to_string())
        }
    }
}

fn forecast(e: NwsError) -> ForecastError {
    if e.is_malformed() {
        ForecastError::InvalidResponse(e.to_string())
    } else {
        ForecastError::ServiceUnavailable(e.to_string())
    }
}
