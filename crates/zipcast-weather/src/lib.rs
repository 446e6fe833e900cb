//! ZIP code forecasts from api.weather.gov
//!
//! Resolves a ZIP code to coordinates (file cache, then Zippopotam.us or
//! Google), fetches the gridpoint forecast, and classifies each period.

pub mod assemble;
pub mod cache;
pub mod classify;
pub mod geocode;
pub mod pipeline;
pub mod provider;
pub mod resolver;
pub mod types;

pub use assemble::assemble;
pub use cache::{CacheError, GeocodeCache};
pub use classify::classify;
pub use geocode::{GeocodeError, GeocodeProvider, GoogleProvider, ZippopotamProvider};
pub use pipeline::{ForecastPipeline, PipelineError};
pub use provider::{ForecastError, PointMetadata, WeatherProvider};
pub use resolver::GeocodeResolver;
pub use types::*;
