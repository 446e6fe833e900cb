use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::classify::classify;

/// A validated 5-digit US ZIP code
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ZipCode(String);

impl ZipCode {
    pub fn parse(input: &str) -> Result<Self, ZipCodeError> {
        if input.len() == 5 && input.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(input.to_string()))
        } else {
            Err(ZipCodeError::Invalid(input.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ZipCode {
    type Err = ZipCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ZipCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ZipCodeError {
    #[error("ZIP code must be exactly 5 digits, got {0:?}")]
    Invalid(String),
}

/// Round to 4 decimal places (about 11 m of latitude).
///
/// Idempotent: `round4(round4(x)) == round4(x)`.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Latitude/longitude pair, always rounded to 4 decimal places
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

impl Coordinate {
    /// Accept a raw provider coordinate, rounding both components.
    ///
    /// Returns `None` for non-finite or out-of-range values.
    pub fn rounded(latitude: f64, longitude: f64) -> Option<Self> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return None;
        }
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return None;
        }
        Some(Self {
            latitude: round4(latitude),
            longitude: round4(longitude),
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4},{:.4}", self.latitude, self.longitude)
    }
}

/// Normalized forecast condition, derived from the short forecast text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConditionCategory {
    MostlyClear,
    Cloudy,
    PartlySunny,
    Rain,
    Sunny,
    Thunderstorm,
    #[default]
    Unknown,
}

impl ConditionCategory {
    /// Get a human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::MostlyClear => "Mostly Clear",
            Self::Cloudy => "Cloudy",
            Self::PartlySunny => "Partly Sunny",
            Self::Rain => "Rain",
            Self::Sunny => "Sunny",
            Self::Thunderstorm => "Thunderstorm",
            Self::Unknown => "Unknown",
        }
    }

    /// Emoji shown next to the period; `Unknown` has none
    pub fn icon(&self) -> Option<&'static str> {
        match self {
            Self::MostlyClear => Some("🌙"),
            Self::Cloudy => Some("☁️"),
            Self::PartlySunny => Some("⛅"),
            Self::Rain => Some("🌧️"),
            Self::Sunny => Some("☀️"),
            Self::Thunderstorm => Some("⛈️"),
            Self::Unknown => None,
        }
    }
}

/// One period as api.weather.gov returns it
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPeriod {
    pub number: u32,
    pub name: String,
    pub short_forecast: String,
    pub temperature: i32,
    pub temperature_unit: String,
    #[serde(default)]
    pub detailed_forecast: Option<String>,
}

/// A classified forecast period
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPeriod {
    pub number: u32,
    pub name: String,
    pub short_forecast: String,
    pub temperature: i32,
    pub temperature_unit: String,
    pub detailed_forecast: Option<String>,
    pub condition: ConditionCategory,
}

impl ForecastPeriod {
    pub fn from_raw(raw: RawPeriod) -> Self {
        let condition = classify(&raw.short_forecast);
        Self {
            number: raw.number,
            name: raw.name,
            short_forecast: raw.short_forecast,
            temperature: raw.temperature,
            temperature_unit: raw.temperature_unit,
            detailed_forecast: raw.detailed_forecast,
            condition,
        }
    }

    /// `Today: ☀️ 72°F Sunny`
    pub fn render(&self) -> String {
        self.render_with(&self.short_forecast)
    }

    /// Like `render`, with the detailed text when the upstream sent one.
    pub fn render_detailed(&self) -> String {
        let text = self
            .detailed_forecast
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or(&self.short_forecast);
        self.render_with(text)
    }

    fn render_with(&self, text: &str) -> String {
        let temperature = format!("{}°{}", self.temperature, self.temperature_unit);
        match self.condition.icon() {
            Some(icon) => format!("{}: {} {} {}", self.name, icon, temperature, text),
            None => format!("{}: {} {}", self.name, temperature, text),
        }
    }
}

/// Ordered, possibly truncated list of classified periods
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ForecastResult {
    periods: Vec<ForecastPeriod>,
}

impl ForecastResult {
    pub fn new(periods: Vec<ForecastPeriod>) -> Self {
        Self { periods }
    }

    pub fn periods(&self) -> &[ForecastPeriod] {
        &self.periods
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ForecastPeriod> {
        self.periods.iter()
    }
}

/// Where api.weather.gov places the forecast point
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ForecastLocation {
    pub city: Option<String>,
    pub state: Option<String>,
    pub radar_station: Option<String>,
}

impl ForecastLocation {
    /// "City, ST" when both parts are known
    pub fn label(&self) -> Option<String> {
        match (&self.city, &self.state) {
            (Some(city), Some(state)) => Some(format!("{}, {}", city, state)),
            (Some(city), None) => Some(city.clone()),
            _ => None,
        }
    }
}

/// Everything one pipeline run produces
#[derive(Debug, Clone, Serialize)]
pub struct ForecastReport {
    pub zip: ZipCode,
    pub coordinate: Coordinate,
    pub location: ForecastLocation,
    pub forecast: ForecastResult,
}

impl ForecastReport {
    /// Plain-text rendering: a header line, then one line per period.
    pub fn render(&self, detailed: bool) -> String {
        let header = match self.location.label() {
            Some(label) => format!("Weather forecast for {}:", label),
            None => format!("Weather forecast for ZIP {}:", self.zip),
        };

        let mut lines = vec![header];
        lines.extend(self.forecast.iter().map(|p| {
            if detailed {
                p.render_detailed()
            } else {
                p.render()
            }
        }));
        lines.join("\n")
    }
}
