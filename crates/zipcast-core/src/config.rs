use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// ZIP code geocode cache
    #[serde(default)]
    pub cache: CacheConfig,

    /// Geocoding provider settings
    #[serde(default)]
    pub geocode: GeocodeConfig,

    /// Weather provider settings
    #[serde(default)]
    pub forecast: ForecastConfig,

    /// Retry/backoff policy shared by every upstream call
    #[serde(default)]
    pub retry: RetrySettings,

    /// Optional chat webhook delivery
    #[serde(default)]
    pub webhook: WebhookConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Path of the append-only `zip,lat,lng` cache file
    pub path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".zip_cache"),
        }
    }
}

/// Which geocoding provider to use on a cache miss
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderChoice {
    /// Keyed provider when an API key is available, keyless otherwise
    #[default]
    Auto,
    Zippopotam,
    Google,
}

impl std::str::FromStr for ProviderChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "zippopotam" => Ok(Self::Zippopotam),
            "google" => Ok(Self::Google),
            other => Err(format!(
                "unknown provider '{}' (expected auto, zippopotam or google)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodeConfig {
    /// Provider selection
    #[serde(default)]
    pub provider: ProviderChoice,

    /// Base URL of the keyless Zippopotam.us API
    #[serde(default = "default_zippopotam_url")]
    pub zippopotam_url: String,

    /// Base URL of the Google Maps platform
    #[serde(default = "default_google_url")]
    pub google_url: String,

    /// Environment variable checked first for the Google API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// File read for the Google API key when the variable is unset
    #[serde(default = "default_api_key_file")]
    pub api_key_file: PathBuf,
}

fn default_zippopotam_url() -> String {
    "https://api.zippopotam.us".to_string()
}

fn default_google_url() -> String {
    "https://maps.googleapis.com".to_string()
}

fn default_api_key_env() -> String {
    "ZIPCAST_GOOGLE_API_KEY".to_string()
}

fn default_api_key_file() -> PathBuf {
    PathBuf::from(".google_api_key")
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            provider: ProviderChoice::default(),
            zippopotam_url: default_zippopotam_url(),
            google_url: default_google_url(),
            api_key_env: default_api_key_env(),
            api_key_file: default_api_key_file(),
        }
    }
}

impl GeocodeConfig {
    /// Load the Google API key from the environment or the key file.
    ///
    /// Blank values count as absent.
    pub fn api_key(&self) -> Option<String> {
        if let Ok(key) = std::env::var(&self.api_key_env) {
            let key = key.trim();
            if !key.is_empty() {
                return Some(key.to_string());
            }
        }

        match std::fs::read_to_string(&self.api_key_file) {
            Ok(contents) => {
                let key = contents.trim();
                if key.is_empty() {
                    tracing::debug!("API key file {:?} is empty", self.api_key_file);
                    None
                } else {
                    Some(key.to_string())
                }
            }
            Err(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Base URL of the National Weather Service API
    #[serde(default = "default_nws_url")]
    pub nws_url: String,

    /// User-Agent sent with every request (api.weather.gov rejects requests without one)
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Number of periods shown when no limit is passed on the command line
    #[serde(default)]
    pub default_limit: Option<usize>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_nws_url() -> String {
    "https://api.weather.gov".to_string()
}

fn default_user_agent() -> String {
    format!(
        "zipcast/{} (https://github.com/zipcast/zipcast)",
        env!("CARGO_PKG_VERSION")
    )
}

fn default_timeout_secs() -> u64 {
    5
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            nws_url: default_nws_url(),
            user_agent: default_user_agent(),
            default_limit: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry, doubled for each one after
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Upper bound for a single delay
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    5
}

fn default_initial_delay_ms() -> u64 {
    300
}

fn default_max_delay_ms() -> u64 {
    5000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Discord-compatible webhook URL; delivery is skipped when unset
    #[serde(default)]
    pub url: Option<String>,
}

impl Config {
    /// Load configuration from the default location, creating it if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path.
    ///
    /// A missing file yields the defaults, which are written back on a
    /// best-effort basis so the user has something to edit.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            if let Err(e) = config.save_to(path) {
                tracing::warn!("Could not write default config to {:?}: {:#}", path, e);
            }
            return Ok(config);
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated(path: Option<&Path>) -> Result<(Self, ValidationResult)> {
        let config = match path {
            Some(p) => Self::load_from(p)?,
            None => Self::load()?,
        };
        let validation = config.validate();

        if !validation.is_valid() {
            anyhow::bail!(
                "Configuration validation failed: {}",
                validation.error_summary()
            );
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    ///
    /// Returns a ValidationResult containing any errors or warnings.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(
            &self.geocode.zippopotam_url,
            "geocode.zippopotam_url",
            &mut result,
        );
        self.validate_url(&self.geocode.google_url, "geocode.google_url", &mut result);
        self.validate_url(&self.forecast.nws_url, "forecast.nws_url", &mut result);

        if let Some(url) = &self.webhook.url {
            self.validate_url(url, "webhook.url", &mut result);
        }

        if self.cache.path.as_os_str().is_empty() {
            result.add_error("cache.path", "Cache path must not be empty");
        }

        if self.forecast.user_agent.trim().is_empty() {
            result.add_error(
                "forecast.user_agent",
                "User-Agent must not be empty (api.weather.gov requires one)",
            );
        }

        if self.forecast.timeout_secs == 0 {
            result.add_error("forecast.timeout_secs", "Timeout must be greater than 0");
        }

        if self.forecast.default_limit == Some(0) {
            result.add_warning(
                "forecast.default_limit",
                "A limit of 0 shows every period",
            );
        }

        if self.retry.max_retries == 0 {
            result.add_warning("retry.max_retries", "Retries disabled (0 retries)");
        } else if self.retry.max_retries > 10 {
            result.add_warning(
                "retry.max_retries",
                "More than 10 retries can stall a run for a long time",
            );
        }

        if self.retry.initial_delay_ms > self.retry.max_delay_ms {
            result.add_error(
                "retry.initial_delay_ms",
                "Initial delay must not exceed retry.max_delay_ms",
            );
        }

        if self.geocode.provider == ProviderChoice::Google && self.geocode.api_key().is_none() {
            result.add_warning(
                "geocode.provider",
                format!(
                    "Google geocoding selected but no API key found in ${} or {}",
                    self.geocode.api_key_env,
                    self.geocode.api_key_file.display()
                ),
            );
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if url.port() == Some(0) {
                    result.add_error(field_name, "Port cannot be 0");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).context("Failed to create config directory")?;
            }
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("zipcast");

        Ok(config_dir.join("config.toml"))
    }
}
