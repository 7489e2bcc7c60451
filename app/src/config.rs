use secrecy::SecretString;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is not a valid URL: {value}")]
    InvalidUrl { name: &'static str, value: String },
}

/// Startup configuration, read from the environment.
///
/// Required environment variables:
/// - API_BASE_URL: Base URL of the Car/Host API, e.g. https://api.example.com
///
/// Optional environment variables:
/// - MAPS_API_KEY: Key for the map tiles provider
/// - PLACES_API_KEY: Key for place search and geocoding
/// - LOG_FILTER: Default tracing filter when RUST_LOG is unset (info)
#[derive(Debug)]
pub struct Config {
    pub api_base_url: String,
    pub maps_api_key: Option<SecretString>,
    pub places_api_key: Option<SecretString>,
    pub log_filter: String,
}

impl Config {
    /// Load from the process environment, after reading a `.env` file if
    /// one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Silently ignored if there is no .env file
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let non_empty = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_base_url = non_empty("API_BASE_URL")
            .ok_or(ConfigError::Missing("API_BASE_URL"))?;
        if !(api_base_url.starts_with("http://")
            || api_base_url.starts_with("https://"))
        {
            return Err(ConfigError::InvalidUrl {
                name: "API_BASE_URL",
                value: api_base_url,
            });
        }

        Ok(Config {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            maps_api_key: non_empty("MAPS_API_KEY").map(SecretString::from),
            places_api_key: non_empty("PLACES_API_KEY").map(SecretString::from),
            log_filter: non_empty("LOG_FILTER")
                .unwrap_or_else(|| "info".to_string()),
        })
    }
}
