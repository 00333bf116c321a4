//! Settings read from the environment (and a `.env` file when present).
//!
//! - `GEOAPIFY_API_KEY`: key for the geocoding provider (required)
//! - `REPORT_WEBHOOK_URL`: endpoint receiving the form (required to submit)
//! - `GEOAPIFY_URL`: autocomplete endpoint (default: Geoapify v1)
//! - `GEOCODING_LANG`: language of suggestions (default: `pt`)

use reqwest::Url;

use crate::error::ConfigError;

pub const DEFAULT_GEOAPIFY_URL: &str = "https://api.geoapify.com/v1/geocode/autocomplete";
pub const DEFAULT_LANGUAGE: &str = "pt";

#[derive(Debug, Clone)]
pub struct Config {
    pub geoapify_api_key: String,
    pub geoapify_url: Url,
    pub language: String,
    pub webhook_url: Option<Url>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            log::debug!("No .env file loaded: {e}");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let geoapify_api_key =
            get("GEOAPIFY_API_KEY").ok_or(ConfigError::Missing("GEOAPIFY_API_KEY"))?;
        let geoapify_url = parse_url(
            "GEOAPIFY_URL",
            get("GEOAPIFY_URL").as_deref().unwrap_or(DEFAULT_GEOAPIFY_URL),
        )?;
        let webhook_url = get("REPORT_WEBHOOK_URL")
            .map(|url| parse_url("REPORT_WEBHOOK_URL", &url))
            .transpose()?;

        Ok(Config {
            geoapify_api_key,
            geoapify_url,
            language: get("GEOCODING_LANG").unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            webhook_url,
        })
    }

    pub fn with_webhook_url(mut self, url: &str) -> Result<Self, ConfigError> {
        self.webhook_url = Some(parse_url("REPORT_WEBHOOK_URL", url)?);
        Ok(self)
    }
}

fn parse_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        name,
        reason: e.to_string(),
    })
}
