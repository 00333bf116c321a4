use async_trait::async_trait;
use reqwest::Url;

use crate::config::Config;
use crate::error::GeocodeError;
use crate::types::{GeoapifyResponse, Suggestion};

/// Most suggestions asked from the provider per query.
pub const RESULT_LIMIT: usize = 7;

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn search(&self, text: &str) -> Result<Vec<Suggestion>, GeocodeError>;
}

#[derive(Clone)]
pub struct GeoapifyClient {
    url: Url,
    api_key: String,
    language: String,
    client: reqwest::Client,
}

impl GeoapifyClient {
    pub fn new(config: &Config) -> Self {
        Self {
            url: config.geoapify_url.clone(),
            api_key: config.geoapify_api_key.clone(),
            language: config.language.clone(),
            client: reqwest::Client::new(),
        }
    }

    fn request(&self, text: &str) -> reqwest::RequestBuilder {
        let limit = RESULT_LIMIT.to_string();
        self.client.get(self.url.clone()).query(&[
            ("text", text),
            ("type", "city"),
            ("limit", limit.as_str()),
            ("lang", self.language.as_str()),
            ("format", "geojson"),
            ("apiKey", self.api_key.as_str()),
        ])
    }
}

#[async_trait]
impl Geocoder for GeoapifyClient {
    async fn search(&self, text: &str) -> Result<Vec<Suggestion>, GeocodeError> {
        log::debug!("Searching places for {text:?}");
        let res = self
            .request(text)
            .send()
            .await
            .map_err(GeocodeError::Network)?;
        if !res.status().is_success() {
            return Err(GeocodeError::Status(res.status()));
        }
        let body: GeoapifyResponse = res.json().await.map_err(GeocodeError::Decode)?;
        let suggestions: Vec<Suggestion> = body
            .features
            .into_iter()
            .filter_map(|f| Suggestion::from_properties(f.properties))
            .collect();
        log::debug!("{} suggestions for {text:?}", suggestions.len());
        Ok(suggestions)
    }
}
