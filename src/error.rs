use thiserror::Error;

use crate::form::FormErrors;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Required setting missing: {0}")]
    Missing(&'static str),

    #[error("Report webhook URL is not configured (set REPORT_WEBHOOK_URL)")]
    MissingWebhookUrl,

    #[error("Invalid URL in {name}: {reason}")]
    InvalidUrl { name: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("Geocoding request failed: {0}")]
    Network(#[source] reqwest::Error),

    #[error("Geocoding provider answered with status {0}")]
    Status(reqwest::StatusCode),

    #[error("Could not decode geocoding response: {0}")]
    Decode(#[source] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Invalid form: {0}")]
    Invalid(FormErrors),

    #[error("Report request failed: {0}")]
    Network(#[source] reqwest::Error),

    #[error("Report webhook answered with status {0}")]
    Status(reqwest::StatusCode),
}

#[derive(Debug, Error)]
pub enum NatalError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Geocode(#[from] GeocodeError),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error("Prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),

    #[error("Could not write report: {0}")]
    Io(#[from] std::io::Error),
}
