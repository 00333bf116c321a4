//! Birth data form plumbing: place autocomplete with time zone resolution,
//! and report requests against a webhook.

pub mod config;
pub mod error;
pub mod form;
pub mod geocoding;
pub mod report;
pub mod resolver;
pub mod timezone;
pub mod types;
