//! HTTP live-feed source.

use std::time::Duration;

use bustrack_core::{FeedSource, Result, TransitError};

/// Fetches the live feed document over HTTP with a hard timeout. A
/// timeout, connection error, or non-success status all surface as a
/// fetch failure, which the cache answers with the local fallback.
pub struct HttpFeedSource {
    url: String,
    client: reqwest::blocking::Client,
}

impl HttpFeedSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| TransitError::Fetch(err.to_string()))?;
        Ok(HttpFeedSource {
            url: url.into(),
            client,
        })
    }
}

impl FeedSource for HttpFeedSource {
    fn fetch(&self) -> Result<String> {
        if self.url.is_empty() {
            return Err(TransitError::Fetch("no feed url configured".into()));
        }
        let response = self
            .client
            .get(&self.url)
            .send()
            .map_err(|err| TransitError::Fetch(err.to_string()))?;
        if !response.status().is_success() {
            return Err(TransitError::Fetch(format!("HTTP {}", response.status())));
        }
        response
            .text()
            .map_err(|err| TransitError::Fetch(err.to_string()))
    }
}
