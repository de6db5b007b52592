//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - GET requests to fetch page content
//! - Classifying failures into transient, blocked and other

use crate::config::UserAgentConfig;
use crate::crawler::traits::PageFetcher;
use crate::FetchError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use listing_harvester::config::UserAgentConfig;
/// use listing_harvester::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "ListingHarvester".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    // Format: CrawlerName/Version (+ContactURL; ContactEmail)
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Maps a non-success HTTP status to a fetch error
///
/// | Status | Class |
/// |--------|-------|
/// | 403 | Blocked |
/// | 429 | Transient |
/// | 5xx | Transient |
/// | anything else | Other |
pub fn classify_status(url: &str, status: StatusCode) -> FetchError {
    let url = url.to_string();
    let message = format!("HTTP {}", status);

    if status == StatusCode::FORBIDDEN {
        FetchError::Blocked { url, message }
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        FetchError::Transient { url, message }
    } else {
        FetchError::Other { url, message }
    }
}

/// Maps a reqwest transport error to a fetch error
pub fn classify_reqwest_error(url: &str, error: &reqwest::Error) -> FetchError {
    if error.is_timeout() || error.is_connect() {
        return FetchError::Transient {
            url: url.to_string(),
            message: error.to_string(),
        };
    }
    if let Some(status) = error.status() {
        return classify_status(url, status);
    }
    FetchError::classify_message(url, &error.to_string())
}

/// Page fetcher backed by a reqwest client
#[derive(Debug, Clone)]
pub struct ReqwestPageFetcher {
    client: Client,
    block_markers: Vec<String>,
}

impl ReqwestPageFetcher {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            block_markers: Vec::new(),
        }
    }

    /// Phrases that turn a 200 response into a block (captcha interstitials)
    pub fn with_block_markers(mut self, markers: Vec<String>) -> Self {
        self.block_markers = markers.into_iter().map(|m| m.to_lowercase()).collect();
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn find_block_marker(&self, body: &str) -> Option<&str> {
        if self.block_markers.is_empty() {
            return None;
        }
        let lowered = body.to_lowercase();
        self.block_markers
            .iter()
            .find(|m| !m.is_empty() && lowered.contains(m.as_str()))
            .map(String::as_str)
    }
}

#[async_trait]
impl PageFetcher for ReqwestPageFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(url, &e))?;

        let status = response.status();
        debug!("GET {} -> {}", url, status);

        if !status.is_success() {
            return Err(classify_status(url, status));
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(url, &e))?;

        if let Some(marker) = self.find_block_marker(&body) {
            return Err(FetchError::Blocked {
                url: url.to_string(),
                message: format!("block marker found: {}", marker),
            });
        }

        Ok(body)
    }
}
