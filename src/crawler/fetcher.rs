//! HTTP fetcher implementation
//!
//! This module handles the document requests of the crawler:
//! - Building HTTP clients with proper user agent strings
//! - GET requests for a single decision document
//! - Error classification into timeouts, statuses and transport failures

use crate::config::{ApiConfig, UserAgentConfig};
use crate::{CrawlError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Path of the document endpoint, relative to the API base URL
pub const CONTENT_PATH: &str = "/uitspraken/content";

/// Retrieves the raw XML document of one decision
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Fetches the source document for an ECLI
    ///
    /// Exactly one request is made; retrying is left to the caller.
    async fn fetch(&self, id: &str) -> Result<String>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `api` - The remote API configuration (request timeout)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use rechtspraak_crawler::config::{ApiConfig, UserAgentConfig};
/// use rechtspraak_crawler::crawler::build_http_client;
///
/// let user_agent = UserAgentConfig {
///     crawler_name: "RechtspraakCrawler".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&user_agent, &ApiConfig::default()).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    api: &ApiConfig,
) -> std::result::Result<Client, reqwest::Error> {
    // Format: CrawlerName/Version (+ContactURL; ContactEmail)
    let user_agent = format!(
        "{}/{} (+{}; {})",
        user_agent.crawler_name,
        user_agent.crawler_version,
        user_agent.contact_url,
        user_agent.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(api.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Sends a GET request and returns the body of a successful response
///
/// Shared by the document fetcher and the change feed.
pub(crate) async fn get_text(client: &Client, url: &Url) -> Result<String> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| CrawlError::from_reqwest(url.as_str(), e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(CrawlError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    response
        .text()
        .await
        .map_err(|e| CrawlError::from_reqwest(url.as_str(), e))
}

/// Fetches documents from the Open Data content endpoint
pub struct HttpDocumentFetcher {
    client: Client,
    base_url: String,
}

impl HttpDocumentFetcher {
    /// Creates a fetcher for the given API base URL
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Builds the content URL for an ECLI
    pub fn document_url(&self, id: &str) -> Result<Url> {
        let url = Url::parse_with_params(
            &format!("{}{}", self.base_url, CONTENT_PATH),
            &[("id", id)],
        )?;
        Ok(url)
    }
}

#[async_trait]
impl DocumentFetcher for HttpDocumentFetcher {
    async fn fetch(&self, id: &str) -> Result<String> {
        let url = self.document_url(id)?;
        tracing::debug!("Fetching document {}", url);
        get_text(&self.client, &url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "TestCrawler".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        }
    }

    #[test]
    fn test_build_http_client() {
        let config = create_test_config();
        let client = build_http_client(&config, &ApiConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_document_url_encodes_identifier() {
        let client = build_http_client(&create_test_config(), &ApiConfig::default()).unwrap();
        let fetcher = HttpDocumentFetcher::new(client, "https://data.rechtspraak.nl/");

        let url = fetcher.document_url("ECLI:NL:HR:2024:1").unwrap();
        assert_eq!(url.path(), "/uitspraken/content");
        assert_eq!(
            url.query_pairs().next().map(|(k, v)| (k.into_owned(), v.into_owned())),
            Some(("id".to_string(), "ECLI:NL:HR:2024:1".to_string()))
        );
    }
}
