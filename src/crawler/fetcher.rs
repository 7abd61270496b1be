//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - GET requests returning the status, headers and body as a [`Page`]
//! - Surfacing redirects instead of following them

use crate::config::{HttpConfig, UserAgentConfig};
use crate::model::{CrawlDatum, Page};
use async_trait::async_trait;
use reqwest::header::{HeaderName, CONTENT_TYPE, LOCATION};
use reqwest::{redirect::Policy, Client};
use std::time::Duration;

/// Fetch collaborator used by [`VisitorExecutor`](crate::crawler::VisitorExecutor)
///
/// Any HTTP status is a successful request; only transport failures are
/// errors.
#[async_trait]
pub trait Requester: Send + Sync {
    async fn request(&self, datum: &CrawlDatum) -> anyhow::Result<Page>;
}

/// Formats the user agent string
///
/// Format: `CrawlerName/Version (+ContactURL; ContactEmail)`
pub fn user_agent_string(config: &UserAgentConfig) -> String {
    format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    )
}

/// Builds an HTTP client with proper configuration
///
/// Redirects are never followed so that 3xx responses reach the dispatcher
/// with their `Location`.
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `http` - Timeouts and transport settings
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    http: &HttpConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent_string(user_agent))
        .timeout(Duration::from_secs(http.timeout_secs))
        .connect_timeout(Duration::from_secs(http.connect_timeout_secs))
        .redirect(Policy::none())
        .https_only(http.https_only)
        .gzip(true)
        .brotli(true)
        .build()
}

/// [`Requester`] backed by a reqwest client
#[derive(Debug, Clone)]
pub struct HttpRequester {
    client: Client,
}

impl HttpRequester {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(
        user_agent: &UserAgentConfig,
        http: &HttpConfig,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(user_agent, http)?))
    }
}

#[async_trait]
impl Requester for HttpRequester {
    async fn request(&self, datum: &CrawlDatum) -> anyhow::Result<Page> {
        let response = self.client.get(datum.url()).send().await?;

        let code = i32::from(response.status().as_u16());
        let final_url = response.url().clone();
        let (content_type, location) = {
            let header = |name: HeaderName| {
                response
                    .headers()
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            };
            // Relative locations are resolved against the responding URL
            let location = header(LOCATION).map(|raw| match final_url.join(&raw) {
                Ok(resolved) => resolved.to_string(),
                Err(_) => raw,
            });
            (header(CONTENT_TYPE), location)
        };

        let body = response.bytes().await?.to_vec();
        tracing::debug!("GET {} -> {} ({} bytes)", datum.url(), code, body.len());

        let mut page = Page::new(datum.clone(), code, body);
        page.final_url = final_url.to_string();
        page.content_type = content_type;
        page.location = location;
        Ok(page)
    }
}
