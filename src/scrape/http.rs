use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::{Result, ScoutError};

const USER_AGENT: &str = "Mozilla/5.0";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One fetched document, decoupled from any HTTP client type so tests can
/// build them directly.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects, including the query string
    pub url: String,
    pub status: u16,
    pub body: String,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Source of fetched pages.
///
/// [`HttpClient`] is the real implementation; tests substitute synthetic
/// backends. HTTP error statuses are not an `Err` here — the caller decides
/// whether a bad status is fatal (search pages) or degradable (detail pages).
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn get(&self, url: &str, query: &[(String, String)]) -> Result<FetchedPage>;
}

/// HTTP GET client with a default identification header and exactly one
/// transparent retry on transport failure.
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ScoutError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    async fn send(&self, url: &str, query: &[(String, String)]) -> reqwest::Result<FetchedPage> {
        let response = self.client.get(url).query(query).send().await?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response.text().await?;
        info!(url = %final_url, status, "GET");
        Ok(FetchedPage {
            url: final_url,
            status,
            body,
        })
    }
}

#[async_trait]
impl Fetcher for HttpClient {
    async fn get(&self, url: &str, query: &[(String, String)]) -> Result<FetchedPage> {
        match self.send(url, query).await {
            Ok(page) => Ok(page),
            Err(err) => {
                // Connection resets and timeouts are worth one retry; a
                // second consecutive failure propagates.
                warn!(url, error = %err, "request failed, retrying once");
                self.send(url, query).await.map_err(|source| ScoutError::Network {
                    url: url.to_string(),
                    source,
                })
            }
        }
    }
}
