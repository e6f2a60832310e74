use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::error::{Error, Result};

/// Status and body of one HTTP GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The only way requests leave the process.
///
/// Implementations report connection-level failures as [`Error::Network`];
/// non-2xx statuses are returned as responses and judged by the caller.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<RawResponse>;
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .cookie_store(true)
            .build()
            .map_err(|e| Error::Network {
                endpoint: "client".to_string(),
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<RawResponse> {
        let network_error = |e: reqwest::Error| Error::Network {
            endpoint: url.to_string(),
            message: if e.is_timeout() {
                "request timed out".to_string()
            } else if e.is_connect() {
                format!("connection failed: {}", e)
            } else {
                e.to_string()
            },
        };

        let response = self
            .client
            .get(url)
            .header("Accept", "text/html,application/xhtml+xml")
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(network_error)?;

        Ok(RawResponse { status, body })
    }
}
