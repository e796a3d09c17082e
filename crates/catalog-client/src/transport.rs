//! HTTP transport seam under the catalog walker.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::config::CatalogConfig;
use crate::error::{CatalogError, Result};

/// A raw catalog response.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok_json(body: &Value) -> Self {
        Self::new(200, body.to_string())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends catalog requests.
///
/// Transport failures (connection refused, timeout) are errors; non-success
/// statuses are returned as responses so the walker can decide.
#[async_trait]
pub trait SearchTransport: Send + Sync {
    async fn get(&self, url: &str) -> Result<TransportResponse>;

    async fn post(&self, url: &str, body: &Value) -> Result<TransportResponse>;
}

/// reqwest-backed transport.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build a client with the configured request timeout.
    pub fn new(config: &CatalogConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| CatalogError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    async fn into_response(response: reqwest::Response) -> Result<TransportResponse> {
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(TransportResponse { status, body })
    }
}

#[async_trait]
impl SearchTransport for HttpTransport {
    async fn get(&self, url: &str) -> Result<TransportResponse> {
        debug!(url = %url, "GET");
        let response = self.client.get(url).send().await?;
        Self::into_response(response).await
    }

    async fn post(&self, url: &str, body: &Value) -> Result<TransportResponse> {
        debug!(url = %url, "POST");
        let response = self.client.post(url).json(body).send().await?;
        Self::into_response(response).await
    }
}
