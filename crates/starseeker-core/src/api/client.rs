//! API client for the gates service.
//!
//! This module provides the `ApiClient` struct for fetching the gate
//! catalog and single gate records, plus the `CatalogSource` trait the
//! sync layer depends on.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::models::Gate;

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Header carrying the service API key.
const API_KEY_HEADER: &str = "x-api-key";

/// HTTP request timeout in seconds.
/// A timeout surfaces as an ordinary fetch failure.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Timeout for connectivity probes. Short so a dead link is noticed quickly.
const PING_TIMEOUT_SECS: u64 = 5;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Remote source of truth for the gate catalog.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch the full catalog.
    async fn fetch_catalog(&self) -> Result<Vec<Gate>, ApiError>;

    /// Fetch a single gate by code. Unknown codes yield `ApiError::NotFound`.
    async fn fetch_gate(&self, code: &str) -> Result<Gate, ApiError>;
}

/// API client for the gates service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl ApiClient {
    /// Create a new API client for `base_url` (e.g. "https://hstc-api.example.com").
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid API base URL: {}", base_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("API base URL cannot have paths appended: {}", base_url);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url,
            api_key: None,
        })
    }

    /// Set the API key sent with every request
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ApiError::InvalidResponse(format!("Bad base URL: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn headers(&self) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        if let Some(ref key) = self.api_key {
            let value = header::HeaderValue::from_str(key).map_err(|_| {
                ApiError::InvalidResponse("API key is not a valid header value".to_string())
            })?;
            headers.insert(API_KEY_HEADER, value);
        }
        Ok(headers)
    }

    /// Check if response is successful.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, ApiError> {
        let status = response.status();
        if status.is_success() {
            Ok(Some(response))
        } else if status.as_u16() == 429 {
            Ok(None)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            debug!(url = %url, "GET");
            let response = self
                .client
                .get(url.clone())
                .headers(self.headers()?)
                .send()
                .await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    let text = response.text().await?;
                    return serde_json::from_str(&text).map_err(|e| {
                        ApiError::InvalidResponse(format!(
                            "Failed to parse response from {}: {}",
                            url, e
                        ))
                    });
                }
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(
                        url = %url,
                        retry = retries,
                        backoff_ms = backoff_ms,
                        "Rate limited, backing off"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
            }
        }
    }

    // ===== Data Fetching Methods =====

    /// Fetch all gates in the network
    pub async fn fetch_gates(&self) -> Result<Vec<Gate>, ApiError> {
        let url = self.endpoint(&["gates"])?;
        let gates: Vec<Gate> = self.get(url).await?;
        debug!(count = gates.len(), "Fetched gate catalog");
        Ok(gates)
    }

    /// Fetch details for a single gate, e.g. "SOL"
    pub async fn fetch_gate_by_code(&self, code: &str) -> Result<Gate, ApiError> {
        let url = self.endpoint(&["gates", code])?;
        self.get(url).await
    }

    /// Whether the service is reachable. Any HTTP response counts as online;
    /// only transport failures (DNS, connect, timeout) count as offline.
    pub async fn ping(&self) -> bool {
        let result = self
            .client
            .head(self.base_url.clone())
            .timeout(Duration::from_secs(PING_TIMEOUT_SECS))
            .send()
            .await;

        match result {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "Connectivity probe failed");
                false
            }
        }
    }
}

#[async_trait]
impl CatalogSource for ApiClient {
    async fn fetch_catalog(&self) -> Result<Vec<Gate>, ApiError> {
        self.fetch_gates().await
    }

    async fn fetch_gate(&self, code: &str) -> Result<Gate, ApiError> {
        self.fetch_gate_by_code(code).await
    }
}
