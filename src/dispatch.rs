use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::error::{ApiError, Result};
use crate::query::Query;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Seam between the cache and the network so tests can substitute a stub.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, query: &Query) -> Result<Value>;
}

/// Single-attempt HTTP GET primitive.
///
/// Issues exactly one network call per invocation and never retries or caches;
/// both concerns belong to callers. The decoded JSON body is passed through
/// untouched, keeping this layer schema-agnostic.
pub struct Dispatcher {
    base_url: String,
    client: Client,
}

impl Dispatcher {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::from)?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Fetch for Dispatcher {
    async fn fetch(&self, query: &Query) -> Result<Value> {
        let url = query.to_url(&self.base_url)?;
        log::debug!("GET {}", url);

        let response = self.client.get(url).send().await.map_err(ApiError::from)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::HttpStatus(status.as_u16()));
        }

        let body = response.bytes().await.map_err(ApiError::from)?;
        serde_json::from_slice(&body).map_err(|err| ApiError::Decode(err.to_string()))
    }
}
