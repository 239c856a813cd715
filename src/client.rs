use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde_json::Value;

use crate::cache::QueryCache;
use crate::dispatch::{Dispatcher, Fetch};
use crate::error::Result;
use crate::query::Query;

/// Default freshness window for cached responses.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);
/// Pane defaults applied when a chart request leaves them unset.
pub const DEFAULT_PANE1: &str = "CurrentPrice";
pub const DEFAULT_PANE2: &str = "AllExchangesVolume";
/// Concurrency guard for bulk chart fetches, to stay friendly to the API.
pub const CHART_CONCURRENCY_LIMIT: usize = 4;

/// One `/chart-data` request within a bulk fetch.
#[derive(Debug, Clone)]
pub struct ChartRequest {
    pub symbol: String,
    pub timeframe: String,
    pub pane1: Option<String>,
    pub pane2: Option<String>,
}

impl ChartRequest {
    pub fn new(symbol: impl Into<String>, timeframe: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe: timeframe.into(),
            pane1: None,
            pane2: None,
        }
    }
}

/// Typed front door to the backend endpoints.
///
/// Every read goes through the de-duplicating cache, so concurrent widgets
/// asking the same question share one network round trip.
pub struct ApiClient {
    cache: QueryCache,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_ttl(base_url, DEFAULT_TTL)
    }

    pub fn with_ttl(base_url: &str, ttl: Duration) -> Result<Self> {
        let dispatcher = Arc::new(Dispatcher::new(base_url)?);
        Ok(Self::with_fetcher(dispatcher, ttl))
    }

    /// Build against any fetch implementation; tests inject stubs here.
    pub fn with_fetcher(fetcher: Arc<dyn Fetch>, ttl: Duration) -> Self {
        Self {
            cache: QueryCache::new(fetcher, ttl),
        }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// GET `/symbols` — the tradable symbol list.
    pub async fn symbols(&self) -> Result<Value> {
        self.cache.lookup_or_fetch(Query::new("/symbols")).await
    }

    /// GET `/features` — backend feature flags.
    pub async fn features(&self) -> Result<Value> {
        self.cache.lookup_or_fetch(Query::new("/features")).await
    }

    /// GET `/health` — backend liveness probe.
    pub async fn health(&self) -> Result<Value> {
        self.cache.lookup_or_fetch(Query::new("/health")).await
    }

    /// GET `/chart-data` for one symbol. Unset panes fall back to
    /// [`DEFAULT_PANE1`] and [`DEFAULT_PANE2`].
    pub async fn chart_data(
        &self,
        symbol: &str,
        timeframe: &str,
        pane1: Option<&str>,
        pane2: Option<&str>,
    ) -> Result<Value> {
        self.cache
            .lookup_or_fetch(chart_query(symbol, timeframe, pane1, pane2))
            .await
    }

    /// Fetch chart data for several symbols with bounded concurrency.
    /// Results come back in request order; identical requests still collapse
    /// into one network call through the cache.
    pub async fn chart_data_many(&self, requests: &[ChartRequest]) -> Vec<Result<Value>> {
        stream::iter(requests.iter().map(|req| {
            let query = chart_query(
                &req.symbol,
                &req.timeframe,
                req.pane1.as_deref(),
                req.pane2.as_deref(),
            );
            self.cache.lookup_or_fetch(query)
        }))
        .buffered(CHART_CONCURRENCY_LIMIT)
        .collect()
        .await
    }

    /// Force the next lookup for `query` to hit the network.
    pub fn invalidate(&self, query: &Query) {
        self.cache.invalidate(query);
    }
}

fn chart_query(symbol: &str, timeframe: &str, pane1: Option<&str>, pane2: Option<&str>) -> Query {
    Query::new("/chart-data")
        .with_param("symbol", symbol)
        .with_param("timeframe", timeframe)
        .with_param("pane1", pane1.unwrap_or(DEFAULT_PANE1))
        .with_param("pane2", pane2.unwrap_or(DEFAULT_PANE2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records every query it serves and echoes the parameters back.
    struct RecordingFetch {
        seen: Mutex<Vec<Query>>,
    }

    impl RecordingFetch {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
            })
        }

        fn seen(&self) -> Vec<Query> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Fetch for RecordingFetch {
        async fn fetch(&self, query: &Query) -> Result<Value> {
            self.seen.lock().unwrap().push(query.clone());
            match query.endpoint() {
                "/health" => Err(ApiError::HttpStatus(500)),
                _ => Ok(json!({ "endpoint": query.endpoint() })),
            }
        }
    }

    #[tokio::test]
    async fn chart_data_applies_pane_defaults() {
        let stub = RecordingFetch::new();
        let client = ApiClient::with_fetcher(Arc::clone(&stub) as Arc<dyn Fetch>, DEFAULT_TTL);

        client.chart_data("BTC", "1h", None, None).await.unwrap();

        let seen = stub.seen();
        assert_eq!(seen.len(), 1);
        let params = seen[0].params();
        assert_eq!(params.get("pane1").map(String::as_str), Some(DEFAULT_PANE1));
        assert_eq!(params.get("pane2").map(String::as_str), Some(DEFAULT_PANE2));
        assert_eq!(params.get("symbol").map(String::as_str), Some("BTC"));
        assert_eq!(params.get("timeframe").map(String::as_str), Some("1h"));
    }

    #[tokio::test]
    async fn explicit_panes_override_defaults() {
        let stub = RecordingFetch::new();
        let client = ApiClient::with_fetcher(Arc::clone(&stub) as Arc<dyn Fetch>, DEFAULT_TTL);

        client
            .chart_data("ETH", "4h", Some("RSI"), None)
            .await
            .unwrap();

        let params = stub.seen()[0].params().clone();
        assert_eq!(params.get("pane1").map(String::as_str), Some("RSI"));
        assert_eq!(params.get("pane2").map(String::as_str), Some(DEFAULT_PANE2));
    }

    #[tokio::test]
    async fn bulk_fetch_preserves_order_and_deduplicates() {
        let stub = RecordingFetch::new();
        let client = ApiClient::with_fetcher(Arc::clone(&stub) as Arc<dyn Fetch>, DEFAULT_TTL);

        let requests = vec![
            ChartRequest::new("BTC", "1h"),
            ChartRequest::new("ETH", "1h"),
            ChartRequest::new("BTC", "1h"),
        ];
        let results = client.chart_data_many(&requests).await;

        assert_eq!(results.len(), 3);
        for result in &results {
            assert!(result.is_ok());
        }
        // Two unique queries, three answers.
        assert_eq!(stub.seen().len(), 2);
    }

    #[tokio::test]
    async fn health_error_reaches_the_caller() {
        let stub = RecordingFetch::new();
        let client = ApiClient::with_fetcher(Arc::clone(&stub) as Arc<dyn Fetch>, DEFAULT_TTL);

        let err = client.health().await.unwrap_err();
        assert_eq!(err, ApiError::HttpStatus(500));
    }

    #[tokio::test]
    async fn repeated_endpoint_reads_hit_the_cache() {
        let stub = RecordingFetch::new();
        let client = ApiClient::with_fetcher(Arc::clone(&stub) as Arc<dyn Fetch>, DEFAULT_TTL);

        client.symbols().await.unwrap();
        client.symbols().await.unwrap();
        assert_eq!(stub.seen().len(), 1);

        client.invalidate(&Query::new("/symbols"));
        client.symbols().await.unwrap();
        assert_eq!(stub.seen().len(), 2);
    }
}
