use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use watchlist_core::{
    AnalysisSource, CanonicalIdentifier, ReportResult, SourcePayload, SymbolLookup,
};

use crate::decode::{decode_analysis, decode_lookup};
use crate::error::{ClientError, ClientResult};

const SEARCH_ENDPOINTS: [&str; 4] = ["/api/search", "/api/suggest", "/api/lookup", "/api/stock_search"];
const SEARCH_KEYS: [&str; 4] = ["q", "query", "keyword", "stock_name"];

/// Client for the stock-scanner service: per-symbol analysis with quote
/// data, plus best-effort name search.
#[derive(Clone)]
pub struct ScannerClient {
    client: reqwest::Client,
    base_url: String,
    lookup_timeout: Duration,
}

impl ScannerClient {
    pub fn new(base_url: String, timeout: Duration, lookup_timeout: Duration) -> ClientResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            lookup_timeout,
        })
    }

    async fn post(
        &self,
        path: &str,
        payload: &serde_json::Value,
        timeout: Option<Duration>,
    ) -> ClientResult<String> {
        let mut request = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(payload);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ClientError::ServiceUnavailable(format!(
                "{} returned {}",
                path,
                response.status()
            )));
        }

        Ok(response.text().await?)
    }

    /// Analysis for one symbol. Empty payloads are an error so callers can
    /// fall through to the next tier.
    pub async fn fetch_analysis(&self, identifier: &CanonicalIdentifier) -> ClientResult<SourcePayload> {
        let payload = json!({
            "stock_code": identifier.symbol,
            "market_type": identifier.market.as_str(),
        });
        let body = self.post("/api/analyze", &payload, None).await?;

        let decoded = decode_analysis(&body);
        if decoded.is_empty() {
            return Err(ClientError::EmptyPayload(format!("/api/analyze for {}", identifier)));
        }
        Ok(decoded)
    }

    /// Walk the known search endpoints and query keys until one yields a
    /// usable code.
    pub async fn search(&self, name: &str) -> Option<CanonicalIdentifier> {
        for endpoint in SEARCH_ENDPOINTS {
            for key in SEARCH_KEYS {
                let mut query = serde_json::Map::new();
                query.insert(key.to_string(), json!(name));
                let payload = serde_json::Value::Object(query);
                match self.post(endpoint, &payload, Some(self.lookup_timeout)).await {
                    Ok(body) => {
                        if let Some(id) = decode_lookup(&body) {
                            tracing::debug!(name, endpoint, key, symbol = %id, "symbol lookup hit");
                            return Some(id);
                        }
                    }
                    Err(e) => {
                        tracing::debug!(name, endpoint, key, error = %e, "symbol lookup attempt failed");
                    }
                }
            }
        }
        None
    }
}

#[async_trait]
impl AnalysisSource for ScannerClient {
    async fn analyze(&self, identifier: &CanonicalIdentifier) -> ReportResult<SourcePayload> {
        Ok(self.fetch_analysis(identifier).await?)
    }

    fn name(&self) -> &str {
        "stock-scanner"
    }
}

#[async_trait]
impl SymbolLookup for ScannerClient {
    async fn lookup(&self, name: &str) -> ReportResult<Option<CanonicalIdentifier>> {
        Ok(self.search(name).await)
    }
}
