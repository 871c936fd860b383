pub mod decode;
pub mod error;
pub mod fallback;
pub mod scanner;
pub mod store;

pub use error::{ClientError, ClientResult};
pub use fallback::ChatFallbackClient;
pub use scanner::ScannerClient;
pub use store::RestWatchlistStore;

use std::sync::Arc;
use std::time::Duration;

/// Endpoints and tuning for the external services.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub store_url: String,
    pub store_service_key: String,
    pub scanner_url: Option<String>,
    pub scanner_timeout: Duration,
    pub lookup_timeout: Duration,
    pub llm_base_url: String,
    pub llm_api_key: Option<String>,
    pub llm_model: String,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            store_url: String::new(),
            store_service_key: String::new(),
            scanner_url: None,
            scanner_timeout: Duration::from_secs(30),
            lookup_timeout: Duration::from_secs(6),
            llm_base_url: "https://open.bigmodel.cn/api/paas/v4".to_string(),
            llm_api_key: None,
            llm_model: "glm-4-flash".to_string(),
            llm_temperature: 0.7,
            llm_max_tokens: 2000,
        }
    }
}

/// All external clients, built once and shared. Optional sources are `None`
/// when not configured.
#[derive(Clone)]
pub struct SourceClients {
    pub store: Arc<RestWatchlistStore>,
    pub scanner: Option<Arc<ScannerClient>>,
    pub fallback: Option<Arc<ChatFallbackClient>>,
}

impl SourceClients {
    pub fn new(config: &SourceConfig) -> ClientResult<Self> {
        let store = RestWatchlistStore::new(
            config.store_url.clone(),
            config.store_service_key.clone(),
            Duration::from_secs(10),
        )?;

        let scanner = match &config.scanner_url {
            Some(url) => Some(Arc::new(ScannerClient::new(
                url.clone(),
                config.scanner_timeout,
                config.lookup_timeout,
            )?)),
            None => None,
        };

        let fallback = match &config.llm_api_key {
            Some(key) => Some(Arc::new(ChatFallbackClient::new(
                config.llm_base_url.clone(),
                key.clone(),
                config.llm_model.clone(),
                config.llm_temperature,
                config.llm_max_tokens,
                config.scanner_timeout,
            )?)),
            None => None,
        };

        Ok(Self {
            store: Arc::new(store),
            scanner,
            fallback,
        })
    }
}
