use anyhow::{bail, Context, Result};
use source_client::SourceConfig;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    // External services
    pub sources: SourceConfig,

    // Dispatch
    pub max_workers: usize,             // 4
    pub per_job_timeout: Duration,      // 45s

    // Name lookup for rows without a code
    pub enable_name_lookup: bool,       // false

    // 0 = run once and exit
    pub run_interval_seconds: u64,
}

fn parse_env<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse()
        .with_context(|| format!("{} has an invalid value: {:?}", key, raw))
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl AgentConfig {
    pub fn from_env() -> Result<Self> {
        let store_url = optional_env("STORE_URL").context("STORE_URL not set")?;

        let defaults = SourceConfig::default();
        let sources = SourceConfig {
            store_url,
            store_service_key: env::var("STORE_SERVICE_KEY").unwrap_or_default(),
            scanner_url: optional_env("SCANNER_URL"),
            scanner_timeout: Duration::from_secs(parse_env("SCANNER_TIMEOUT_SECS", "30")?),
            lookup_timeout: Duration::from_secs(parse_env("LOOKUP_TIMEOUT_SECS", "6")?),
            llm_base_url: optional_env("LLM_BASE_URL").unwrap_or(defaults.llm_base_url),
            llm_api_key: optional_env("LLM_API_KEY"),
            llm_model: optional_env("LLM_MODEL").unwrap_or(defaults.llm_model),
            llm_temperature: parse_env("LLM_TEMPERATURE", "0.7")?,
            llm_max_tokens: parse_env("LLM_MAX_TOKENS", "2000")?,
        };

        let config = Self {
            sources,
            max_workers: parse_env("MAX_WORKERS", "4")?,
            per_job_timeout: Duration::from_secs(parse_env("PER_JOB_TIMEOUT_SECS", "45")?),
            enable_name_lookup: parse_env("ENABLE_NAME_LOOKUP", "false")?,
            run_interval_seconds: parse_env("RUN_INTERVAL_SECS", "0")?,
        };
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            bail!("MAX_WORKERS must be at least 1");
        }
        if self.per_job_timeout.is_zero() {
            bail!("PER_JOB_TIMEOUT_SECS must be greater than 0");
        }
        Ok(())
    }
}
