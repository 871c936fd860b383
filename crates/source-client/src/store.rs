use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;
use watchlist_core::{ReportError, ReportKind, ReportResult, Subscriber, WatchlistEntry, WatchlistStore};

use crate::decode::{decode_profile_row, decode_subscriber_row, decode_watchlist_row};
use crate::error::{ClientError, ClientResult};

/// Tables checked, in order, when a subscriber row lacks a user id.
const PROFILE_TABLES: [&str; 3] = ["users", "user_profiles", "profiles"];

/// PostgREST-style preference store (`/rest/v1/<table>`).
#[derive(Clone)]
pub struct RestWatchlistStore {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl RestWatchlistStore {
    pub fn new(base_url: String, service_key: String, timeout: Duration) -> ClientResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key,
        })
    }

    async fn select(&self, table: &str, filters: &[(String, String)]) -> ClientResult<Vec<Map<String, Value>>> {
        let response = self
            .client
            .get(format!("{}/rest/v1/{}", self.base_url, table))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .query(filters)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::ServiceUnavailable(format!(
                "{} query returned {}",
                table,
                response.status()
            )));
        }

        let body = response.text().await?;
        let rows: Vec<Value> = serde_json::from_str(&body)?;
        Ok(rows
            .into_iter()
            .filter_map(|row| match row {
                Value::Object(obj) => Some(obj),
                _ => None,
            })
            .collect())
    }

    /// Find a user id by e-mail across the candidate profile tables.
    pub async fn user_id_by_email(&self, email: &str) -> Option<String> {
        let filters = [
            ("select".to_string(), "id,user_id,email".to_string()),
            ("email".to_string(), format!("eq.{}", email)),
        ];
        for table in PROFILE_TABLES {
            match self.select(table, &filters).await {
                Ok(rows) => {
                    if let Some(id) = rows.first().and_then(decode_profile_row) {
                        return Some(id);
                    }
                }
                Err(e) => tracing::debug!(table, error = %e, "profile lookup failed"),
            }
        }
        None
    }
}

fn store_error(err: ClientError) -> ReportError {
    ReportError::Store(err.to_string())
}

#[async_trait]
impl WatchlistStore for RestWatchlistStore {
    async fn watchlist(&self, user_id: &str) -> ReportResult<Vec<WatchlistEntry>> {
        if user_id.trim().is_empty() {
            return Ok(Vec::new());
        }
        let filters = [
            ("select".to_string(), "*".to_string()),
            ("user_id".to_string(), format!("eq.{}", user_id)),
        ];
        let rows = self.select("user_watchlist", &filters).await.map_err(store_error)?;
        Ok(rows.iter().filter_map(decode_watchlist_row).collect())
    }

    async fn subscribers(&self, kind: ReportKind) -> ReportResult<Vec<Subscriber>> {
        let filters = [
            ("select".to_string(), "*".to_string()),
            ("enabled".to_string(), "eq.true".to_string()),
            (format!("{}->>enabled", kind.as_str()), "eq.true".to_string()),
        ];
        let rows = self
            .select("user_email_preferences", &filters)
            .await
            .map_err(store_error)?;

        let mut subscribers = Vec::with_capacity(rows.len());
        for row in &rows {
            let (mut user_id, email) = decode_subscriber_row(row);
            if user_id.is_empty() && !email.is_empty() {
                user_id = self.user_id_by_email(&email).await.unwrap_or_default();
            }
            if user_id.is_empty() {
                tracing::warn!(email = %email, "subscriber without resolvable user id skipped");
                continue;
            }
            subscribers.push(Subscriber { user_id, email });
        }
        Ok(subscribers)
    }
}
