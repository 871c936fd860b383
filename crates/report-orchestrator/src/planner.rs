use std::sync::Arc;
use std::time::Duration;
use watchlist_core::{plan, AnalysisJob, SymbolLookup, WatchlistEntry, WatchlistPlan};

/// Local normalization plus an optional remote lookup for rows that only
/// carry a name.
#[derive(Clone, Default)]
pub struct JobPlanner {
    lookup: Option<Arc<dyn SymbolLookup>>,
    lookup_timeout: Duration,
}

impl JobPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lookup(mut self, lookup: Arc<dyn SymbolLookup>, timeout: Duration) -> Self {
        self.lookup = Some(lookup);
        self.lookup_timeout = timeout;
        self
    }

    pub async fn plan(&self, entries: &[WatchlistEntry]) -> WatchlistPlan {
        let planned = self.plan_with_lookup(entries).await;
        for entry in &planned.unresolved {
            tracing::info!(index = entry.index, error = %entry.error(), "watchlist row skipped");
        }
        planned
    }

    async fn plan_with_lookup(&self, entries: &[WatchlistEntry]) -> WatchlistPlan {
        let mut planned = plan(entries);
        let Some(lookup) = &self.lookup else {
            return planned;
        };

        let mut still_unresolved = Vec::with_capacity(planned.unresolved.len());
        for entry in planned.unresolved {
            let name = entry.name.trim();
            if name.is_empty() {
                still_unresolved.push(entry);
                continue;
            }

            match tokio::time::timeout(self.lookup_timeout, lookup.lookup(name)).await {
                Ok(Ok(Some(identifier))) => {
                    tracing::info!(name, symbol = %identifier, "🔎 resolved name via lookup");
                    planned.jobs.push(AnalysisJob {
                        index: entry.index,
                        requested_name: name.to_string(),
                        identifier,
                    });
                }
                Ok(Ok(None)) => {
                    tracing::debug!(name, "lookup found nothing");
                    still_unresolved.push(entry);
                }
                Ok(Err(e)) => {
                    tracing::debug!(name, error = %e, "lookup failed");
                    still_unresolved.push(entry);
                }
                Err(_) => {
                    tracing::debug!(name, "lookup timed out");
                    still_unresolved.push(entry);
                }
            }
        }

        planned.jobs.sort_by_key(|job| job.index);
        planned.unresolved = still_unresolved;
        planned
    }
}
