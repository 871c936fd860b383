use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use watchlist_core::{
    aggregate_with_unresolved, top_movers, AnalysisSource, IndexQuote, Report, ReportKind,
    ReportResult, Subscriber, WatchlistStore,
};

pub mod board;
pub mod chain;
pub mod dispatcher;
pub mod planner;

#[cfg(test)]
mod tests;

pub use board::{fetch_index_board, INDEX_BOARD};
pub use chain::{ResolutionChain, Resolver};
pub use dispatcher::{DispatchConfig, Dispatcher};
pub use planner::JobPlanner;

/// Gainers and losers listed in end-of-day reports.
const TOP_MOVERS: usize = 3;

/// Watchlist read → plan → dispatch → aggregate, per recipient.
pub struct ReportOrchestrator {
    store: Arc<dyn WatchlistStore>,
    planner: JobPlanner,
    dispatcher: Dispatcher,
    index_source: Option<Arc<dyn AnalysisSource>>,
    index_timeout: Duration,
}

impl ReportOrchestrator {
    pub fn new(store: Arc<dyn WatchlistStore>, dispatcher: Dispatcher) -> Self {
        Self {
            store,
            planner: JobPlanner::new(),
            dispatcher,
            index_source: None,
            index_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_planner(mut self, planner: JobPlanner) -> Self {
        self.planner = planner;
        self
    }

    /// Source used for the index board. Without one the board is empty.
    pub fn with_index_source(mut self, source: Arc<dyn AnalysisSource>, timeout: Duration) -> Self {
        self.index_source = Some(source);
        self.index_timeout = timeout;
        self
    }

    /// Explicit user ids when given, otherwise everyone subscribed to `kind`.
    pub async fn recipients(&self, kind: ReportKind, users: &[String]) -> ReportResult<Vec<Subscriber>> {
        if !users.is_empty() {
            return Ok(users
                .iter()
                .map(|user_id| Subscriber {
                    user_id: user_id.clone(),
                    email: String::new(),
                })
                .collect());
        }
        self.store.subscribers(kind).await
    }

    pub async fn index_board(&self) -> Vec<IndexQuote> {
        match &self.index_source {
            Some(source) => fetch_index_board(source.as_ref(), self.index_timeout).await,
            None => Vec::new(),
        }
    }

    /// Build one user's report. Only a store failure is an error; every
    /// per-symbol problem ends up as an entry status.
    pub async fn build_report(
        &self,
        kind: ReportKind,
        user_id: &str,
        indices: &[IndexQuote],
    ) -> ReportResult<Report> {
        let mut watchlist = self.store.watchlist(user_id).await?;
        if watchlist.len() > kind.entry_limit() {
            tracing::debug!(user_id, total = watchlist.len(), limit = kind.entry_limit(), "watchlist truncated");
            watchlist.truncate(kind.entry_limit());
        }

        let plan = self.planner.plan(&watchlist).await;
        tracing::info!(
            user_id,
            report = %kind,
            jobs = plan.jobs.len(),
            unresolved = plan.unresolved.len(),
            "📊 building report"
        );

        let results = self.dispatcher.dispatch_all(plan.jobs).await;
        let entries = aggregate_with_unresolved(results, &plan.unresolved);
        let (gainers, losers) = if kind.includes_movers() {
            top_movers(&entries, TOP_MOVERS)
        } else {
            (Vec::new(), Vec::new())
        };

        Ok(Report {
            kind,
            generated_at: Utc::now(),
            indices: indices.to_vec(),
            entries,
            gainers,
            losers,
        })
    }

    /// One report per recipient. The index board is fetched once and shared.
    pub async fn run(
        &self,
        kind: ReportKind,
        recipients: &[Subscriber],
    ) -> Vec<(Subscriber, ReportResult<Report>)> {
        let indices = self.index_board().await;
        let mut reports = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            let report = self.build_report(kind, &recipient.user_id, &indices).await;
            if let Err(e) = &report {
                tracing::error!(user_id = %recipient.user_id, error = %e, "report failed");
            }
            reports.push((recipient.clone(), report));
        }
        reports
    }
}
