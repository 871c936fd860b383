use async_trait::async_trait;

use crate::{CanonicalIdentifier, ReportKind, ReportResult, SourcePayload, Subscriber, WatchlistEntry};

/// Primary per-symbol analysis/quote source.
#[async_trait]
pub trait AnalysisSource: Send + Sync {
    async fn analyze(&self, identifier: &CanonicalIdentifier) -> ReportResult<SourcePayload>;

    fn name(&self) -> &str;
}

/// Generative text service used when the primary source has no narrative.
#[async_trait]
pub trait NarrativeFallback: Send + Sync {
    async fn complete(&self, prompt: &str) -> ReportResult<String>;

    fn name(&self) -> &str;
}

/// Preference store holding watchlists and report subscriptions.
#[async_trait]
pub trait WatchlistStore: Send + Sync {
    /// Rows in stored order. Missing fields come back as empty strings.
    async fn watchlist(&self, user_id: &str) -> ReportResult<Vec<WatchlistEntry>>;

    async fn subscribers(&self, kind: ReportKind) -> ReportResult<Vec<Subscriber>>;
}

/// Remote name-to-symbol search. `Ok(None)` means no match.
#[async_trait]
pub trait SymbolLookup: Send + Sync {
    async fn lookup(&self, name: &str) -> ReportResult<Option<CanonicalIdentifier>>;
}
