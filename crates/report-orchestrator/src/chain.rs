use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use watchlist_core::{
    AnalysisJob, AnalysisResult, AnalysisSource, AnalysisStatus, NarrativeFallback, Quote, ReportError, Tier,
};

/// Turns one job into exactly one result. Implementations must not fail;
/// every problem is folded into the returned status.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, job: &AnalysisJob, budget: Duration) -> AnalysisResult;
}

/// Primary source, then generative fallback, then a static placeholder.
#[derive(Clone, Default)]
pub struct ResolutionChain {
    primary: Option<Arc<dyn AnalysisSource>>,
    fallback: Option<Arc<dyn NarrativeFallback>>,
}

impl ResolutionChain {
    pub fn new(
        primary: Option<Arc<dyn AnalysisSource>>,
        fallback: Option<Arc<dyn NarrativeFallback>>,
    ) -> Self {
        Self { primary, fallback }
    }

    fn success(job: &AnalysisJob, tier: Tier, quote: Option<Quote>, narrative: Option<String>) -> AnalysisResult {
        AnalysisResult {
            job: job.clone(),
            status: AnalysisStatus::Success,
            tier: Some(tier),
            quote,
            narrative,
        }
    }
}

fn display_name(job: &AnalysisJob) -> &str {
    let name = job.requested_name.trim();
    if name.is_empty() {
        job.identifier.symbol.as_str()
    } else {
        name
    }
}

/// Prompt for the generative fallback.
pub fn analysis_prompt(job: &AnalysisJob) -> String {
    format!(
        "Write a short analysis (about 100 words) of {} ({}, {} market). \
         Cover the recent trend and the main risks to watch, in plain language.",
        display_name(job),
        job.identifier.symbol,
        job.identifier.market
    )
}

pub fn placeholder_narrative(job: &AnalysisJob) -> String {
    format!(
        "{}: no analysis could be generated this round. Check the quote and news manually.",
        display_name(job)
    )
}

#[async_trait]
impl Resolver for ResolutionChain {
    async fn resolve(&self, job: &AnalysisJob, budget: Duration) -> AnalysisResult {
        let started = Instant::now();
        let mut quote = None;

        if let Some(primary) = &self.primary {
            match timeout(budget, primary.analyze(&job.identifier)).await {
                Ok(Ok(payload)) => {
                    let narrative = payload.narrative.filter(|n| !n.trim().is_empty());
                    if narrative.is_some() {
                        return Self::success(job, Tier::Primary, payload.quote, narrative);
                    }
                    quote = payload.quote;
                }
                Ok(Err(e)) => {
                    tracing::warn!(symbol = %job.identifier, source = primary.name(), error = %e, "primary source failed");
                }
                Err(_) => {
                    tracing::warn!(symbol = %job.identifier, source = primary.name(), error = %ReportError::Timeout(budget), "primary source timed out");
                }
            }
        }

        let remaining = budget.saturating_sub(started.elapsed());
        if let Some(fallback) = &self.fallback {
            if remaining.is_zero() {
                tracing::debug!(symbol = %job.identifier, "no budget left for fallback");
            } else {
                match timeout(remaining, fallback.complete(&analysis_prompt(job))).await {
                    Ok(Ok(text)) if !text.trim().is_empty() => {
                        return Self::success(job, Tier::Fallback, quote, Some(text.trim().to_string()));
                    }
                    Ok(Ok(_)) => {
                        tracing::debug!(symbol = %job.identifier, fallback = fallback.name(), "fallback returned empty text");
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(symbol = %job.identifier, fallback = fallback.name(), error = %e, "fallback failed");
                    }
                    Err(_) => {
                        tracing::warn!(symbol = %job.identifier, fallback = fallback.name(), error = %ReportError::Timeout(remaining), "fallback timed out");
                    }
                }
            }
        }

        // A quote alone is still real data from the primary source.
        if quote.is_some() {
            return Self::success(job, Tier::Primary, quote, None);
        }

        AnalysisResult {
            job: job.clone(),
            status: AnalysisStatus::Empty,
            tier: Some(Tier::Placeholder),
            quote: None,
            narrative: Some(placeholder_narrative(job)),
        }
    }
}
