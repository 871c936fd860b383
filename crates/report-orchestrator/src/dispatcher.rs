use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use watchlist_core::{AnalysisJob, AnalysisResult, ReportError};

use crate::chain::Resolver;

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub max_workers: usize,
    pub per_job_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            per_job_timeout: Duration::from_secs(45),
        }
    }
}

/// Fixed-size worker pool over a shared job queue. Built once and reused
/// for every run.
#[derive(Clone)]
pub struct Dispatcher {
    resolver: Arc<dyn Resolver>,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(resolver: Arc<dyn Resolver>, config: DispatchConfig) -> Self {
        Self { resolver, config }
    }

    /// Resolve every job. Always returns one result per job, in arrival
    /// order.
    pub async fn dispatch_all(&self, jobs: Vec<AnalysisJob>) -> Vec<AnalysisResult> {
        if jobs.is_empty() {
            return Vec::new();
        }

        let total = jobs.len();
        let workers = self.config.max_workers.max(1).min(total);
        let queue = Arc::new(Mutex::new(VecDeque::from(jobs.clone())));
        let (tx, mut rx) = mpsc::channel::<AnalysisResult>(total);

        tracing::debug!(jobs = total, workers, "dispatching");

        let mut handles = Vec::with_capacity(workers);
        for worker in 0..workers {
            let queue = Arc::clone(&queue);
            let tx = tx.clone();
            let resolver = Arc::clone(&self.resolver);
            let per_job_timeout = self.config.per_job_timeout;

            handles.push(tokio::spawn(async move {
                loop {
                    let next = queue.lock().await.pop_front();
                    let Some(job) = next else { break };

                    let result = run_job(Arc::clone(&resolver), job, per_job_timeout).await;
                    if tx.send(result).await.is_err() {
                        tracing::error!(worker, "result channel closed early");
                        break;
                    }
                }
            }));
        }
        drop(tx);

        // Single consumer: the first result per index wins.
        let mut seen = HashSet::with_capacity(total);
        let mut results = Vec::with_capacity(total);
        while let Some(result) = rx.recv().await {
            if seen.insert(result.job.index) {
                results.push(result);
            } else {
                tracing::debug!(index = result.job.index, "duplicate result dropped");
            }
        }

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "dispatch worker died");
            }
        }

        for job in jobs {
            if !seen.contains(&job.index) {
                tracing::warn!(index = job.index, symbol = %job.identifier, "no result recorded, marking as source error");
                seen.insert(job.index);
                results.push(AnalysisResult::source_error(job));
            }
        }

        results
    }
}

/// Budget handed to the resolver. It is kept strictly below the dispatcher's
/// own deadline so a resolver that honours it always reports first.
pub(crate) fn resolver_budget(per_job_timeout: Duration) -> Duration {
    let margin = (per_job_timeout / 10).clamp(Duration::from_millis(1), Duration::from_secs(1));
    per_job_timeout.saturating_sub(margin)
}

/// Resolve one job in its own task. On timeout the task is aborted so a
/// late answer has nowhere to go.
async fn run_job(resolver: Arc<dyn Resolver>, job: AnalysisJob, per_job_timeout: Duration) -> AnalysisResult {
    let task_job = job.clone();
    let budget = resolver_budget(per_job_timeout);
    let mut handle = tokio::spawn(async move { resolver.resolve(&task_job, budget).await });

    match tokio::time::timeout(per_job_timeout, &mut handle).await {
        Ok(Ok(result)) => AnalysisResult { job, ..result },
        Ok(Err(e)) => {
            tracing::warn!(symbol = %job.identifier, error = %e, "analysis task failed");
            AnalysisResult::source_error(job)
        }
        Err(_) => {
            handle.abort();
            tracing::warn!(symbol = %job.identifier, error = %ReportError::Timeout(per_job_timeout), "⏱️ analysis timed out");
            AnalysisResult::timed_out(job)
        }
    }
}
