#[cfg(test)]
mod dispatch_tests {
    use crate::chain::{ResolutionChain, Resolver};
    use crate::dispatcher::{resolver_budget, DispatchConfig, Dispatcher};
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;
    use watchlist_core::{
        AnalysisJob, AnalysisResult, AnalysisStatus, CanonicalIdentifier, Market, Tier,
    };

    #[derive(Default)]
    struct ScriptedResolver {
        delays: HashMap<usize, Duration>,
        panic_on: Option<usize>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        finished: AtomicUsize,
    }

    #[async_trait]
    impl Resolver for ScriptedResolver {
        async fn resolve(&self, job: &AnalysisJob, _budget: Duration) -> AnalysisResult {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let delay = self
                .delays
                .get(&job.index)
                .copied()
                .unwrap_or(Duration::from_secs(1));
            tokio::time::sleep(delay).await;
            if self.panic_on == Some(job.index) {
                panic!("resolver blew up on job {}", job.index);
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.finished.fetch_add(1, Ordering::SeqCst);
            AnalysisResult {
                job: job.clone(),
                status: AnalysisStatus::Success,
                tier: Some(Tier::Primary),
                quote: None,
                narrative: Some(format!("analysis {}", job.index)),
            }
        }
    }

    fn jobs(n: usize) -> Vec<AnalysisJob> {
        (0..n)
            .map(|index| AnalysisJob {
                index,
                requested_name: format!("Stock {index}"),
                identifier: CanonicalIdentifier::new(format!("{}", 600000 + index), Market::A),
            })
            .collect()
    }

    fn dispatcher(resolver: Arc<ScriptedResolver>, max_workers: usize, secs: u64) -> Dispatcher {
        Dispatcher::new(
            resolver,
            DispatchConfig {
                max_workers,
                per_job_timeout: Duration::from_secs(secs),
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_job_yields_exactly_one_result() {
        let delays = (0..25)
            .map(|i| (i, Duration::from_millis(((i * 37) % 11) as u64 * 100 + 50)))
            .collect();
        let resolver = Arc::new(ScriptedResolver {
            delays,
            ..Default::default()
        });

        let results = dispatcher(resolver, 4, 30).dispatch_all(jobs(25)).await;

        assert_eq!(results.len(), 25);
        let indices: HashSet<_> = results.iter().map(|r| r.job.index).collect();
        assert_eq!(indices.len(), 25);
        assert!(results.iter().all(|r| r.status == AnalysisStatus::Success));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_job_times_out_and_is_cancelled() {
        let resolver = Arc::new(ScriptedResolver {
            delays: HashMap::from([(7, Duration::from_secs(100))]),
            ..Default::default()
        });
        let started = Instant::now();

        let results = dispatcher(Arc::clone(&resolver), 4, 5).dispatch_all(jobs(10)).await;

        assert!(started.elapsed() <= Duration::from_secs(7));
        assert_eq!(results.len(), 10);
        for result in &results {
            let expected = if result.job.index == 7 {
                AnalysisStatus::Timeout
            } else {
                AnalysisStatus::Success
            };
            assert_eq!(result.status, expected, "job {}", result.job.index);
        }

        // The aborted task must never finish, even long after its deadline.
        tokio::time::sleep(Duration::from_secs(200)).await;
        assert_eq!(resolver.finished.load(Ordering::SeqCst), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_job_becomes_source_error() {
        let resolver = Arc::new(ScriptedResolver {
            panic_on: Some(2),
            ..Default::default()
        });

        let results = dispatcher(resolver, 2, 5).dispatch_all(jobs(5)).await;

        assert_eq!(results.len(), 5);
        let failed: Vec<_> = results
            .iter()
            .filter(|r| r.status == AnalysisStatus::SourceError)
            .map(|r| r.job.index)
            .collect();
        assert_eq!(failed, vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_never_exceeds_pool_size() {
        let resolver = Arc::new(ScriptedResolver::default());

        let results = dispatcher(Arc::clone(&resolver), 3, 5).dispatch_all(jobs(12)).await;

        assert_eq!(results.len(), 12);
        assert_eq!(resolver.peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pool_smaller_than_worker_limit() {
        let resolver = Arc::new(ScriptedResolver::default());

        let results = dispatcher(Arc::clone(&resolver), 8, 5).dispatch_all(jobs(2)).await;

        assert_eq!(results.len(), 2);
        assert!(resolver.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_dispatcher_reused_across_runs() {
        let resolver = Arc::new(ScriptedResolver {
            delays: (0..4).map(|i| (i, Duration::from_millis(1))).collect(),
            ..Default::default()
        });
        let dispatcher = dispatcher(resolver, 2, 5);

        assert!(dispatcher.dispatch_all(Vec::new()).await.is_empty());
        assert_eq!(dispatcher.dispatch_all(jobs(4)).await.len(), 4);
        assert_eq!(dispatcher.dispatch_all(jobs(3)).await.len(), 3);
    }

    struct HungSource;

    #[async_trait]
    impl watchlist_core::AnalysisSource for HungSource {
        async fn analyze(
            &self,
            _identifier: &CanonicalIdentifier,
        ) -> watchlist_core::ReportResult<watchlist_core::SourcePayload> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(watchlist_core::SourcePayload::default())
        }

        fn name(&self) -> &str {
            "hung"
        }
    }

    fn hung_chain_dispatcher(workers: usize, per_job_timeout: Duration) -> Dispatcher {
        let chain = ResolutionChain::new(Some(Arc::new(HungSource)), None);
        Dispatcher::new(
            Arc::new(chain),
            DispatchConfig {
                max_workers: workers,
                per_job_timeout,
            },
        )
    }

    fn assert_all_placeholders(results: &[AnalysisResult]) {
        for result in results {
            assert_eq!(result.status, AnalysisStatus::Empty, "job {}", result.job.index);
            assert_eq!(result.tier, Some(Tier::Placeholder), "job {}", result.job.index);
            assert!(result.narrative.is_some());
        }
    }

    #[test]
    fn test_resolver_budget_below_deadline() {
        for ms in [1, 10, 200, 5_000, 45_000, 600_000] {
            let deadline = Duration::from_millis(ms);
            assert!(resolver_budget(deadline) < deadline, "deadline {ms}ms");
        }
        assert_eq!(resolver_budget(Duration::from_secs(45)), Duration::from_secs(44));
        assert_eq!(resolver_budget(Duration::from_millis(200)), Duration::from_millis(180));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_primary_settles_on_placeholder() {
        let results = hung_chain_dispatcher(8, Duration::from_millis(200))
            .dispatch_all(jobs(8))
            .await;

        assert_eq!(results.len(), 8);
        assert_all_placeholders(&results);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_hung_primary_status_is_stable_across_jobs() {
        let results = hung_chain_dispatcher(8, Duration::from_secs(1))
            .dispatch_all(jobs(8))
            .await;

        assert_eq!(results.len(), 8);
        assert_all_placeholders(&results);
    }
}

#[cfg(test)]
mod report_tests {
    use crate::{DispatchConfig, Dispatcher, ReportOrchestrator, ResolutionChain};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;
    use watchlist_core::{
        AnalysisSource, CanonicalIdentifier, EntryStatus, Quote, ReportError, ReportKind,
        ReportResult, SourcePayload, Subscriber, Tier, WatchlistEntry, WatchlistStore,
    };

    struct MemoryStore {
        lists: HashMap<String, Vec<WatchlistEntry>>,
        subscribed: Vec<Subscriber>,
    }

    #[async_trait]
    impl WatchlistStore for MemoryStore {
        async fn watchlist(&self, user_id: &str) -> ReportResult<Vec<WatchlistEntry>> {
            self.lists
                .get(user_id)
                .cloned()
                .ok_or_else(|| ReportError::Store(format!("no watchlist for {user_id}")))
        }

        async fn subscribers(&self, _kind: ReportKind) -> ReportResult<Vec<Subscriber>> {
            Ok(self.subscribed.clone())
        }
    }

    struct QuoteBook;

    fn quote(price: f64, change_percent: f64) -> Option<Quote> {
        Some(Quote {
            price,
            change_percent: Some(change_percent),
            ..Default::default()
        })
    }

    #[async_trait]
    impl AnalysisSource for QuoteBook {
        async fn analyze(&self, identifier: &CanonicalIdentifier) -> ReportResult<SourcePayload> {
            match identifier.symbol.as_str() {
                "600519" => Ok(SourcePayload {
                    narrative: Some("Moutai holds its range.".to_string()),
                    quote: quote(1688.0, 2.1),
                }),
                "700" => Ok(SourcePayload {
                    narrative: Some("Tencent slips on volume.".to_string()),
                    quote: quote(380.0, -1.3),
                }),
                "0005" => Ok(SourcePayload {
                    narrative: None,
                    quote: quote(72.0, 0.5),
                }),
                "000001" => Ok(SourcePayload {
                    narrative: None,
                    quote: quote(3300.0, 0.2),
                }),
                other => Err(ReportError::SourceUnavailable(format!("no data for {other}"))),
            }
        }

        fn name(&self) -> &str {
            "quote-book"
        }
    }

    fn watchlist() -> Vec<WatchlistEntry> {
        vec![
            WatchlistEntry::new("", "sh600519"),
            WatchlistEntry::new("Tencent", "00700"),
            WatchlistEntry::new("", "AAPL"),
            WatchlistEntry::new("My Favorite (0005)", ""),
            WatchlistEntry::new("自选股", ""),
        ]
    }

    fn orchestrator(lists: HashMap<String, Vec<WatchlistEntry>>) -> ReportOrchestrator {
        let store = Arc::new(MemoryStore {
            lists,
            subscribed: vec![Subscriber {
                user_id: "u1".to_string(),
                email: "u1@example.com".to_string(),
            }],
        });
        let source: Arc<dyn AnalysisSource> = Arc::new(QuoteBook);
        let chain = ResolutionChain::new(Some(Arc::clone(&source)), None);
        let dispatcher = Dispatcher::new(Arc::new(chain), DispatchConfig::default());
        ReportOrchestrator::new(store, dispatcher).with_index_source(source, Duration::from_secs(2))
    }

    #[tokio::test]
    async fn test_eod_report_covers_every_entry() {
        let orchestrator = orchestrator(HashMap::from([("u1".to_string(), watchlist())]));
        let indices = orchestrator.index_board().await;
        let report = orchestrator
            .build_report(ReportKind::EodSummary, "u1", &indices)
            .await
            .unwrap();

        let statuses: Vec<_> = report.entries.iter().map(|e| e.status).collect();
        assert_eq!(
            statuses,
            vec![
                EntryStatus::Success,
                EntryStatus::Success,
                EntryStatus::Empty,
                EntryStatus::Success,
                EntryStatus::Unresolved,
            ]
        );
        assert!(report.entries.iter().all(|e| !e.narrative.is_empty()));
        assert_eq!(report.entries[1].display_name, "Tencent");
        assert_eq!(report.entries[2].tier, Some(Tier::Placeholder));
        assert_eq!(report.entries[3].tier, Some(Tier::Primary));

        let gainers: Vec<_> = report.gainers.iter().map(|e| e.index).collect();
        let losers: Vec<_> = report.losers.iter().map(|e| e.index).collect();
        assert_eq!(gainers, vec![0, 3]);
        assert_eq!(losers, vec![1]);

        assert_eq!(report.indices.len(), 1);
        assert_eq!(report.indices[0].code, "000001");
    }

    #[tokio::test]
    async fn test_morning_brief_caps_entries_and_skips_movers() {
        let long: Vec<_> = (0..12)
            .map(|i| WatchlistEntry::new("", format!("{}", 600000 + i)))
            .collect();
        let orchestrator = orchestrator(HashMap::from([("u1".to_string(), long)]));

        let report = orchestrator
            .build_report(ReportKind::MorningBrief, "u1", &[])
            .await
            .unwrap();

        assert_eq!(report.entries.len(), ReportKind::MorningBrief.entry_limit());
        assert!(report.gainers.is_empty() && report.losers.is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_only_affects_that_recipient() {
        let orchestrator = orchestrator(HashMap::from([("u1".to_string(), watchlist())]));
        let recipients = orchestrator
            .recipients(ReportKind::MiddayReview, &["u1".to_string(), "ghost".to_string()])
            .await
            .unwrap();

        let reports = orchestrator.run(ReportKind::MiddayReview, &recipients).await;

        assert_eq!(reports.len(), 2);
        assert!(reports[0].1.is_ok());
        assert!(matches!(reports[1].1, Err(ReportError::Store(_))));
    }

    #[tokio::test]
    async fn test_recipients_default_to_subscribers() {
        let orchestrator = orchestrator(HashMap::new());
        let recipients = orchestrator.recipients(ReportKind::MorningBrief, &[]).await.unwrap();
        assert_eq!(recipients.len(), 1);
        assert_eq!(recipients[0].email, "u1@example.com");
    }
}
