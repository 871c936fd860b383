use std::time::Instant;
use watchlist_core::{EntryStatus, Report};

/// Per-process run telemetry, emitted as structured tracing fields.
#[derive(Debug, Default)]
pub struct RunMetrics {
    pub runs: u64,
    pub reports_built: u64,
    pub reports_failed: u64,
    pub entries_success: u64,
    pub entries_timeout: u64,
    pub entries_error: u64,
    pub entries_empty: u64,
    pub entries_unresolved: u64,

    pub last_run_duration_ms: u64,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_timer() -> Instant {
        Instant::now()
    }

    pub fn record_report(&mut self, report: &Report) {
        self.reports_built += 1;
        for entry in &report.entries {
            let counter = match entry.status {
                EntryStatus::Success => &mut self.entries_success,
                EntryStatus::Timeout => &mut self.entries_timeout,
                EntryStatus::SourceError => &mut self.entries_error,
                EntryStatus::Empty => &mut self.entries_empty,
                EntryStatus::Unresolved => &mut self.entries_unresolved,
            };
            *counter += 1;
        }
    }

    pub fn record_failure(&mut self) {
        self.reports_failed += 1;
    }

    pub fn finish_run(&mut self, run_start: Instant) {
        self.last_run_duration_ms = run_start.elapsed().as_millis() as u64;
        self.runs += 1;
        self.log_metrics();
    }

    /// Share of analysed entries that produced real content (0-100%).
    pub fn success_rate(&self) -> f64 {
        let analysed = self.entries_success + self.entries_timeout + self.entries_error + self.entries_empty;
        if analysed == 0 {
            return 0.0;
        }
        (self.entries_success as f64 / analysed as f64) * 100.0
    }

    pub fn log_metrics(&self) {
        tracing::info!(
            runs = self.runs,
            reports_built = self.reports_built,
            reports_failed = self.reports_failed,
            entries_success = self.entries_success,
            entries_timeout = self.entries_timeout,
            entries_error = self.entries_error,
            entries_empty = self.entries_empty,
            entries_unresolved = self.entries_unresolved,
            success_rate = format!("{:.1}%", self.success_rate()),
            last_run_ms = self.last_run_duration_ms,
            "Run metrics summary"
        );
    }
}
