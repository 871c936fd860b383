use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ReportError;

/// A watchlist row as read from the preference store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub name: String,
    pub raw_code: String,
}

impl WatchlistEntry {
    pub fn new(name: impl Into<String>, raw_code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            raw_code: raw_code.into(),
        }
    }

    /// Both fields blank: nothing to resolve or display.
    pub fn is_blank(&self) -> bool {
        self.name.trim().is_empty() && self.raw_code.trim().is_empty()
    }
}

/// Supported trading venues. Drives quote-source routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Market {
    /// Shanghai / Shenzhen A-shares
    A,
    /// Hong Kong
    HK,
    /// United States
    US,
}

impl Market {
    pub fn as_str(&self) -> &'static str {
        match self {
            Market::A => "A",
            Market::HK => "HK",
            Market::US => "US",
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of normalization. `symbol` is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalIdentifier {
    pub symbol: String,
    pub market: Market,
}

impl CanonicalIdentifier {
    pub fn new(symbol: impl Into<String>, market: Market) -> Self {
        Self {
            symbol: symbol.into(),
            market,
        }
    }

    /// Market-prefixed code (`sh600519`, `sz1`, `hk700`, `usAAPL`) that
    /// normalizes back to this identifier.
    pub fn qualified(&self) -> String {
        match self.market {
            Market::A => {
                let shanghai =
                    self.symbol.len() == 6 && self.symbol.starts_with(|c| c == '6' || c == '9');
                let exchange = if shanghai {
                    "sh"
                } else {
                    "sz"
                };
                format!("{}{}", exchange, self.symbol)
            }
            Market::HK => format!("hk{}", self.symbol),
            Market::US => format!("us{}", self.symbol),
        }
    }
}

impl fmt::Display for CanonicalIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.symbol, self.market)
    }
}

/// One unit of dispatch. `index` is the entry's watchlist position and
/// serves as the job identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisJob {
    pub index: usize,
    pub requested_name: String,
    pub identifier: CanonicalIdentifier,
}

/// A watchlist row for which no identifier could be inferred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedEntry {
    pub index: usize,
    pub name: String,
    pub raw_code: String,
}

impl UnresolvedEntry {
    pub fn display_name(&self) -> &str {
        if !self.name.trim().is_empty() {
            self.name.trim()
        } else if !self.raw_code.trim().is_empty() {
            self.raw_code.trim()
        } else {
            "unknown"
        }
    }

    pub fn error(&self) -> ReportError {
        ReportError::UnresolvedIdentifier(self.display_name().to_string())
    }
}

/// Jobs and leftovers produced from one watchlist read.
#[derive(Debug, Clone, Default)]
pub struct WatchlistPlan {
    pub jobs: Vec<AnalysisJob>,
    pub unresolved: Vec<UnresolvedEntry>,
}

impl WatchlistPlan {
    pub fn len(&self) -> usize {
        self.jobs.len() + self.unresolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty() && self.unresolved.is_empty()
    }
}

/// Snapshot quote fields. Only `price` is guaranteed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    #[serde(default)]
    pub name: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub change: Option<f64>,
    #[serde(default)]
    pub change_percent: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub open: Option<f64>,
    #[serde(default)]
    pub high: Option<f64>,
    #[serde(default)]
    pub low: Option<f64>,
    #[serde(default)]
    pub prev_close: Option<f64>,
}

/// Decoded response of a primary source call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourcePayload {
    pub narrative: Option<String>,
    pub quote: Option<Quote>,
}

impl SourcePayload {
    pub fn is_empty(&self) -> bool {
        self.narrative.is_none() && self.quote.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnalysisStatus {
    Success,
    Timeout,
    SourceError,
    Empty,
}

/// Which tier of the resolution chain produced the narrative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    Primary,
    Fallback,
    Placeholder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub job: AnalysisJob,
    pub status: AnalysisStatus,
    pub tier: Option<Tier>,
    pub quote: Option<Quote>,
    pub narrative: Option<String>,
}

impl AnalysisResult {
    pub fn timed_out(job: AnalysisJob) -> Self {
        Self {
            job,
            status: AnalysisStatus::Timeout,
            tier: None,
            quote: None,
            narrative: None,
        }
    }

    pub fn source_error(job: AnalysisJob) -> Self {
        Self {
            job,
            status: AnalysisStatus::SourceError,
            tier: None,
            quote: None,
            narrative: None,
        }
    }
}

/// Status shown on a report line. Superset of `AnalysisStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryStatus {
    Success,
    Timeout,
    SourceError,
    Empty,
    Unresolved,
}

impl From<AnalysisStatus> for EntryStatus {
    fn from(status: AnalysisStatus) -> Self {
        match status {
            AnalysisStatus::Success => EntryStatus::Success,
            AnalysisStatus::Timeout => EntryStatus::Timeout,
            AnalysisStatus::SourceError => EntryStatus::SourceError,
            AnalysisStatus::Empty => EntryStatus::Empty,
        }
    }
}

impl EntryStatus {
    pub fn to_label(&self) -> &'static str {
        match self {
            EntryStatus::Success => "ok",
            EntryStatus::Timeout => "timeout",
            EntryStatus::SourceError => "error",
            EntryStatus::Empty => "unavailable",
            EntryStatus::Unresolved => "unresolved",
        }
    }
}

/// A renderable report line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub index: usize,
    pub display_name: String,
    pub identifier: Option<CanonicalIdentifier>,
    pub status: EntryStatus,
    pub tier: Option<Tier>,
    pub quote: Option<Quote>,
    pub narrative: String,
}

/// Report flavours, one per trading-day slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    MorningBrief,
    MiddayReview,
    EodSummary,
}

impl ReportKind {
    pub const ALL: [ReportKind; 3] = [
        ReportKind::MorningBrief,
        ReportKind::MiddayReview,
        ReportKind::EodSummary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::MorningBrief => "morning_brief",
            ReportKind::MiddayReview => "midday_review",
            ReportKind::EodSummary => "eod_summary",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ReportKind::MorningBrief => "Morning Brief",
            ReportKind::MiddayReview => "Midday Review",
            ReportKind::EodSummary => "End-of-Day Summary",
        }
    }

    /// Maximum watchlist entries covered by one report.
    pub fn entry_limit(&self) -> usize {
        match self {
            ReportKind::MorningBrief => 8,
            ReportKind::MiddayReview => 10,
            ReportKind::EodSummary => 20,
        }
    }

    pub fn includes_movers(&self) -> bool {
        matches!(self, ReportKind::EodSummary)
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportKind {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ReportKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| ReportError::Config(format!("unknown report kind: {}", s)))
    }
}

/// A report recipient as listed by the preference store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    pub user_id: String,
    pub email: String,
}

/// Headline market index line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexQuote {
    pub label: String,
    pub code: String,
    pub price: f64,
    pub change: Option<f64>,
}

/// Report-ready output of one run for one recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub kind: ReportKind,
    pub generated_at: DateTime<Utc>,
    pub indices: Vec<IndexQuote>,
    pub entries: Vec<ReportEntry>,
    pub gainers: Vec<ReportEntry>,
    pub losers: Vec<ReportEntry>,
}

impl Report {
    pub fn count_by_status(&self, status: EntryStatus) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }
}
