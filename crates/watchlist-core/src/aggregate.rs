use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::{AnalysisResult, AnalysisStatus, EntryStatus, ReportEntry, UnresolvedEntry};

fn display_name(result: &AnalysisResult) -> String {
    let requested = result.job.requested_name.trim();
    if !requested.is_empty() {
        return requested.to_string();
    }
    result
        .quote
        .as_ref()
        .and_then(|q| q.name.as_deref())
        .filter(|n| !n.trim().is_empty())
        .map(|n| n.trim().to_string())
        .unwrap_or_else(|| result.job.identifier.symbol.clone())
}

fn placeholder(status: AnalysisStatus, name: &str) -> String {
    match status {
        AnalysisStatus::Timeout => format!("{}: analysis timed out, no update this round.", name),
        AnalysisStatus::SourceError => format!("{}: analysis source failed, no update this round.", name),
        AnalysisStatus::Empty | AnalysisStatus::Success => {
            format!("{}: no analysis available at the moment.", name)
        }
    }
}

fn to_entry(result: AnalysisResult) -> ReportEntry {
    let name = display_name(&result);
    let narrative = result
        .narrative
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| placeholder(result.status, &name));
    ReportEntry {
        index: result.job.index,
        display_name: name,
        identifier: Some(result.job.identifier),
        status: result.status.into(),
        tier: result.tier,
        quote: result.quote,
        narrative,
    }
}

/// Fold dispatcher output into report lines, one per job index, ordered by
/// index. The first result seen for an index wins.
pub fn aggregate(results: Vec<AnalysisResult>) -> Vec<ReportEntry> {
    let mut by_index = BTreeMap::new();
    for result in results {
        by_index.entry(result.job.index).or_insert(result);
    }
    by_index.into_values().map(to_entry).collect()
}

/// Like [`aggregate`], with unresolved rows placed back at their watchlist
/// positions.
pub fn aggregate_with_unresolved(
    results: Vec<AnalysisResult>,
    unresolved: &[UnresolvedEntry],
) -> Vec<ReportEntry> {
    let mut entries = aggregate(results);
    for u in unresolved {
        if entries.iter().any(|e| e.index == u.index) {
            continue;
        }
        let name = u.display_name().to_string();
        entries.push(ReportEntry {
            index: u.index,
            narrative: format!("{}: could not identify a tradable symbol.", name),
            display_name: name,
            identifier: None,
            status: EntryStatus::Unresolved,
            tier: None,
            quote: None,
        });
    }
    entries.sort_by_key(|e| e.index);
    entries
}

fn movement(entry: &ReportEntry) -> Option<f64> {
    let quote = entry.quote.as_ref()?;
    quote
        .change_percent
        .or(quote.change)
        .filter(|c| c.is_finite())
}

/// Top `n` gainers (descending) and losers (ascending) among entries with a
/// quote. Flat entries appear in neither list.
pub fn top_movers(entries: &[ReportEntry], n: usize) -> (Vec<ReportEntry>, Vec<ReportEntry>) {
    let mut moving: Vec<(f64, &ReportEntry)> = entries
        .iter()
        .filter_map(|e| movement(e).map(|m| (m, e)))
        .collect();
    moving.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

    let gainers = moving
        .iter()
        .filter(|(m, _)| *m > 0.0)
        .take(n)
        .map(|(_, e)| ReportEntry::clone(e))
        .collect();
    let losers = moving
        .iter()
        .rev()
        .filter(|(m, _)| *m < 0.0)
        .take(n)
        .map(|(_, e)| ReportEntry::clone(e))
        .collect();
    (gainers, losers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AnalysisJob, CanonicalIdentifier, Market, Quote, Tier};

    fn job(index: usize, name: &str, symbol: &str) -> AnalysisJob {
        AnalysisJob {
            index,
            requested_name: name.to_string(),
            identifier: CanonicalIdentifier::new(symbol, Market::A),
        }
    }

    fn success(index: usize, change_percent: Option<f64>) -> AnalysisResult {
        AnalysisResult {
            job: job(index, &format!("Stock {index}"), &format!("60000{index}")),
            status: AnalysisStatus::Success,
            tier: Some(Tier::Primary),
            quote: change_percent.map(|cp| Quote {
                price: 10.0,
                change_percent: Some(cp),
                ..Default::default()
            }),
            narrative: Some("steady".to_string()),
        }
    }

    #[test]
    fn test_orders_by_index_and_dedupes() {
        let results = vec![
            success(2, None),
            AnalysisResult::timed_out(job(0, "", "600000")),
            success(1, None),
            AnalysisResult::source_error(job(2, "late", "600002")),
        ];
        let entries = aggregate(results);
        let indices: Vec<_> = entries.iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(entries[2].status, EntryStatus::Success);
        assert_eq!(entries[2].narrative, "steady");
    }

    #[test]
    fn test_failures_get_placeholder_narratives() {
        let results = vec![
            AnalysisResult::timed_out(job(0, "Moutai", "600519")),
            AnalysisResult::source_error(job(1, "", "700")),
        ];
        let entries = aggregate(results);
        assert_eq!(entries[0].status, EntryStatus::Timeout);
        assert!(entries[0].narrative.contains("Moutai"));
        assert_eq!(entries[1].display_name, "700");
        assert!(!entries[1].narrative.is_empty());
    }

    #[test]
    fn test_unresolved_interleaved() {
        let unresolved = vec![UnresolvedEntry {
            index: 1,
            name: "自选股".to_string(),
            raw_code: String::new(),
        }];
        let entries = aggregate_with_unresolved(vec![success(0, None), success(2, None)], &unresolved);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].status, EntryStatus::Unresolved);
        assert_eq!(entries[1].display_name, "自选股");
        assert!(entries[1].identifier.is_none());
        assert_eq!(
            unresolved[0].error(),
            crate::ReportError::UnresolvedIdentifier("自选股".to_string())
        );
    }

    #[test]
    fn test_top_movers() {
        let entries = aggregate(vec![
            success(0, Some(3.5)),
            success(1, Some(-2.0)),
            success(2, Some(0.0)),
            success(3, Some(7.1)),
            success(4, Some(-4.4)),
            success(5, None),
        ]);
        let (gainers, losers) = top_movers(&entries, 3);
        let g: Vec<_> = gainers.iter().map(|e| e.index).collect();
        let l: Vec<_> = losers.iter().map(|e| e.index).collect();
        assert_eq!(g, vec![3, 0]);
        assert_eq!(l, vec![4, 1]);
    }
}
