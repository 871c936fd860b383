use serde::Serialize;
use std::fmt::Write;
use watchlist_core::{EntryStatus, Report, ReportEntry, ReportResult, Subscriber};

fn signed(value: f64) -> String {
    format!("{:+.2}", value)
}

fn quote_line(entry: &ReportEntry) -> String {
    match &entry.quote {
        Some(q) => {
            let mut line = format!("{:.2}", q.price);
            if let Some(pct) = q.change_percent {
                let _ = write!(line, " ({}%)", signed(pct));
            } else if let Some(change) = q.change {
                let _ = write!(line, " ({})", signed(change));
            }
            line
        }
        None => "-".to_string(),
    }
}

fn entry_heading(position: usize, entry: &ReportEntry) -> String {
    let id = entry
        .identifier
        .as_ref()
        .map(|id| format!(" [{}]", id))
        .unwrap_or_default();
    format!(
        "{:>2}. {}{} {} [{}]",
        position,
        entry.display_name,
        id,
        quote_line(entry),
        entry.status.to_label()
    )
}

/// Plain-text rendering of one recipient's report.
pub fn render_text(recipient: &Subscriber, report: &Report) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "=== {} | {} | {} ===",
        report.kind.title(),
        report.generated_at.format("%Y-%m-%d %H:%M UTC"),
        if recipient.email.is_empty() { &recipient.user_id } else { &recipient.email }
    );

    if !report.indices.is_empty() {
        let _ = writeln!(out, "\nMarket indices");
        for index in &report.indices {
            let change = index.change.map(|c| format!(" ({})", signed(c))).unwrap_or_default();
            let _ = writeln!(out, "  {} {}: {:.2}{}", index.label, index.code, index.price, change);
        }
    }

    let _ = writeln!(out, "\nWatchlist");
    if report.entries.is_empty() {
        let _ = writeln!(out, "  (empty)");
    }
    for (i, entry) in report.entries.iter().enumerate() {
        let _ = writeln!(out, "{}", entry_heading(i + 1, entry));
        let _ = writeln!(out, "    {}", entry.narrative);
    }

    for (title, movers) in [("Top gainers", &report.gainers), ("Top losers", &report.losers)] {
        if movers.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n{}", title);
        for entry in movers {
            let _ = writeln!(out, "  {} {}", entry.display_name, quote_line(entry));
        }
    }

    let _ = writeln!(
        out,
        "\n{} ok, {} timeout, {} error, {} unavailable, {} unresolved",
        report.count_by_status(EntryStatus::Success),
        report.count_by_status(EntryStatus::Timeout),
        report.count_by_status(EntryStatus::SourceError),
        report.count_by_status(EntryStatus::Empty),
        report.count_by_status(EntryStatus::Unresolved),
    );
    out
}

#[derive(Serialize)]
struct JsonOutcome<'a> {
    user_id: &'a str,
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<&'a Report>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// JSON array with one object per recipient.
pub fn render_json(outcomes: &[(Subscriber, ReportResult<Report>)]) -> serde_json::Result<String> {
    let rows: Vec<JsonOutcome<'_>> = outcomes
        .iter()
        .map(|(recipient, outcome)| JsonOutcome {
            user_id: &recipient.user_id,
            email: &recipient.email,
            report: outcome.as_ref().ok(),
            error: outcome.as_ref().err().map(|e| e.to_string()),
        })
        .collect();
    serde_json::to_string_pretty(&rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use watchlist_core::{CanonicalIdentifier, IndexQuote, Market, Quote, ReportError, ReportKind, Tier};

    fn subscriber() -> Subscriber {
        Subscriber {
            user_id: "u1".to_string(),
            email: "u1@example.com".to_string(),
        }
    }

    fn report() -> Report {
        let moutai = ReportEntry {
            index: 0,
            display_name: "Kweichow Moutai".to_string(),
            identifier: Some(CanonicalIdentifier::new("600519", Market::A)),
            status: EntryStatus::Success,
            tier: Some(Tier::Primary),
            quote: Some(Quote {
                price: 1688.0,
                change_percent: Some(2.1),
                ..Default::default()
            }),
            narrative: "Holding the range.".to_string(),
        };
        let unknown = ReportEntry {
            index: 1,
            display_name: "自选股".to_string(),
            identifier: None,
            status: EntryStatus::Unresolved,
            tier: None,
            quote: None,
            narrative: "自选股: could not identify a tradable symbol.".to_string(),
        };
        Report {
            kind: ReportKind::EodSummary,
            generated_at: Utc::now(),
            indices: vec![IndexQuote {
                label: "SSE Composite".to_string(),
                code: "000001".to_string(),
                price: 3300.0,
                change: Some(-5.25),
            }],
            gainers: vec![moutai.clone()],
            losers: Vec::new(),
            entries: vec![moutai, unknown],
        }
    }

    #[test]
    fn test_text_report_sections() {
        let text = render_text(&subscriber(), &report());
        assert!(text.starts_with("=== End-of-Day Summary"));
        assert!(text.contains("u1@example.com"));
        assert!(text.contains("SSE Composite 000001: 3300.00 (-5.25)"));
        assert!(text.contains(" 1. Kweichow Moutai [600519 (A)] 1688.00 (+2.10%) [ok]"));
        assert!(text.contains(" 2. 自选股 - [unresolved]"));
        assert!(text.contains("Top gainers"));
        assert!(!text.contains("Top losers"));
        assert!(text.contains("1 ok, 0 timeout, 0 error, 0 unavailable, 1 unresolved"));
    }

    #[test]
    fn test_json_includes_errors() {
        let outcomes = vec![
            (subscriber(), Ok(report())),
            (
                Subscriber {
                    user_id: "u2".to_string(),
                    email: String::new(),
                },
                Err(ReportError::Store("timeout".to_string())),
            ),
        ];
        let json: serde_json::Value = serde_json::from_str(&render_json(&outcomes).unwrap()).unwrap();
        assert_eq!(json[0]["report"]["kind"], "eod_summary");
        assert_eq!(json[0]["report"]["entries"][1]["status"], "Unresolved");
        assert!(json[0].get("error").is_none());
        assert_eq!(json[1]["error"], "Store error: timeout");
    }
}
