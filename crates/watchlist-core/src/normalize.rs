//! Heuristic mapping of free-form watchlist codes to `(symbol, market)`.
//!
//! Explicit market prefixes win over digit-count routing. Digit count alone
//! cannot tell a 5-digit HK code from a truncated A-share code, so rules 2, 3
//! and the fallback are best-effort.

use regex::Regex;
use std::sync::LazyLock;

use crate::{AnalysisJob, CanonicalIdentifier, Market, UnresolvedEntry, WatchlistEntry, WatchlistPlan};

static A_PREFIXED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:sh|sz)(\d+)$").expect("valid regex"));
static HK_PREFIXED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^hk(\d+)$").expect("valid regex"));
static SIX_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{6}$").expect("valid regex"));
static HK_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4,5}$").expect("valid regex"));
static HK_SUFFIXED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,6})hk$").expect("valid regex"));
static SHORT_ALPHA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{1,6}$").expect("valid regex"));
static LEADING_ALPHA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-z]+)").expect("valid regex"));

// Name extraction. Boundaries are spelled out as ASCII classes so that CJK
// characters next to a code count as separators.
static BRACKETED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[(（\[]\s*([0-9A-Za-z]{1,6})\s*[)）\]]").expect("valid regex")
});
static TRAILING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^0-9A-Za-z])([0-9A-Za-z]{4,6})\s*$").expect("valid regex")
});
static DIGIT_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^0-9])([0-9]{4,6})(?:\s*[.\-/_]?\s*(sh|sz|hk|us))?(?:[^0-9A-Za-z]|$)")
        .expect("valid regex")
});
static BARE_ALPHA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^0-9A-Za-z])([A-Za-z]{1,6})(?:[^0-9A-Za-z]|$)").expect("valid regex")
});

fn clean(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '_' | '.'))
        .collect()
}

fn strip_zeros(digits: &str) -> String {
    let stripped = digits.trim_start_matches('0');
    if stripped.is_empty() {
        "0".to_string()
    } else {
        stripped.to_string()
    }
}

/// Market implied by a bare digit run, counted before any zeros are dropped.
fn market_for_digits(digits: &str) -> Market {
    match digits.len() {
        4 | 5 => Market::HK,
        _ => Market::A,
    }
}

/// Map a raw code to a canonical identifier. `None` only when the code
/// cleans to an empty string.
pub fn normalize(raw: &str) -> Option<CanonicalIdentifier> {
    let s = clean(raw);
    if s.is_empty() {
        return None;
    }

    if let Some(caps) = A_PREFIXED.captures(&s) {
        return Some(CanonicalIdentifier::new(strip_zeros(&caps[1]), Market::A));
    }
    if let Some(caps) = HK_PREFIXED.captures(&s) {
        return Some(CanonicalIdentifier::new(strip_zeros(&caps[1]), Market::HK));
    }
    if SIX_DIGITS.is_match(&s) {
        return Some(CanonicalIdentifier::new(strip_zeros(&s), Market::A));
    }
    if HK_DIGITS.is_match(&s) {
        return Some(CanonicalIdentifier::new(strip_zeros(&s), Market::HK));
    }
    if let Some(caps) = HK_SUFFIXED.captures(&s) {
        return Some(CanonicalIdentifier::new(strip_zeros(&caps[1]), Market::HK));
    }
    for prefix in ["us", "gb"] {
        if let Some(rest) = s.strip_prefix(prefix) {
            if !rest.is_empty() {
                return Some(CanonicalIdentifier::new(rest.to_uppercase(), Market::US));
            }
        }
    }
    if SHORT_ALPHA.is_match(&s) {
        return Some(CanonicalIdentifier::new(s.to_uppercase(), Market::US));
    }
    if let Some(caps) = LEADING_ALPHA.captures(&s) {
        return Some(CanonicalIdentifier::new(caps[1].to_uppercase(), Market::US));
    }

    let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        Some(CanonicalIdentifier::new(s.to_uppercase(), Market::US))
    } else {
        Some(CanonicalIdentifier::new(strip_zeros(&digits), market_for_digits(&digits)))
    }
}

/// Token pulled out of a display name, with an explicit market when the
/// name carried a suffix like `.HK`.
fn extract_from_name(name: &str) -> Option<(String, Option<Market>)> {
    let t = name.trim();
    if t.is_empty() {
        return None;
    }
    if let Some(caps) = BRACKETED.captures(t) {
        return Some((caps[1].to_string(), None));
    }
    if let Some(caps) = TRAILING.captures(t) {
        return Some((caps[1].to_string(), None));
    }
    if let Some(caps) = DIGIT_RUN.captures(t) {
        let market = caps.get(2).map(|m| match m.as_str().to_ascii_lowercase().as_str() {
            "hk" => Market::HK,
            "us" => Market::US,
            _ => Market::A,
        });
        return Some((caps[1].to_string(), market));
    }
    BARE_ALPHA
        .captures(t)
        .map(|caps| (caps[1].to_string(), None))
}

/// Resolve one watchlist row: the raw code first, then a token embedded in
/// the name. Digits taken from a name are kept as written.
pub fn resolve_entry(entry: &WatchlistEntry) -> Option<CanonicalIdentifier> {
    if let Some(id) = normalize(&entry.raw_code) {
        return Some(id);
    }

    let (token, market) = extract_from_name(&entry.name)?;
    if token.chars().all(|c| c.is_ascii_digit()) {
        return Some(match market {
            Some(market) => CanonicalIdentifier::new(token, market),
            None => {
                let market = market_for_digits(&token);
                CanonicalIdentifier::new(token, market)
            }
        });
    }
    normalize(&token)
}

/// Split a watchlist into dispatchable jobs and unresolved rows. Indices
/// follow input order.
pub fn plan(entries: &[WatchlistEntry]) -> WatchlistPlan {
    let mut plan = WatchlistPlan::default();
    for (index, entry) in entries.iter().enumerate() {
        match resolve_entry(entry) {
            Some(identifier) => plan.jobs.push(AnalysisJob {
                index,
                requested_name: entry.name.trim().to_string(),
                identifier,
            }),
            None => plan.unresolved.push(UnresolvedEntry {
                index,
                name: entry.name.clone(),
                raw_code: entry.raw_code.clone(),
            }),
        }
    }
    plan
}
