//! Tolerant decoders for the loosely-shaped JSON the external services
//! return. Every function here is total: unexpected shapes decode to
//! `None` / empty rather than an error.

use serde_json::{Map, Value};
use watchlist_core::{normalize, CanonicalIdentifier, Quote, SourcePayload, WatchlistEntry};

const NARRATIVE_KEYS: [&str; 5] = ["ai_analysis", "ai", "analysis", "report", "result"];
const NAME_KEYS: [&str; 2] = ["name", "stock_name"];
// No `id`: on store rows that is the row's primary key, not a security code.
const CODE_KEYS: [&str; 4] = ["code", "symbol", "stock_code", "ticker"];
const LOOKUP_CODE_KEYS: [&str; 5] = ["code", "stock_code", "symbol", "ticker", "id"];

/// Numbers may arrive as JSON numbers or numeric strings.
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').parse().ok(),
        _ => None,
    }
}

fn first_number(obj: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| obj.get(*k).and_then(number))
}

/// Non-empty string form of a scalar. Numbers are accepted since ids and
/// codes are sometimes stored numerically.
fn text(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

fn first_text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| obj.get(*k).and_then(text))
}

fn narrative_in(obj: &Map<String, Value>) -> Option<String> {
    NARRATIVE_KEYS.iter().find_map(|k| match obj.get(*k)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Object(inner) => inner.get("content").and_then(text),
        _ => None,
    })
}

fn quote_in(obj: &Map<String, Value>) -> Option<Quote> {
    let nested = obj
        .get("price_info")
        .and_then(Value::as_object)
        .or_else(|| {
            obj.get("data")
                .and_then(Value::as_object)
                .and_then(|d| d.get("price_info"))
                .and_then(Value::as_object)
        });
    let src = nested.unwrap_or(obj);

    let price = first_number(src, &["price", "current_price"])?;
    Some(Quote {
        name: first_text(src, &NAME_KEYS).or_else(|| first_text(obj, &NAME_KEYS)),
        price,
        change: first_number(src, &["change", "price_change"]),
        change_percent: first_number(src, &["change_percent", "price_change_percent", "pct_change"]),
        volume: first_number(src, &["volume"]),
        amount: first_number(src, &["amount"]),
        open: first_number(src, &["open"]),
        high: first_number(src, &["high"]),
        low: first_number(src, &["low"]),
        prev_close: first_number(src, &["yesterday_close", "pre_close"]),
    })
}

/// Decode an analysis response body. A body that is not JSON is taken as
/// the narrative itself.
pub fn decode_analysis(body: &str) -> SourcePayload {
    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => {
            let trimmed = body.trim();
            return SourcePayload {
                narrative: (!trimmed.is_empty()).then(|| trimmed.to_string()),
                quote: None,
            };
        }
    };

    match value {
        Value::Object(obj) => {
            let narrative = narrative_in(&obj).or_else(|| {
                obj.get("data")
                    .and_then(Value::as_object)
                    .and_then(narrative_in)
            });
            SourcePayload {
                narrative,
                quote: quote_in(&obj),
            }
        }
        Value::String(s) if !s.trim().is_empty() => SourcePayload {
            narrative: Some(s.trim().to_string()),
            quote: None,
        },
        _ => SourcePayload::default(),
    }
}

/// Pull the generated text out of a chat-completion response body.
pub fn decode_completion(body: &str) -> Option<String> {
    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) => {
            let trimmed = body.trim();
            return (!trimmed.is_empty()).then(|| trimmed.to_string());
        }
    };

    let content = match &value {
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => {
            let choice = obj
                .get("choices")
                .and_then(Value::as_array)
                .and_then(|c| c.first());
            choice
                .and_then(|c| c.pointer("/message/content"))
                .and_then(Value::as_str)
                .or_else(|| choice.and_then(|c| c.get("text")).and_then(Value::as_str))
                .map(str::to_string)
        }
        _ => None,
    };
    content
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

/// Map a store row to a watchlist entry. `None` when neither a name nor a
/// code is present.
pub fn decode_watchlist_row(row: &Map<String, Value>) -> Option<WatchlistEntry> {
    let entry = WatchlistEntry::new(
        first_text(row, &NAME_KEYS).unwrap_or_default(),
        first_text(row, &CODE_KEYS).unwrap_or_default(),
    );
    (!entry.is_blank()).then_some(entry)
}

/// `(user_id, email)` of a preference row; either may be empty.
pub fn decode_subscriber_row(row: &Map<String, Value>) -> (String, String) {
    (
        first_text(row, &["user_id"]).unwrap_or_default(),
        first_text(row, &["email", "contact"]).unwrap_or_default(),
    )
}

/// User id from a profile-table row: `user_id`, then `id`, then any
/// non-empty value.
pub fn decode_profile_row(row: &Map<String, Value>) -> Option<String> {
    first_text(row, &["user_id", "id"]).or_else(|| row.values().find_map(text))
}

fn candidates(value: &Value) -> Vec<&Map<String, Value>> {
    match value {
        Value::Object(obj) => {
            let listed = ["data", "results", "items"]
                .iter()
                .find_map(|k| obj.get(*k).and_then(Value::as_array));
            match listed {
                Some(items) => items.iter().filter_map(Value::as_object).collect(),
                None => vec![obj],
            }
        }
        Value::Array(items) => items.iter().filter_map(Value::as_object).collect(),
        _ => Vec::new(),
    }
}

fn is_short_code(s: &str) -> bool {
    (4..=6).contains(&s.len()) && s.chars().all(|c| c.is_ascii_digit())
}

/// First normalizable code in a symbol-search response.
pub fn decode_lookup(body: &str) -> Option<CanonicalIdentifier> {
    let value: Value = serde_json::from_str(body).ok()?;
    for item in candidates(&value) {
        if let Some(code) = first_text(item, &LOOKUP_CODE_KEYS) {
            if let Some(id) = normalize(&code) {
                return Some(id);
            }
        }
        let scanned = item
            .values()
            .filter_map(Value::as_str)
            .find(|s| is_short_code(s))
            .and_then(normalize);
        if scanned.is_some() {
            return scanned;
        }
    }
    None
}
