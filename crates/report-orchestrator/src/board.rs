use std::time::Duration;
use watchlist_core::{AnalysisSource, CanonicalIdentifier, IndexQuote, Market};

/// Headline indices shown at the top of every report.
pub const INDEX_BOARD: [(&str, &str); 3] = [
    ("SSE Composite", "000001"),
    ("SZSE Component", "399001"),
    ("ChiNext", "399006"),
];

/// Fetch the index board. Indices that cannot be quoted are left out.
pub async fn fetch_index_board(source: &dyn AnalysisSource, per_call: Duration) -> Vec<IndexQuote> {
    let mut board = Vec::with_capacity(INDEX_BOARD.len());

    for (label, code) in INDEX_BOARD {
        // Scanners disagree on whether index codes need an exchange prefix.
        let variants = [code.to_string(), format!("sh{}", code), format!("sz{}", code)];
        for variant in variants {
            let id = CanonicalIdentifier::new(variant, Market::A);
            match tokio::time::timeout(per_call, source.analyze(&id)).await {
                Ok(Ok(payload)) => {
                    if let Some(quote) = payload.quote {
                        board.push(IndexQuote {
                            label: label.to_string(),
                            code: code.to_string(),
                            price: quote.price,
                            change: quote.change,
                        });
                        break;
                    }
                }
                Ok(Err(e)) => tracing::debug!(index = label, symbol = %id, error = %e, "index quote failed"),
                Err(_) => tracing::debug!(index = label, symbol = %id, "index quote timed out"),
            }
        }
    }

    board
}
