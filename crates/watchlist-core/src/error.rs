use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReportError {
    #[error("Unresolved identifier: {0}")]
    UnresolvedIdentifier(String),

    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Empty payload: {0}")]
    EmptyPayload(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),
}

pub type ReportResult<T> = Result<T, ReportError>;
