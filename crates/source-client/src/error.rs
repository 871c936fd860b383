use thiserror::Error;
use watchlist_core::ReportError;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Empty response from {0}")]
    EmptyPayload(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type ClientResult<T> = Result<T, ClientError>;

impl From<ClientError> for ReportError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::EmptyPayload(what) => ReportError::EmptyPayload(what),
            other => ReportError::SourceUnavailable(other.to_string()),
        }
    }
}
