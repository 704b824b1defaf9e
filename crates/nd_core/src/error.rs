use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::types::RunId;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Inference unavailable: {0}")]
    InferenceUnavailable(String),

    #[error("Malformed inference response: {0}")]
    MalformedResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Run not found: {0}")]
    RunNotFound(RunId),

    #[error("Run {0} was cancelled")]
    Cancelled(RunId),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

/// Coarse classification of an [`Error`], persisted with failed runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Fetch,
    InferenceUnavailable,
    MalformedResponse,
    Configuration,
    Delivery,
    Storage,
    Cancelled,
    Internal,
}

impl ErrorKind {
    /// Whether a step failing with this kind may be attempted again.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::Fetch | ErrorKind::InferenceUnavailable | ErrorKind::Delivery
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Fetch => "FetchError",
            ErrorKind::InferenceUnavailable => "InferenceUnavailableError",
            ErrorKind::MalformedResponse => "MalformedResponseError",
            ErrorKind::Configuration => "ConfigurationError",
            ErrorKind::Delivery => "DeliveryError",
            ErrorKind::Storage => "StorageError",
            ErrorKind::Cancelled => "Cancelled",
            ErrorKind::Internal => "InternalError",
        };
        f.write_str(name)
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Fetch(_) => ErrorKind::Fetch,
            Error::InferenceUnavailable(_) => ErrorKind::InferenceUnavailable,
            Error::MalformedResponse(_) => ErrorKind::MalformedResponse,
            Error::Configuration(_) => ErrorKind::Configuration,
            Error::Delivery(_) => ErrorKind::Delivery,
            Error::Storage(_) | Error::RunNotFound(_) => ErrorKind::Storage,
            Error::Cancelled(_) => ErrorKind::Cancelled,
            Error::Io(_) | Error::Serialization(_) | Error::External(_) => ErrorKind::Internal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(Error::Fetch("connection reset".into()).is_retryable());
        assert!(Error::InferenceUnavailable("503".into()).is_retryable());
        assert!(!Error::MalformedResponse("no choices".into()).is_retryable());
        assert!(!Error::Configuration("empty category set".into()).is_retryable());
        assert!(!Error::Storage("disk full".into()).is_retryable());
    }

    #[test]
    fn test_kind_display_names() {
        assert_eq!(ErrorKind::MalformedResponse.to_string(), "MalformedResponseError");
        assert_eq!(
            serde_json::to_string(&ErrorKind::InferenceUnavailable).unwrap(),
            "\"inference_unavailable\""
        );
    }
}
