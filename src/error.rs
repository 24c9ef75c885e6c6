//! Error types shared by the route and chat fetch paths.
//!
//! Every failure inside a fetch task ends up as one `FetchError`. The variants stay
//! distinguishable for tests and for the UI, while `Display` gives the single
//! human-readable message shown to the user.

use reqwest::StatusCode;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result of a single fetch request.
pub type Outcome<T> = std::result::Result<T, FetchError>;

#[derive(Error, Debug)]
pub enum FetchError {
    /// Transport failure (DNS, connect, TLS, body read)
    #[error("Network error: {0}")]
    Network(String),

    /// Server answered with a non-success status
    #[error("HTTP error: {status}")]
    Http { status: StatusCode },

    /// No answer within the configured request timeout
    #[error("Request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Response body was malformed or lacked an expected field
    #[error("Parse error: {0}")]
    Parse(String),

    /// Chat completion came back without any choices
    #[error("No valid response received")]
    NoValidResponse,

    /// Well-formed way file, but no route string in it
    #[error("No route data found for {departure} → {arrival}")]
    RouteNotFound { departure: String, arrival: String },

    #[error("Filesystem error at {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Request cancelled")]
    Cancelled,

    /// Same route request is already running
    #[error("An identical route request is already in progress")]
    Duplicate,

    #[error("{0}")]
    InvalidInput(String),

    #[error("Chat API key is not configured")]
    MissingApiKey,
}

/// Coarse classification of a [`FetchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Parse,
    DataNotFound,
    Filesystem,
    Cancelled,
    Rejected,
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::Network(_) | FetchError::Http { .. } | FetchError::Timeout(_) => {
                ErrorKind::Network
            }
            FetchError::Parse(_) | FetchError::NoValidResponse => ErrorKind::Parse,
            FetchError::RouteNotFound { .. } => ErrorKind::DataNotFound,
            FetchError::Filesystem { .. } => ErrorKind::Filesystem,
            FetchError::Cancelled => ErrorKind::Cancelled,
            FetchError::Duplicate | FetchError::InvalidInput(_) | FetchError::MissingApiKey => {
                ErrorKind::Rejected
            }
        }
    }

    pub(crate) fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FetchError::Filesystem {
            path: path.into(),
            source,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            FetchError::Http { status }
        } else if err.is_decode() {
            FetchError::Parse(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_message_carries_status() {
        let err = FetchError::Http {
            status: StatusCode::SERVICE_UNAVAILABLE,
        };
        assert_eq!(err.to_string(), "HTTP error: 503 Service Unavailable");
        assert_eq!(err.kind(), ErrorKind::Network);
    }

    #[test]
    fn test_kinds_are_distinguishable() {
        let not_found = FetchError::RouteNotFound {
            departure: "ZBAA".into(),
            arrival: "ZSPD".into(),
        };
        assert_eq!(not_found.kind(), ErrorKind::DataNotFound);
        assert_eq!(not_found.to_string(), "No route data found for ZBAA → ZSPD");

        let fs = FetchError::filesystem(
            "way/ZBAA-ZSPD-FSINN.spf",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(fs.kind(), ErrorKind::Filesystem);
        assert!(fs.to_string().contains("ZBAA-ZSPD-FSINN.spf"));

        assert_eq!(FetchError::NoValidResponse.kind(), ErrorKind::Parse);
        assert_eq!(FetchError::Duplicate.kind(), ErrorKind::Rejected);
        assert_eq!(
            FetchError::Timeout(Duration::from_secs(30)).to_string(),
            "Request timed out after 30s"
        );
    }
}
