//! Error types for search indexing and querying

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Programming or mapping mistake: unregistered document, unknown facet,
    /// invalid key descriptor, etc. Never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Search backend error: {0}")]
    Backend(String),

    #[error("Search backend returned {status}: {body}")]
    BackendStatus { status: u16, body: String },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid skip token: {0}")]
    InvalidSkipToken(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }

    /// Whether the error originates from the search backend round trip.
    pub fn is_backend(&self) -> bool {
        matches!(
            self,
            Error::Backend(_) | Error::BackendStatus { .. } | Error::Http(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_errors() {
        assert!(Error::Configuration("x".into()).is_configuration());
        assert!(!Error::Configuration("x".into()).is_backend());
        assert!(Error::BackendStatus {
            status: 500,
            body: "boom".into()
        }
        .is_backend());
        assert!(Error::Backend("bulk failed".into()).is_backend());
    }

    #[test]
    fn formats_status_errors() {
        let err = Error::BackendStatus {
            status: 404,
            body: "index_not_found".into(),
        };
        assert_eq!(
            err.to_string(),
            "Search backend returned 404: index_not_found"
        );
    }
}
