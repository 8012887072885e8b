//! Typed errors for configuration and enrichment backends

use thiserror::Error;

/// Fatal configuration problems. Reported once, then the command exits.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing credential: environment variable {0} is not set")]
    MissingCredential(String),
}

/// Failure of a single enrichment call. Recorded on the message as an
/// error marker; never aborts the run.
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("http request failed: {0}")]
    Http(#[from] ureq::Error),

    #[error("unexpected response: {0}")]
    Response(String),

    #[error("response parsing failed: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("expected {expected} results, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("backend returned an empty result")]
    EmptyResult,

    #[error("{0}")]
    Other(String),
}

impl EnrichError {
    /// Text stored in the message's error-marker field. Never empty.
    pub fn marker(&self) -> String {
        let text = self.to_string();
        if text.trim().is_empty() {
            "error".to_string()
        } else {
            text
        }
    }
}
