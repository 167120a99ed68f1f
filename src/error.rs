//! Error types shared across the crate.

use thiserror::Error;

/// Faults raised by the content filter.
///
/// Rejected content is not an error; see [`crate::filter::FilterOutcome`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Failures talking to the search or scrape provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} API key is not configured")]
    MissingApiKey { provider: &'static str },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} returned status {status}: {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("could not decode {provider} response: {source}")]
    Decode {
        provider: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl ProviderError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Http(e) => e.is_timeout() || e.is_connect(),
            ProviderError::Status { status, .. } => *status == 429 || *status >= 500,
            ProviderError::MissingApiKey { .. } | ProviderError::Decode { .. } => false,
        }
    }
}
