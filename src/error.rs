//! Error types for plate generation.

use std::time::Duration;

/// Errors that can occur while generating plates.
#[derive(Debug, thiserror::Error)]
pub enum PlatesError {
    /// API key missing or invalid.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Billing is not enabled for the API key.
    #[error("billing error: {0}")]
    Billing(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limit exceeded.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// Content was blocked by safety filters.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// Invalid request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The API answered with a shape we could not use.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Failed to decode base64 or data URL content.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// I/O error (reading the source, saving a download).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A generation call failed. The cause is kept for diagnostics.
    #[error("failed to generate image from {backend}")]
    Generation {
        backend: &'static str,
        #[source]
        source: Box<PlatesError>,
    },

    /// No source image has been uploaded.
    #[error("{0}")]
    MissingSource(&'static str),

    /// Slot index out of range for the current session.
    #[error("no shot at index {index} (session has {len})")]
    InvalidSlot { index: usize, len: usize },
}

impl PlatesError {
    /// Wraps a detailed failure as a generation failure of `backend`.
    pub fn generation(backend: &'static str, source: PlatesError) -> Self {
        Self::Generation {
            backend,
            source: Box::new(source),
        }
    }

    /// Returns true if this error is likely transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Network(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Generation { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Returns the suggested retry delay, if available.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            Self::Network(_) => Some(Duration::from_secs(2)),
            Self::Api { status, .. } if *status >= 500 => Some(Duration::from_secs(1)),
            Self::Generation { source, .. } => source.retry_after(),
            _ => None,
        }
    }

    /// Returns the innermost cause, looking through `Generation` wrappers.
    pub fn root_cause(&self) -> &PlatesError {
        match self {
            Self::Generation { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Result type alias for plate generation operations.
pub type Result<T> = std::result::Result<T, PlatesError>;

/// Maximum number of characters of an error body kept in messages.
const MAX_ERROR_BODY: usize = 500;

/// Redacts anything that looks like a Google API key and truncates long bodies.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let redacted: Vec<String> = text
        .split_inclusive(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
        .map(|token| {
            let word = token.trim_end_matches(|c: char| {
                !(c.is_ascii_alphanumeric() || c == '_' || c == '-')
            });
            if word.starts_with("AIza") && word.len() >= 30 {
                token.replacen(word, "[REDACTED]", 1)
            } else {
                token.to_string()
            }
        })
        .collect();
    let joined = redacted.concat();
    let trimmed = joined.trim();
    if trimmed.chars().count() > MAX_ERROR_BODY {
        let cut: String = trimmed.chars().take(MAX_ERROR_BODY).collect();
        format!("{cut}...")
    } else {
        trimmed.to_string()
    }
}

/// Parses a `Retry-After` header given in seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
